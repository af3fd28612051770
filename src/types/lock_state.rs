// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lock modes of a pet flap.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Lock mode of a pet flap.
///
/// Parsing is case-insensitive and accepts exactly the four mode names, so
/// an unknown mode is rejected up front instead of being silently ignored.
///
/// # Examples
///
/// ```
/// use devsync::types::LockState;
///
/// let state: LockState = "Locked_In".parse().unwrap();
/// assert_eq!(state, LockState::LockedIn);
/// assert_eq!(state.as_str(), "locked_in");
///
/// assert!("open".parse::<LockState>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    /// Pets can enter and leave.
    Unlocked,
    /// Pets can leave but not come back in.
    LockedIn,
    /// Pets can come in but not leave.
    LockedOut,
    /// The flap is locked both ways.
    LockedAll,
}

impl LockState {
    /// All lock states, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::Unlocked,
        Self::LockedIn,
        Self::LockedOut,
        Self::LockedAll,
    ];

    /// Returns the lowercase mode name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unlocked => "unlocked",
            Self::LockedIn => "locked_in",
            Self::LockedOut => "locked_out",
            Self::LockedAll => "locked_all",
        }
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LockState {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "unlocked" => Ok(Self::Unlocked),
            "locked_in" => Ok(Self::LockedIn),
            "locked_out" => Ok(Self::LockedOut),
            "locked_all" => Ok(Self::LockedAll),
            _ => Err(ValueError::InvalidLockState(s.to_string())),
        }
    }
}
