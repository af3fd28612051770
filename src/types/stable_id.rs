// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stable device identifier type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Vendor-assigned identifier of a physical device.
///
/// Unlike a network address, a stable id survives DHCP reassignment and is
/// the only reliable way to tell two devices apart. It is never empty.
///
/// # Examples
///
/// ```
/// use devsync::types::StableId;
///
/// let id = StableId::new("0x000000000015243f").unwrap();
/// assert_eq!(id.as_str(), "0x000000000015243f");
///
/// // Numeric cloud ids convert directly
/// let flap = StableId::from(13_579_u64);
/// assert_eq!(flap.to_string(), "13579");
///
/// assert!(StableId::new("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StableId(String);

impl StableId {
    /// Creates a stable id.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::EmptyStableId` if `id` is empty or only whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self, ValueError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValueError::EmptyStableId);
        }
        Ok(Self(id))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for StableId {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for StableId {
    type Error = ValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StableId> for String {
    fn from(id: StableId) -> Self {
        id.0
    }
}

impl From<u64> for StableId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank() {
        assert_eq!(StableId::new("   "), Err(ValueError::EmptyStableId));
    }

    #[test]
    fn parse_and_display() {
        let id: StableId = "0x15243f".parse().unwrap();
        assert_eq!(id.to_string(), "0x15243f");
    }

    #[test]
    fn deserialize_rejects_empty() {
        assert!(serde_json::from_str::<StableId>("\"\"").is_err());
        let id: StableId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(id.as_str(), "abc");
    }

    #[test]
    fn hashable() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(StableId::from(1_u64));
        set.insert(StableId::from(1_u64));
        assert_eq!(set.len(), 1);
    }
}
