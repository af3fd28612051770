// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device record kept in the state cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{StableId, StateBlob};

/// Last known state of one device.
///
/// The stable id is fixed at construction. The network address may be
/// rewritten by identity reconciliation; the state only by a merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    stable_id: StableId,
    network_address: Option<String>,
    last_state: StateBlob,
    last_seen: DateTime<Utc>,
}

impl DeviceRecord {
    /// Creates a record for a device first seen at `now`.
    #[must_use]
    pub fn new(stable_id: StableId, state: StateBlob, now: DateTime<Utc>) -> Self {
        Self {
            stable_id,
            network_address: None,
            last_state: state,
            last_seen: now,
        }
    }

    /// Sets the network address.
    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.network_address = Some(address.into());
        self
    }

    /// Returns the stable id.
    #[must_use]
    pub fn stable_id(&self) -> &StableId {
        &self.stable_id
    }

    /// Returns the current network address, if known.
    #[must_use]
    pub fn network_address(&self) -> Option<&str> {
        self.network_address.as_deref()
    }

    /// Returns the last known state.
    #[must_use]
    pub fn last_state(&self) -> &StateBlob {
        &self.last_state
    }

    /// Returns when the device was last reported.
    #[must_use]
    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen
    }

    /// Records a fresh report of the device.
    ///
    /// Returns true if the state value differs from the previous one.
    pub(crate) fn apply_state(&mut self, state: StateBlob, now: DateTime<Utc>) -> bool {
        self.last_seen = now;
        if self.last_state == state {
            false
        } else {
            self.last_state = state;
            true
        }
    }

    /// Rewrites the network address.
    ///
    /// Returns true if the address changed.
    pub(crate) fn set_address(&mut self, address: String) -> bool {
        if self.network_address.as_deref() == Some(address.as_str()) {
            false
        } else {
            self.network_address = Some(address);
            true
        }
    }
}
