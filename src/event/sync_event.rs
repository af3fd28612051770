// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lifecycle event types.

use crate::identity::ConnectionState;
use crate::state::ChangeSet;
use crate::types::{EntryId, StableId};

/// Events emitted by integrations and device entries.
///
/// Every event names the entry it originates from.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A poll or push changed the state of some devices.
    StateChanged {
        /// The originating entry.
        entry_id: EntryId,
        /// Devices whose state changed.
        changed: ChangeSet,
    },

    /// A device entry moved through its connection state machine.
    ConnectionChanged {
        /// The originating entry.
        entry_id: EntryId,
        /// The new connection state.
        state: ConnectionState,
    },

    /// Discovery found the device at a different address.
    AddressChanged {
        /// The originating entry.
        entry_id: EntryId,
        /// The device whose address changed.
        stable_id: StableId,
        /// The address used before, if any.
        old_address: Option<String>,
        /// The address now in use.
        new_address: String,
    },

    /// The remote rejected the credentials; polling stopped.
    AuthFailed {
        /// The originating entry.
        entry_id: EntryId,
        /// Error description.
        message: String,
    },
}

impl SyncEvent {
    /// Returns the entry this event originates from.
    #[must_use]
    pub fn entry_id(&self) -> EntryId {
        match self {
            Self::StateChanged { entry_id, .. }
            | Self::ConnectionChanged { entry_id, .. }
            | Self::AddressChanged { entry_id, .. }
            | Self::AuthFailed { entry_id, .. } => *entry_id,
        }
    }

    /// Returns `true` if this is a connection event.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::ConnectionChanged { .. })
    }

    /// Creates a state changed event.
    #[must_use]
    pub fn state_changed(entry_id: EntryId, changed: ChangeSet) -> Self {
        Self::StateChanged { entry_id, changed }
    }

    /// Creates a connection changed event.
    #[must_use]
    pub fn connection_changed(entry_id: EntryId, state: ConnectionState) -> Self {
        Self::ConnectionChanged { entry_id, state }
    }

    /// Creates an address changed event.
    #[must_use]
    pub fn address_changed(
        entry_id: EntryId,
        stable_id: StableId,
        old_address: Option<String>,
        new_address: impl Into<String>,
    ) -> Self {
        Self::AddressChanged {
            entry_id,
            stable_id,
            old_address,
            new_address: new_address.into(),
        }
    }

    /// Creates an authentication failure event.
    #[must_use]
    pub fn auth_failed(entry_id: EntryId, message: impl Into<String>) -> Self {
        Self::AuthFailed {
            entry_id,
            message: message.into(),
        }
    }
}
