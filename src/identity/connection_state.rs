// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection state machine of a LAN device.

use std::fmt;

/// Connection state of a LAN device.
///
/// ```text
/// Disconnected ──> Connecting ──> Connected ──> Disconnected
///                       │                            │
///                       ├──> FailedRetryable         v
///                       └──> ReconnectingViaDiscovery ──> Connecting
/// ```
///
/// Any state may return to `Disconnected` on unload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection.
    Disconnected,
    /// Opening the push stream at the current address.
    Connecting,
    /// Push stream open.
    Connected,
    /// Searching the LAN for the device's new address.
    ReconnectingViaDiscovery,
    /// The device could not be identified; setup must be retried.
    FailedRetryable(String),
}

impl ConnectionState {
    /// Returns true if the device is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns true if setup failed and should be retried.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::FailedRetryable(_))
    }

    /// Returns true if moving to `next` follows the state machine.
    #[must_use]
    pub fn can_transition_to(&self, next: &Self) -> bool {
        use ConnectionState::{
            Connected, Connecting, Disconnected, FailedRetryable, ReconnectingViaDiscovery,
        };

        match (self, next) {
            (_, Disconnected)
            | (Disconnected | ReconnectingViaDiscovery, Connecting)
            | (Connecting, Connected | ReconnectingViaDiscovery | FailedRetryable(_))
            | (Disconnected, ReconnectingViaDiscovery) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::ReconnectingViaDiscovery => f.write_str("reconnecting via discovery"),
            Self::FailedRetryable(reason) => write!(f, "failed ({reason})"),
        }
    }
}
