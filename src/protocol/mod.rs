// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Capabilities injected into the synchronizer.
//!
//! The synchronizer does not speak any vendor protocol itself. It drives
//! whatever implements these traits:
//!
//! - [`RemoteClient`]: fetches a full state snapshot (cloud account or LAN device)
//! - [`FlapControl`]: device actions on a pet flap
//! - [`DeviceLink`]: per-address connection to a LAN device
//!
//! With the `http` feature, [`HttpCloudClient`] implements the first two
//! against a JSON REST endpoint.
//!
//! Implementations report failures as [`ClientError`]; the coordinator and
//! the reconciler convert them before they reach callers.

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::{HttpCloudClient, HttpConfig};

use std::future::Future;

use tokio::sync::mpsc;

use crate::error::ClientError;
use crate::state::Snapshot;
use crate::types::{LockState, StableId, StateBlob};

/// Source of full state snapshots.
pub trait RemoteClient: Send + Sync + 'static {
    /// Fetches the current state of every device behind this client.
    ///
    /// The coordinator wraps this call in its own timeout.
    fn fetch_snapshot(&self) -> impl Future<Output = Result<Snapshot, ClientError>> + Send;
}

/// Lock control of pet flaps.
pub trait FlapControl: RemoteClient {
    /// Sets the lock mode of a flap.
    fn set_lock_state(
        &self,
        flap_id: &StableId,
        state: LockState,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;
}

/// Connection to a LAN device reached by network address.
pub trait DeviceLink: Send + Sync + 'static {
    /// Opens the push stream of the device at `address`.
    ///
    /// The receiver yields state updates pushed by the device. The stream
    /// ending (the receiver returning `None`) means the connection was lost.
    fn listen(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<mpsc::Receiver<StateBlob>, ClientError>> + Send;

    /// Reads the current state of the device at `address`.
    fn fetch_state(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<StateBlob, ClientError>> + Send;
}
