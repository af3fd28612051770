// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Remote client view of a single LAN device.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::ClientError;
use crate::protocol::{DeviceLink, RemoteClient};
use crate::state::Snapshot;
use crate::types::StableId;

/// Shared, rewritable network address of a device.
///
/// The reconciler rewrites it; the link client reads it on every fetch, so
/// an address change takes effect without rebuilding the coordinator.
#[derive(Clone, Default)]
pub struct AddressHandle(Arc<RwLock<String>>);

impl AddressHandle {
    /// Creates a handle holding `address`.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self(Arc::new(RwLock::new(address.into())))
    }

    /// Returns the current address.
    #[must_use]
    pub fn get(&self) -> String {
        self.0.read().clone()
    }

    /// Replaces the address, returning the previous one.
    pub fn set(&self, address: impl Into<String>) -> String {
        std::mem::replace(&mut *self.0.write(), address.into())
    }
}

impl fmt::Debug for AddressHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AddressHandle").field(&*self.0.read()).finish()
    }
}

/// Adapts a [`DeviceLink`] to [`RemoteClient`] for one device.
///
/// A snapshot holds exactly one entry, keyed by the device's stable id.
#[derive(Debug)]
pub struct LinkClient<L> {
    link: Arc<L>,
    stable_id: StableId,
    address: AddressHandle,
}

impl<L: DeviceLink> LinkClient<L> {
    /// Creates a client for the device `stable_id` reached at `address`.
    #[must_use]
    pub fn new(link: Arc<L>, stable_id: StableId, address: AddressHandle) -> Self {
        Self {
            link,
            stable_id,
            address,
        }
    }

    /// Returns the device's stable id.
    #[must_use]
    pub fn stable_id(&self) -> &StableId {
        &self.stable_id
    }

    /// Returns the shared address handle.
    #[must_use]
    pub fn address(&self) -> &AddressHandle {
        &self.address
    }

    /// Returns the underlying link.
    #[must_use]
    pub fn link(&self) -> &Arc<L> {
        &self.link
    }
}

impl<L: DeviceLink> RemoteClient for LinkClient<L> {
    async fn fetch_snapshot(&self) -> Result<Snapshot, ClientError> {
        let address = self.address.get();
        let state = self.link.fetch_state(&address).await?;
        Ok(Snapshot::from([(self.stable_id.clone(), state)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StateBlob;
    use tokio::sync::mpsc;

    struct EchoLink;

    impl DeviceLink for EchoLink {
        async fn listen(&self, _address: &str) -> Result<mpsc::Receiver<StateBlob>, ClientError> {
            Err(ClientError::Transport("unsupported".to_string()))
        }

        async fn fetch_state(&self, address: &str) -> Result<StateBlob, ClientError> {
            Ok(StateBlob::new(serde_json::json!({ "address": address })))
        }
    }

    #[test]
    fn address_handle_set_returns_previous() {
        let handle = AddressHandle::new("192.168.1.20");
        let shared = handle.clone();
        assert_eq!(handle.set("192.168.1.40"), "192.168.1.20");
        assert_eq!(shared.get(), "192.168.1.40");
    }

    #[tokio::test]
    async fn fetch_uses_current_address() {
        let handle = AddressHandle::new("192.168.1.20");
        let id = StableId::new("0x1").unwrap();
        let client = LinkClient::new(Arc::new(EchoLink), id.clone(), handle.clone());

        handle.set("192.168.1.40");
        let snapshot = client.fetch_snapshot().await.unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(
            snapshot[&id],
            StateBlob::new(serde_json::json!({ "address": "192.168.1.40" }))
        );
    }
}
