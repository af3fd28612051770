// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Resolution of a device's stable id to its current network address.

use std::sync::Arc;

use tokio::sync::watch;

use crate::coordinator::PollingCoordinator;
use crate::discovery::{DiscoveredDevice, DiscoveryFilter, DiscoveryOptions, DiscoveryScanner, sweep};
use crate::error::{DiscoveryError, StoreError};
use crate::event::{EventBus, SyncEvent};
use crate::protocol::RemoteClient;
use crate::types::{EntryId, StableId};

use super::{AddressHandle, IdentityStore, PersistedIdentity};

/// Finds devices through discovery and records where they are.
///
/// When a device moved, the reconciler rewrites its address in three places
/// while the coordinator is paused: the coordinator's cache, the shared
/// [`AddressHandle`] the link client reads, and the identity store. The
/// coordinator itself is never rebuilt.
pub struct IdentityReconciler<S, St> {
    entry_id: EntryId,
    scanner: Arc<S>,
    store: Arc<St>,
    options: DiscoveryOptions,
    events: EventBus,
}

impl<S: DiscoveryScanner, St: IdentityStore> IdentityReconciler<S, St> {
    /// Creates a reconciler for one entry.
    pub fn new(
        entry_id: EntryId,
        scanner: Arc<S>,
        store: Arc<St>,
        options: DiscoveryOptions,
        events: EventBus,
    ) -> Self {
        Self {
            entry_id,
            scanner,
            store,
            options,
            events,
        }
    }

    /// Returns the discovery options used for each sweep.
    #[must_use]
    pub fn options(&self) -> &DiscoveryOptions {
        &self.options
    }

    /// Returns the identity store.
    #[must_use]
    pub fn store(&self) -> &Arc<St> {
        &self.store
    }

    /// Learns the stable id of whatever device answers at `address`.
    ///
    /// # Errors
    ///
    /// Returns `DiscoveryError::Timeout` if no device at that address
    /// advertised itself in time, `DiscoveryError::Cancelled` on cancel.
    pub async fn identify(
        &self,
        address: &str,
        cancel: watch::Receiver<bool>,
    ) -> Result<StableId, DiscoveryError> {
        let filter = DiscoveryFilter::ByAddress(address.to_string());
        let found = sweep(self.scanner.as_ref(), &filter, &self.options, cancel).await?;
        Ok(found.stable_id)
    }

    /// Finds the current address of `stable_id`.
    ///
    /// # Errors
    ///
    /// Same as [`identify`](Self::identify).
    pub async fn locate(
        &self,
        stable_id: &StableId,
        cancel: watch::Receiver<bool>,
    ) -> Result<DiscoveredDevice, DiscoveryError> {
        let filter = DiscoveryFilter::ById(stable_id.clone());
        sweep(self.scanner.as_ref(), &filter, &self.options, cancel).await
    }

    /// Locates `stable_id` and moves the device to the address found.
    ///
    /// # Errors
    ///
    /// Same as [`identify`](Self::identify). Failing to persist the new
    /// address is logged, not returned.
    pub async fn reconcile<C: RemoteClient>(
        &self,
        coordinator: &PollingCoordinator<C>,
        address: &AddressHandle,
        stable_id: &StableId,
        cancel: watch::Receiver<bool>,
    ) -> Result<DiscoveredDevice, DiscoveryError> {
        let found = self.locate(stable_id, cancel).await?;
        if let Err(e) = self.apply(coordinator, address, &found).await {
            tracing::warn!(entry_id = %self.entry_id, error = %e, "Failed to persist new address");
        }
        Ok(found)
    }

    /// Moves a device to the address it was discovered at.
    ///
    /// Returns true if the address changed.
    ///
    /// # Errors
    ///
    /// Returns the store error if the identity could not be saved. The
    /// in-memory address is updated regardless.
    pub async fn apply<C: RemoteClient>(
        &self,
        coordinator: &PollingCoordinator<C>,
        address: &AddressHandle,
        found: &DiscoveredDevice,
    ) -> Result<bool, StoreError> {
        let old_address = {
            let guard = coordinator.pause().await;
            guard.set_address(&found.stable_id, found.network_address.clone());
            address.set(found.network_address.clone())
        };

        let changed = old_address != found.network_address;
        if changed {
            tracing::info!(
                entry_id = %self.entry_id,
                stable_id = %found.stable_id,
                old_address = %old_address,
                new_address = %found.network_address,
                "Device address changed"
            );
            self.events.publish(SyncEvent::address_changed(
                self.entry_id,
                found.stable_id.clone(),
                Some(old_address).filter(|a| !a.is_empty()),
                found.network_address.clone(),
            ));
        }

        self.persist(Some(found.stable_id.clone()), Some(found.network_address.clone()))
            .await?;
        Ok(changed)
    }

    /// Saves the identity of the entry.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub async fn persist(
        &self,
        stable_id: Option<StableId>,
        network_address: Option<String>,
    ) -> Result<(), StoreError> {
        let identity = PersistedIdentity::new(stable_id, network_address);
        self.store.save(self.entry_id, &identity).await
    }
}

impl<S, St> std::fmt::Debug for IdentityReconciler<S, St> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityReconciler")
            .field("entry_id", &self.entry_id)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::error::ClientError;
    use crate::identity::{LinkClient, MemoryIdentityStore};
    use crate::protocol::DeviceLink;
    use crate::types::StateBlob;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct StaticScanner(Vec<DiscoveredDevice>);

    impl DiscoveryScanner for StaticScanner {
        fn scan(&self, _filter: &DiscoveryFilter) -> mpsc::Receiver<DiscoveredDevice> {
            let (tx, rx) = mpsc::channel(self.0.len().max(1));
            for device in &self.0 {
                let _ = tx.try_send(device.clone());
            }
            rx
        }
    }

    struct NullLink;

    impl DeviceLink for NullLink {
        async fn listen(&self, _address: &str) -> Result<mpsc::Receiver<StateBlob>, ClientError> {
            Err(ClientError::Transport("unreachable".to_string()))
        }

        async fn fetch_state(&self, _address: &str) -> Result<StateBlob, ClientError> {
            Ok(StateBlob::default())
        }
    }

    fn bulb_id() -> StableId {
        StableId::new("0x15243f").unwrap()
    }

    fn reconciler(
        devices: Vec<DiscoveredDevice>,
        store: MemoryIdentityStore,
        events: EventBus,
    ) -> IdentityReconciler<StaticScanner, MemoryIdentityStore> {
        IdentityReconciler::new(
            EntryId::new(),
            Arc::new(StaticScanner(devices)),
            Arc::new(store),
            DiscoveryOptions::new().with_timeout(Duration::from_secs(3)),
            events,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn reconcile_moves_device_everywhere() {
        let store = MemoryIdentityStore::new();
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let r = reconciler(
            vec![DiscoveredDevice::new(bulb_id(), "192.168.1.40")],
            store.clone(),
            events.clone(),
        );

        let address = AddressHandle::new("192.168.1.20");
        let client = LinkClient::new(Arc::new(NullLink), bulb_id(), address.clone());
        let coordinator = PollingCoordinator::new(r.entry_id, client, &SyncConfig::default(), events);
        coordinator.poll().await.unwrap();

        let (_cancel, cancelled) = watch::channel(false);
        let found = r
            .reconcile(&coordinator, &address, &bulb_id(), cancelled)
            .await
            .unwrap();

        assert_eq!(found.network_address, "192.168.1.40");
        assert_eq!(address.get(), "192.168.1.40");
        assert_eq!(
            coordinator.get(&bulb_id()).unwrap().network_address(),
            Some("192.168.1.40")
        );
        assert_eq!(
            store.get(r.entry_id).unwrap().network_address.as_deref(),
            Some("192.168.1.40")
        );

        let mut saw_address_change = false;
        while let Ok(event) = rx.try_recv() {
            if let SyncEvent::AddressChanged { old_address, .. } = event {
                assert_eq!(old_address.as_deref(), Some("192.168.1.20"));
                saw_address_change = true;
            }
        }
        assert!(saw_address_change);
    }

    #[tokio::test(start_paused = true)]
    async fn identify_times_out_without_match() {
        let r = reconciler(
            vec![DiscoveredDevice::new(bulb_id(), "192.168.1.40")],
            MemoryIdentityStore::new(),
            EventBus::new(),
        );
        let (_cancel, cancelled) = watch::channel(false);

        let err = r.identify("192.168.1.20", cancelled).await.unwrap_err();
        assert_eq!(err, DiscoveryError::Timeout(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn identify_by_address() {
        let r = reconciler(
            vec![DiscoveredDevice::new(bulb_id(), "192.168.1.20")],
            MemoryIdentityStore::new(),
            EventBus::new(),
        );
        let (_cancel, cancelled) = watch::channel(false);

        assert_eq!(r.identify("192.168.1.20", cancelled).await.unwrap(), bulb_id());
    }
}
