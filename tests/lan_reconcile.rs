// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for LAN device setup, identity reconciliation and
//! background rediscovery, using an in-memory bulb and scanner.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use devsync::config::{EntryData, LanEntry, SyncConfig};
use devsync::discovery::{DiscoveredDevice, DiscoveryFilter, DiscoveryScanner};
use devsync::error::{ClientError, SetupError};
use devsync::event::{EventBus, SyncEvent};
use devsync::identity::{ConnectionState, EntityKind, MemoryIdentityStore};
use devsync::integration::{ExposedState, LanDevice};
use devsync::protocol::DeviceLink;
use devsync::subscription::Subscribable;
use devsync::types::{StableId, StateBlob};
use parking_lot::Mutex;
use tokio::sync::mpsc;

const BULB_ID: &str = "0x000000000015243f";
const OLD_ADDRESS: &str = "192.168.1.20";
const NEW_ADDRESS: &str = "192.168.1.40";

// ============================================================================
// Fakes
// ============================================================================

/// A bulb reachable at one address at a time.
#[derive(Default)]
struct FakeBulb {
    address: Mutex<Option<String>>,
    state: Mutex<serde_json::Value>,
    stream: Mutex<Option<mpsc::Sender<StateBlob>>>,
    listens: AtomicUsize,
}

impl FakeBulb {
    fn at(address: &str) -> Arc<Self> {
        let bulb = Self::default();
        *bulb.address.lock() = Some(address.to_string());
        *bulb.state.lock() = serde_json::json!({"power": "off"});
        Arc::new(bulb)
    }

    fn offline() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Moves the bulb, closing its push stream as a reboot would.
    fn move_to(&self, address: &str) {
        *self.address.lock() = Some(address.to_string());
        self.stream.lock().take();
    }

    fn push(&self, state: serde_json::Value) {
        *self.state.lock() = state.clone();
        if let Some(tx) = self.stream.lock().as_ref() {
            tx.try_send(StateBlob::new(state)).unwrap();
        }
    }

    fn reachable_at(&self, address: &str) -> bool {
        self.address.lock().as_deref() == Some(address)
    }
}

impl DeviceLink for FakeBulb {
    async fn listen(&self, address: &str) -> Result<mpsc::Receiver<StateBlob>, ClientError> {
        self.listens.fetch_add(1, Ordering::SeqCst);
        if !self.reachable_at(address) {
            return Err(ClientError::Transport(format!("{address}: no route to host")));
        }
        let (tx, rx) = mpsc::channel(16);
        *self.stream.lock() = Some(tx);
        Ok(rx)
    }

    async fn fetch_state(&self, address: &str) -> Result<StateBlob, ClientError> {
        if !self.reachable_at(address) {
            return Err(ClientError::Transport(format!("{address}: no route to host")));
        }
        Ok(StateBlob::new(self.state.lock().clone()))
    }
}

/// Link whose push stream never opens, while some other host answers state
/// requests at the bulb's former address.
#[derive(Default)]
struct ReassignedAddress {
    fetches: AtomicUsize,
}

impl DeviceLink for ReassignedAddress {
    async fn listen(&self, address: &str) -> Result<mpsc::Receiver<StateBlob>, ClientError> {
        Err(ClientError::Transport(format!("{address}: connection refused")))
    }

    async fn fetch_state(&self, address: &str) -> Result<StateBlob, ClientError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if address != OLD_ADDRESS {
            return Err(ClientError::Transport(format!("{address}: no route to host")));
        }
        Ok(StateBlob::new(serde_json::json!({"who": "some other device"})))
    }
}

/// Scanner reporting a configurable list of advertisements.
#[derive(Default)]
struct FakeScanner {
    adverts: Mutex<Vec<DiscoveredDevice>>,
    scans: AtomicUsize,
}

impl FakeScanner {
    fn silent() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn advertising(address: &str) -> Arc<Self> {
        let scanner = Self::default();
        scanner.advertise(address);
        Arc::new(scanner)
    }

    fn advertise(&self, address: &str) {
        *self.adverts.lock() = vec![DiscoveredDevice::new(bulb_id(), address)];
    }

    fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

impl DiscoveryScanner for FakeScanner {
    fn scan(&self, _filter: &DiscoveryFilter) -> mpsc::Receiver<DiscoveredDevice> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        let adverts = self.adverts.lock().clone();
        let (tx, rx) = mpsc::channel(adverts.len().max(1));
        for advert in adverts {
            let _ = tx.try_send(advert);
        }
        rx
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn bulb_id() -> StableId {
    StableId::new(BULB_ID).unwrap()
}

fn config() -> SyncConfig {
    SyncConfig::new()
        .with_poll_interval(Duration::from_secs(60))
        .with_poll_timeout(Duration::from_secs(2))
        .with_discovery_timeout(Duration::from_secs(3))
        .with_discovery_interval(Duration::from_secs(1))
        .with_rediscovery_interval(Duration::from_secs(10))
}

fn entry_with_id(host: &str) -> LanEntry {
    LanEntry::new(EntryData {
        id: Some(bulb_id()),
        host: Some(host.to_string()),
        ..EntryData::default()
    })
}

fn entry_with_host(host: &str) -> LanEntry {
    LanEntry::new(EntryData {
        host: Some(host.to_string()),
        ..EntryData::default()
    })
}

async fn setup(
    entry: LanEntry,
    bulb: &Arc<FakeBulb>,
    scanner: &Arc<FakeScanner>,
    store: &MemoryIdentityStore,
    events: EventBus,
) -> Result<LanDevice<FakeBulb, FakeScanner, MemoryIdentityStore>, SetupError> {
    LanDevice::setup(
        entry,
        Arc::clone(bulb),
        Arc::clone(scanner),
        Arc::new(store.clone()),
        &config(),
        events,
    )
    .await
}

/// Waits (in paused time) until `condition` holds.
async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..600 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    panic!("condition not met within 300 s");
}

fn connection_states(rx: &mut tokio::sync::broadcast::Receiver<SyncEvent>) -> Vec<ConnectionState> {
    let mut states = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let SyncEvent::ConnectionChanged { state, .. } = event {
            states.push(state);
        }
    }
    states
}

// ============================================================================
// Setup outcomes
// ============================================================================

mod setup_outcomes {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn known_address_connects_without_discovery() {
        let bulb = FakeBulb::at(OLD_ADDRESS);
        let scanner = FakeScanner::silent();
        let store = MemoryIdentityStore::new();

        let device = setup(entry_with_id(OLD_ADDRESS), &bulb, &scanner, &store, EventBus::new())
            .await
            .unwrap();

        assert_eq!(device.connection_state(), ConnectionState::Connected);
        assert_eq!(
            device.state(),
            ExposedState::Available(StateBlob::new(serde_json::json!({"power": "off"})))
        );
        assert_eq!(scanner.scans(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn moved_device_found_by_id() {
        let bulb = FakeBulb::at(NEW_ADDRESS);
        let scanner = FakeScanner::advertising(NEW_ADDRESS);
        let store = MemoryIdentityStore::new();
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let entry = entry_with_id(OLD_ADDRESS);
        let entry_id = entry.entry_id;

        let device = setup(entry, &bulb, &scanner, &store, events).await.unwrap();

        assert!(device.connection_state().is_connected());
        assert_eq!(device.address(), NEW_ADDRESS);
        assert_eq!(
            device.coordinator().get(&bulb_id()).unwrap().network_address(),
            Some(NEW_ADDRESS)
        );
        assert_eq!(
            store.get(entry_id).unwrap().network_address.as_deref(),
            Some(NEW_ADDRESS)
        );

        let mut address_changes = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let SyncEvent::AddressChanged {
                old_address,
                new_address,
                ..
            } = event
            {
                address_changes.push((old_address, new_address));
            }
        }
        assert_eq!(
            address_changes,
            vec![(Some(OLD_ADDRESS.to_string()), NEW_ADDRESS.to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reload_uses_persisted_address() {
        let bulb = FakeBulb::at(NEW_ADDRESS);
        let scanner = FakeScanner::advertising(NEW_ADDRESS);
        let store = MemoryIdentityStore::new();
        let entry = entry_with_id(OLD_ADDRESS);

        let mut device = setup(entry.clone(), &bulb, &scanner, &store, EventBus::new())
            .await
            .unwrap();
        device.unload().await;
        let scans_before = scanner.scans();

        let reloaded = setup(entry, &bulb, &scanner, &store, EventBus::new())
            .await
            .unwrap();

        assert!(reloaded.connection_state().is_connected());
        assert_eq!(reloaded.address(), NEW_ADDRESS);
        assert_eq!(scanner.scans(), scans_before);
    }

    #[tokio::test(start_paused = true)]
    async fn address_only_identified_by_discovery() {
        let bulb = FakeBulb::at(OLD_ADDRESS);
        let scanner = FakeScanner::advertising(OLD_ADDRESS);
        let store = MemoryIdentityStore::new();
        let entry = entry_with_host(OLD_ADDRESS);
        let entry_id = entry.entry_id;

        let device = setup(entry, &bulb, &scanner, &store, EventBus::new())
            .await
            .unwrap();

        assert_eq!(device.stable_id(), &bulb_id());
        assert_eq!(device.entry().data.id, Some(bulb_id()));
        assert_eq!(store.get(entry_id).unwrap().stable_id, Some(bulb_id()));
        assert!(device.connection_state().is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn address_only_without_match_is_retryable() {
        let bulb = FakeBulb::at(OLD_ADDRESS);
        let scanner = FakeScanner::silent();
        let store = MemoryIdentityStore::new();
        let events = EventBus::new();
        let mut rx = events.subscribe();

        let err = setup(entry_with_host(OLD_ADDRESS), &bulb, &scanner, &store, events)
            .await
            .unwrap_err();

        assert!(err.is_retryable(), "got {err:?}");
        assert!(scanner.scans() >= 1);
        let states = connection_states(&mut rx);
        assert!(matches!(states.last(), Some(ConnectionState::FailedRetryable(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn known_id_without_match_loads_unavailable() {
        let bulb = FakeBulb::offline();
        let scanner = FakeScanner::silent();
        let store = MemoryIdentityStore::new();

        let device = setup(entry_with_id(OLD_ADDRESS), &bulb, &scanner, &store, EventBus::new())
            .await
            .unwrap();

        assert_eq!(device.state(), ExposedState::Unavailable);
        assert_eq!(
            device.connection_state(),
            ConnectionState::ReconnectingViaDiscovery
        );
    }

    #[tokio::test]
    async fn entry_without_id_or_host_is_invalid() {
        let err = setup(
            LanEntry::new(EntryData::default()),
            &FakeBulb::offline(),
            &FakeScanner::silent(),
            &MemoryIdentityStore::new(),
            EventBus::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, SetupError::InvalidConfig(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_id_backfilled_from_unique_id() {
        let bulb = FakeBulb::at(OLD_ADDRESS);
        let scanner = FakeScanner::silent();
        let store = MemoryIdentityStore::new();
        let entry = entry_with_host(OLD_ADDRESS).with_unique_id(BULB_ID);
        let entry_id = entry.entry_id;

        let device = setup(entry, &bulb, &scanner, &store, EventBus::new())
            .await
            .unwrap();

        assert_eq!(device.entry().data.id, Some(bulb_id()));
        assert_eq!(store.get(entry_id).unwrap().stable_id, Some(bulb_id()));
        assert_eq!(scanner.scans(), 0);
        assert_eq!(
            device.unique_id(EntityKind::Nightlight),
            format!("{BULB_ID}-nightlight")
        );
        assert_eq!(
            device.entities(),
            vec![EntityKind::Main, EntityKind::NightlightSensor]
        );
    }
}

// ============================================================================
// Running device
// ============================================================================

mod running {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn background_rediscovery_finds_device() {
        let bulb = FakeBulb::offline();
        let scanner = FakeScanner::silent();
        let store = MemoryIdentityStore::new();

        let device = setup(entry_with_id(OLD_ADDRESS), &bulb, &scanner, &store, EventBus::new())
            .await
            .unwrap();
        assert!(device.state().is_unavailable());

        bulb.move_to(NEW_ADDRESS);
        scanner.advertise(NEW_ADDRESS);

        eventually(|| device.connection_state().is_connected()).await;
        assert_eq!(device.address(), NEW_ADDRESS);
        assert!(!device.state().is_unavailable());
    }

    #[tokio::test(start_paused = true)]
    async fn closed_stream_triggers_reconciliation() {
        let bulb = FakeBulb::at(OLD_ADDRESS);
        let scanner = FakeScanner::silent();
        let store = MemoryIdentityStore::new();
        let events = EventBus::new();

        let device = setup(entry_with_id(OLD_ADDRESS), &bulb, &scanner, &store, events.clone())
            .await
            .unwrap();
        let mut rx = events.subscribe();

        scanner.advertise(NEW_ADDRESS);
        bulb.move_to(NEW_ADDRESS);

        eventually(|| device.address() == NEW_ADDRESS && device.connection_state().is_connected())
            .await;

        let states = connection_states(&mut rx);
        assert_eq!(
            states,
            vec![
                ConnectionState::Disconnected,
                ConnectionState::ReconnectingViaDiscovery,
                ConnectionState::Connecting,
                ConnectionState::Connected,
            ]
        );
        assert_eq!(bulb.listens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn pushes_reach_subscribers() {
        let bulb = FakeBulb::at(OLD_ADDRESS);
        let scanner = FakeScanner::silent();
        let store = MemoryIdentityStore::new();

        let device = setup(entry_with_id(OLD_ADDRESS), &bulb, &scanner, &store, EventBus::new())
            .await
            .unwrap();

        let notified = Arc::new(AtomicUsize::new(0));
        let n = Arc::clone(&notified);
        device.coordinator().on_change(move |changed| {
            assert!(changed.contains(&bulb_id()));
            n.fetch_add(1, Ordering::SeqCst);
        });

        bulb.push(serde_json::json!({"power": "on", "bright": 80}));

        eventually(|| notified.load(Ordering::SeqCst) == 1).await;
        assert_eq!(
            device.state(),
            ExposedState::Available(StateBlob::new(
                serde_json::json!({"power": "on", "bright": 80})
            ))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unload_makes_device_unavailable() {
        let bulb = FakeBulb::at(OLD_ADDRESS);
        let scanner = FakeScanner::silent();
        let store = MemoryIdentityStore::new();

        let mut device = setup(entry_with_id(OLD_ADDRESS), &bulb, &scanner, &store, EventBus::new())
            .await
            .unwrap();
        device.unload().await;

        assert!(device.state().is_unavailable());
        assert_eq!(device.connection_state(), ConnectionState::Disconnected);

        // No rediscovery after unload even if the stream closes
        bulb.move_to(NEW_ADDRESS);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(scanner.scans(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_address_not_polled_while_reconciling() {
        let link = Arc::new(ReassignedAddress::default());
        let config = config().with_poll_interval(Duration::from_secs(5));

        let device = LanDevice::setup(
            entry_with_id(OLD_ADDRESS),
            Arc::clone(&link),
            FakeScanner::silent(),
            Arc::new(MemoryIdentityStore::new()),
            &config,
            EventBus::new(),
        )
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(
            device.connection_state(),
            ConnectionState::ReconnectingViaDiscovery
        );
        assert_eq!(link.fetches.load(Ordering::SeqCst), 0);
        assert!(
            device
                .coordinator()
                .get(&bulb_id())
                .is_none_or(|record| record.last_state().as_value().is_null())
        );
        assert!(device.state().is_unavailable());
    }

    #[tokio::test(start_paused = true)]
    async fn unload_cancels_running_sweep() {
        let bulb = FakeBulb::offline();
        let scanner = FakeScanner::silent();
        let store = MemoryIdentityStore::new();

        let mut device = setup(entry_with_id(OLD_ADDRESS), &bulb, &scanner, &store, EventBus::new())
            .await
            .unwrap();
        let after_setup = scanner.scans();

        // Rediscovery waits 10 s, then sweeps for 3 s
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(scanner.scans() > after_setup, "background sweep not started");

        tokio::time::timeout(Duration::from_secs(1), device.unload())
            .await
            .expect("unload blocked by the sweep");
        assert_eq!(device.connection_state(), ConnectionState::Disconnected);

        let after_unload = scanner.scans();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(scanner.scans(), after_unload);
    }

    #[tokio::test(start_paused = true)]
    async fn remove_deletes_identity() {
        let bulb = FakeBulb::at(OLD_ADDRESS);
        let scanner = FakeScanner::silent();
        let store = MemoryIdentityStore::new();
        let entry = entry_with_id(OLD_ADDRESS);
        let entry_id = entry.entry_id;

        let device = setup(entry, &bulb, &scanner, &store, EventBus::new())
            .await
            .unwrap();
        assert!(store.get(entry_id).is_some());

        assert!(device.remove().await.unwrap());
        assert!(store.get(entry_id).is_none());
    }
}
