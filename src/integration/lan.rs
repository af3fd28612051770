// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! LAN device entry with discovery fallback.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::config::{LanEntry, SyncConfig};
use crate::coordinator::{PollingCoordinator, ScheduledTask, cancelled};
use crate::discovery::DiscoveryScanner;
use crate::error::{ClientError, DiscoveryError, SetupError, StoreError};
use crate::event::{EventBus, SyncEvent};
use crate::identity::{
    AddressHandle, ConnectionState, EntityKind, IdentityReconciler, IdentityStore, LinkClient,
    unique_id,
};
use crate::protocol::DeviceLink;
use crate::types::{EntryId, StableId, StateBlob};

use super::IntegrationContext;

/// What a LAN device exposes to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum ExposedState {
    /// The entity exists but has no live data.
    Unavailable,
    /// Last known state of a connected device.
    Available(StateBlob),
}

impl ExposedState {
    /// Returns true if the device is unavailable.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable)
    }
}

/// A loaded LAN device entry.
///
/// Setup resolves the device identity, opens its push stream and starts two
/// background tasks: scheduled polling, and the connection loop that
/// consumes pushes and falls back to discovery when the stream ends.
/// Scheduled polls are suspended whenever the device is not connected, so a
/// stale address is never polled while the identity is being reconciled.
///
/// # Setup outcomes
///
/// | Entry has | Connection | Discovery | Result |
/// |-----------|------------|-----------|--------|
/// | id | ok | - | loaded, connected |
/// | id | fails | finds new address | loaded, connected at new address |
/// | id | fails | times out | loaded, unavailable, background rediscovery |
/// | address only | - | identifies device | loaded |
/// | address only | - | times out | `SetupError::Retryable` |
pub struct LanDevice<L, S, St> {
    entry: LanEntry,
    link: Arc<Link<L, S, St>>,
    context: IntegrationContext<LinkClient<L>>,
}

/// State shared between the entry and its connection loop.
struct Link<L, S, St> {
    entry_id: EntryId,
    stable_id: StableId,
    device: Arc<L>,
    address: AddressHandle,
    coordinator: PollingCoordinator<LinkClient<L>>,
    reconciler: IdentityReconciler<S, St>,
    connection: watch::Sender<ConnectionState>,
    events: EventBus,
    connect_timeout: Duration,
    rediscovery_interval: Duration,
}

/// Next step of the connection loop.
enum Phase {
    Listen(mpsc::Receiver<StateBlob>),
    Discover,
    Wait,
}

impl<L, S, St> LanDevice<L, S, St>
where
    L: DeviceLink,
    S: DiscoveryScanner,
    St: IdentityStore,
{
    /// Sets up a LAN device entry.
    ///
    /// An address persisted by an earlier reconciliation takes precedence
    /// over the entry's host. A missing entry id is filled from the entry's
    /// unique id and persisted.
    ///
    /// # Errors
    ///
    /// - `SetupError::InvalidConfig` if the entry has neither an id nor a host
    /// - `SetupError::Retryable` if the entry has no id and discovery could not
    ///   identify the device at its address
    pub async fn setup(
        mut entry: LanEntry,
        device: Arc<L>,
        scanner: Arc<S>,
        store: Arc<St>,
        config: &SyncConfig,
        events: EventBus,
    ) -> Result<Self, SetupError> {
        let entry_id = entry.entry_id;
        let reconciler = IdentityReconciler::new(
            entry_id,
            scanner,
            store,
            config.discovery_options(),
            events.clone(),
        );

        let persisted = match reconciler.store().load(entry_id).await {
            Ok(identity) => identity.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(%entry_id, error = %e, "Failed to load persisted identity");
                Default::default()
            }
        };

        let backfilled = entry.backfill_id();
        if backfilled {
            tracing::info!(%entry_id, "Filled missing device id from unique id");
        }

        let address = persisted
            .network_address
            .clone()
            .or_else(|| entry.data.host.clone());
        let known_id = entry.data.id.clone().or_else(|| persisted.stable_id.clone());

        let connection = watch::Sender::new(ConnectionState::Disconnected);

        let stable_id = match (known_id, &address) {
            (Some(id), _) => id,
            (None, None) => {
                return Err(SetupError::InvalidConfig(
                    "entry has neither a device id nor a host".to_string(),
                ));
            }
            (None, Some(host)) => {
                transition(&connection, entry_id, &events, ConnectionState::Connecting);
                let (_cancel, cancelled) = watch::channel(false);
                match reconciler.identify(host, cancelled).await {
                    Ok(id) => id,
                    Err(e) => {
                        let reason = format!("could not identify device at {host}: {e}");
                        transition(
                            &connection,
                            entry_id,
                            &events,
                            ConnectionState::FailedRetryable(reason.clone()),
                        );
                        tracing::warn!(%entry_id, host = %host, error = %e, "Device not identified, setup will be retried");
                        return Err(SetupError::Retryable(reason));
                    }
                }
            }
        };
        entry.data.id = Some(stable_id.clone());

        if backfilled || persisted.stable_id.as_ref() != Some(&stable_id) {
            if let Err(e) = reconciler
                .persist(Some(stable_id.clone()), address.clone())
                .await
            {
                tracing::warn!(%entry_id, error = %e, "Failed to persist device identity");
            }
        }

        let address = AddressHandle::new(address.unwrap_or_default());
        let client = LinkClient::new(Arc::clone(&device), stable_id.clone(), address.clone());
        let coordinator = PollingCoordinator::new(entry_id, client, config, events.clone());
        if !address.get().is_empty() {
            coordinator.pause().await.set_address(&stable_id, address.get());
        }

        let link = Arc::new(Link {
            entry_id,
            stable_id,
            device,
            address,
            coordinator: coordinator.clone(),
            reconciler,
            connection,
            events: events.clone(),
            connect_timeout: config.poll_timeout,
            rediscovery_interval: config.rediscovery_interval,
        });

        let phase = link.initial_phase().await;

        let mut context = IntegrationContext::new(coordinator, events);
        context.track(link.spawn(phase));
        let polling = context.coordinator().start_deferred();
        context.track(polling);

        let state = link.connection.borrow().clone();
        tracing::info!(
            %entry_id,
            stable_id = %link.stable_id,
            address = %link.address.get(),
            %state,
            "LAN device loaded"
        );

        Ok(Self {
            entry,
            link,
            context,
        })
    }

    /// Returns the entry, with its id filled in.
    #[must_use]
    pub fn entry(&self) -> &LanEntry {
        &self.entry
    }

    /// Returns the device's stable id.
    #[must_use]
    pub fn stable_id(&self) -> &StableId {
        &self.link.stable_id
    }

    /// Returns the address the device is currently reached at.
    #[must_use]
    pub fn address(&self) -> String {
        self.link.address.get()
    }

    /// Returns the coordinator.
    #[must_use]
    pub fn coordinator(&self) -> &PollingCoordinator<LinkClient<L>> {
        self.context.coordinator()
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.link.connection.borrow().clone()
    }

    /// Watches connection state changes.
    #[must_use]
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.link.connection.subscribe()
    }

    /// Returns what the device exposes right now.
    ///
    /// Unavailable unless connected with a state received.
    #[must_use]
    pub fn state(&self) -> ExposedState {
        if !self.link.connection.borrow().is_connected() {
            return ExposedState::Unavailable;
        }
        self.coordinator()
            .get(&self.link.stable_id)
            .map(|record| record.last_state().clone())
            .filter(|state| !state.as_value().is_null())
            .map_or(ExposedState::Unavailable, ExposedState::Available)
    }

    /// Returns the unique id of one of the device's entities.
    #[must_use]
    pub fn unique_id(&self, kind: EntityKind) -> String {
        unique_id(Some(&self.link.stable_id), self.link.entry_id, kind)
    }

    /// Returns the entities this entry exposes.
    #[must_use]
    pub fn entities(&self) -> Vec<EntityKind> {
        let mut kinds = vec![EntityKind::Main, EntityKind::NightlightSensor];
        if self.entry.data.nightlight_switch {
            kinds.push(EntityKind::Nightlight);
        }
        if self.entry.data.ambilight {
            kinds.push(EntityKind::Ambilight);
        }
        kinds
    }

    /// Stops polling and discovery. The device becomes unavailable.
    pub async fn unload(&mut self) {
        self.context.shutdown().await;
        transition(
            &self.link.connection,
            self.link.entry_id,
            &self.link.events,
            ConnectionState::Disconnected,
        );
        tracing::info!(entry_id = %self.link.entry_id, "LAN device unloaded");
    }

    /// Unloads the entry and deletes its persisted identity.
    ///
    /// # Errors
    ///
    /// Returns the store error if the identity could not be deleted.
    pub async fn remove(mut self) -> Result<bool, StoreError> {
        self.unload().await;
        self.link.reconciler.store().remove(self.link.entry_id).await
    }
}

impl<L, S, St> std::fmt::Debug for LanDevice<L, S, St> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanDevice")
            .field("entry_id", &self.link.entry_id)
            .field("stable_id", &self.link.stable_id)
            .field("address", &self.link.address)
            .field("connection", &*self.link.connection.borrow())
            .finish_non_exhaustive()
    }
}

impl<L, S, St> Link<L, S, St>
where
    L: DeviceLink,
    S: DiscoveryScanner,
    St: IdentityStore,
{
    /// First connection attempt and, on failure, one discovery sweep.
    async fn initial_phase(&self) -> Phase {
        if !self.address.get().is_empty()
            && let Ok(stream) = self.connect().await
        {
            return Phase::Listen(stream);
        }

        self.set_state(ConnectionState::ReconnectingViaDiscovery);
        let (_cancel, cancelled) = watch::channel(false);
        match self.discover(cancelled).await {
            Ok(stream) => Phase::Listen(stream),
            Err(e) => {
                tracing::warn!(
                    entry_id = %self.entry_id,
                    stable_id = %self.stable_id,
                    error = %e,
                    "Device unavailable, rediscovering in background"
                );
                Phase::Wait
            }
        }
    }

    fn spawn(self: &Arc<Self>, phase: Phase) -> ScheduledTask {
        let link = Arc::clone(self);
        ScheduledTask::spawn(move |cancel| async move { link.run(phase, cancel).await })
    }

    /// Connection loop: listen, rediscover on stream end, retry on an interval.
    async fn run(&self, mut phase: Phase, mut cancel: watch::Receiver<bool>) {
        loop {
            phase = match phase {
                Phase::Listen(stream) => {
                    if !self.listen(stream, &mut cancel).await {
                        return;
                    }
                    self.set_state(ConnectionState::Disconnected);
                    self.set_state(ConnectionState::ReconnectingViaDiscovery);
                    Phase::Discover
                }
                Phase::Discover => match self.discover(cancel.clone()).await {
                    Ok(stream) => Phase::Listen(stream),
                    Err(DiscoveryError::Cancelled) => return,
                    Err(e) => {
                        tracing::debug!(entry_id = %self.entry_id, error = %e, "Rediscovery sweep failed");
                        Phase::Wait
                    }
                },
                Phase::Wait => {
                    tokio::select! {
                        () = cancelled(&mut cancel) => return,
                        () = tokio::time::sleep(self.rediscovery_interval) => Phase::Discover,
                    }
                }
            };
        }
    }

    /// Forwards pushes to the coordinator until the stream ends.
    ///
    /// Returns false if cancelled.
    async fn listen(
        &self,
        mut stream: mpsc::Receiver<StateBlob>,
        cancel: &mut watch::Receiver<bool>,
    ) -> bool {
        loop {
            tokio::select! {
                () = cancelled(cancel) => return false,
                update = stream.recv() => match update {
                    Some(state) => {
                        self.coordinator.apply_push(self.stable_id.clone(), state).await;
                    }
                    None => {
                        tracing::warn!(
                            entry_id = %self.entry_id,
                            address = %self.address.get(),
                            "Push stream closed"
                        );
                        return true;
                    }
                },
            }
        }
    }

    /// Sweeps for the device and connects at the address found.
    ///
    /// `DiscoveryError::Unavailable` means the device was found but refused
    /// the connection.
    async fn discover(
        &self,
        cancel: watch::Receiver<bool>,
    ) -> Result<mpsc::Receiver<StateBlob>, DiscoveryError> {
        self.reconciler
            .reconcile(&self.coordinator, &self.address, &self.stable_id, cancel)
            .await?;

        let stream = self.connect().await;
        if stream.is_err() {
            self.set_state(ConnectionState::ReconnectingViaDiscovery);
        }
        stream
    }

    /// Opens the push stream at the current address.
    async fn connect(&self) -> Result<mpsc::Receiver<StateBlob>, DiscoveryError> {
        self.set_state(ConnectionState::Connecting);
        let address = self.address.get();

        let opened = match tokio::time::timeout(self.connect_timeout, self.device.listen(&address)).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::timeout(self.connect_timeout)),
        };

        match opened {
            Ok(stream) => {
                self.set_state(ConnectionState::Connected);
                tracing::info!(entry_id = %self.entry_id, address = %address, "Connected");
                // Failures are logged by the coordinator; the push stream keeps the state fresh
                let _ = self.coordinator.refresh_now().await;
                Ok(stream)
            }
            Err(e) => {
                tracing::warn!(entry_id = %self.entry_id, address = %address, error = %e, "Connection failed");
                Err(DiscoveryError::Unavailable(format!("{address}: {e}")))
            }
        }
    }

    /// Moves the connection state. Scheduled polling only runs while connected.
    fn set_state(&self, next: ConnectionState) {
        if next.is_connected() {
            self.coordinator.resume();
        } else {
            self.coordinator.suspend();
        }
        transition(&self.connection, self.entry_id, &self.events, next);
    }
}

/// Moves the connection state machine and publishes the change.
fn transition(
    connection: &watch::Sender<ConnectionState>,
    entry_id: EntryId,
    events: &EventBus,
    next: ConnectionState,
) {
    let previous = connection.borrow().clone();
    if previous == next {
        return;
    }
    if !previous.can_transition_to(&next) {
        tracing::warn!(%entry_id, from = %previous, to = %next, "Unexpected connection state transition");
    }
    tracing::debug!(%entry_id, from = %previous, to = %next, "Connection state changed");
    connection.send_replace(next.clone());
    events.publish(SyncEvent::connection_changed(entry_id, next));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EntryData;
    use crate::discovery::{DiscoveredDevice, DiscoveryFilter};
    use crate::identity::MemoryIdentityStore;

    const DEVICE_ID: &str = "0x15243f";

    /// Link refusing every connection.
    struct RefusingLink;

    impl DeviceLink for RefusingLink {
        async fn listen(&self, address: &str) -> Result<mpsc::Receiver<StateBlob>, ClientError> {
            Err(ClientError::Transport(format!("{address}: connection refused")))
        }

        async fn fetch_state(&self, address: &str) -> Result<StateBlob, ClientError> {
            Err(ClientError::Transport(format!("{address}: connection refused")))
        }
    }

    /// Scanner always advertising the device at one address.
    struct Advertising(&'static str);

    impl DiscoveryScanner for Advertising {
        fn scan(&self, _filter: &DiscoveryFilter) -> mpsc::Receiver<DiscoveredDevice> {
            let (tx, rx) = mpsc::channel(1);
            let id = StableId::new(DEVICE_ID).unwrap();
            tx.try_send(DiscoveredDevice::new(id, self.0)).unwrap();
            rx
        }
    }

    async fn refused_device() -> LanDevice<RefusingLink, Advertising, MemoryIdentityStore> {
        let entry = LanEntry::new(EntryData {
            id: Some(StableId::new(DEVICE_ID).unwrap()),
            host: Some("192.168.1.20".to_string()),
            ambilight: true,
            ..EntryData::default()
        });
        LanDevice::setup(
            entry,
            Arc::new(RefusingLink),
            Arc::new(Advertising("192.168.1.40")),
            Arc::new(MemoryIdentityStore::new()),
            &SyncConfig::default(),
            EventBus::new(),
        )
        .await
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn found_but_refused_is_unavailable() {
        let mut device = refused_device().await;

        assert_eq!(device.address(), "192.168.1.40");
        assert_eq!(
            device.connection_state(),
            ConnectionState::ReconnectingViaDiscovery
        );
        assert!(device.coordinator().is_suspended());

        let (_cancel, cancelled) = watch::channel(false);
        let err = device.link.discover(cancelled).await.unwrap_err();
        assert!(
            matches!(&err, DiscoveryError::Unavailable(reason) if reason.starts_with("192.168.1.40")),
            "got {err:?}"
        );

        device.unload().await;
    }

    #[tokio::test(start_paused = true)]
    async fn entities_follow_entry_flags() {
        let mut device = refused_device().await;

        assert_eq!(
            device.entities(),
            vec![
                EntityKind::Main,
                EntityKind::NightlightSensor,
                EntityKind::Ambilight
            ]
        );
        assert_eq!(
            device.unique_id(EntityKind::Ambilight),
            format!("{DEVICE_ID}-ambilight")
        );

        device.unload().await;
    }
}
