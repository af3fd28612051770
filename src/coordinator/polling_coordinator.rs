// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fixed-interval polling coordinator.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::SyncConfig;
use crate::error::{ClientError, PollError};
use crate::event::{EventBus, SyncEvent};
use crate::protocol::RemoteClient;
use crate::state::{ChangeSet, DeviceRecord, Snapshot, StateCache};
use crate::subscription::{Subscribable, SubscriberBus};
use crate::types::{EntryId, StableId, StateBlob};

use super::ScheduledTask;

/// Polls a [`RemoteClient`] and keeps a [`StateCache`] in sync with it.
///
/// The coordinator is the only writer of its cache. Every write (scheduled
/// poll, explicit refresh, pushed update, address rewrite) goes through one
/// async lock, so polls never overlap:
///
/// - a scheduled tick that finds a poll in flight is skipped
/// - an explicit [`poll`](Self::poll) waits for the in-flight poll
/// - while [`suspend`](Self::suspend)ed, scheduled ticks are skipped
///
/// Changed ids are delivered to [`Subscribable`] callbacks and, as
/// [`SyncEvent::StateChanged`], on the event bus.
///
/// Cloning is cheap; clones share the cache, lock and subscribers.
///
/// # Examples
///
/// ```no_run
/// use devsync::config::SyncConfig;
/// use devsync::coordinator::PollingCoordinator;
/// use devsync::event::EventBus;
/// use devsync::protocol::RemoteClient;
/// use devsync::subscription::Subscribable;
/// use devsync::types::EntryId;
///
/// # async fn example<C: RemoteClient>(client: C) {
/// let coordinator = PollingCoordinator::new(EntryId::new(), client, &SyncConfig::default(), EventBus::new());
///
/// coordinator.on_change(|changed| println!("{} device(s) changed", changed.len()));
///
/// let task = coordinator.start();
/// // ...
/// task.stop().await;
/// # }
/// ```
pub struct PollingCoordinator<C> {
    inner: Arc<Inner<C>>,
}

struct Inner<C> {
    entry_id: EntryId,
    client: C,
    interval: Duration,
    timeout: Duration,
    cache: Arc<RwLock<StateCache>>,
    writer: Arc<Mutex<()>>,
    suspended: AtomicBool,
    subscribers: SubscriberBus,
    events: EventBus,
}

impl<C> Clone for PollingCoordinator<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: RemoteClient> PollingCoordinator<C> {
    /// Creates a coordinator with an empty cache.
    ///
    /// Nothing is fetched until [`poll`](Self::poll) or [`start`](Self::start).
    pub fn new(entry_id: EntryId, client: C, config: &SyncConfig, events: EventBus) -> Self {
        Self {
            inner: Arc::new(Inner {
                entry_id,
                client,
                interval: config.poll_interval,
                timeout: config.poll_timeout,
                cache: Arc::new(RwLock::new(StateCache::new())),
                writer: Arc::new(Mutex::new(())),
                suspended: AtomicBool::new(false),
                subscribers: SubscriberBus::new(),
                events,
            }),
        }
    }

    /// Returns the entry this coordinator belongs to.
    #[must_use]
    pub fn entry_id(&self) -> EntryId {
        self.inner.entry_id
    }

    /// Returns the remote client.
    #[must_use]
    pub fn client(&self) -> &C {
        &self.inner.client
    }

    /// Returns the polling interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    /// Fetches a snapshot and merges it into the cache.
    ///
    /// Waits for a poll already in flight to finish first. Subscribers are
    /// notified when the returned set is not empty.
    ///
    /// # Errors
    ///
    /// - `PollError::Fatal` if the remote rejected the credentials
    /// - `PollError::Transient` on timeout, network or server errors
    ///
    /// The cache is unchanged on error.
    pub async fn poll(&self) -> Result<ChangeSet, PollError> {
        let _writer = self.inner.writer.lock().await;
        self.inner.poll_locked().await
    }

    /// Polls immediately, typically right after an action on a device.
    ///
    /// # Errors
    ///
    /// Same as [`poll`](Self::poll).
    pub async fn refresh_now(&self) -> Result<ChangeSet, PollError> {
        tracing::debug!(entry_id = %self.inner.entry_id, "Refresh requested");
        self.poll().await
    }

    /// Records a state pushed by a device outside the poll cycle.
    ///
    /// Returns true if the state changed, in which case subscribers were
    /// notified with a single-id change set.
    pub async fn apply_push(&self, stable_id: StableId, state: StateBlob) -> bool {
        let _writer = self.inner.writer.lock().await;

        let changed = self
            .inner
            .cache
            .write()
            .update_at(stable_id.clone(), state, chrono::Utc::now());
        if changed {
            tracing::debug!(entry_id = %self.inner.entry_id, %stable_id, "Pushed state changed");
            self.inner.publish(ChangeSet::from([stable_id]));
        }
        changed
    }

    /// Suspends polling and pushes until the guard is dropped.
    ///
    /// Waits for an in-flight poll to finish. Scheduled ticks falling inside
    /// the pause are skipped.
    pub async fn pause(&self) -> PauseGuard {
        let writer = Arc::clone(&self.inner.writer).lock_owned().await;
        tracing::debug!(entry_id = %self.inner.entry_id, "Polling paused");
        PauseGuard {
            _writer: writer,
            cache: Arc::clone(&self.inner.cache),
        }
    }

    /// Skips scheduled ticks until [`resume`](Self::resume) is called.
    ///
    /// Used while the device identity is unresolved, so that whatever
    /// answers at a stale address is never merged. Explicit polls still run.
    pub fn suspend(&self) {
        if !self.inner.suspended.swap(true, Ordering::SeqCst) {
            tracing::debug!(entry_id = %self.inner.entry_id, "Scheduled polling suspended");
        }
    }

    /// Lets scheduled ticks poll again.
    pub fn resume(&self) {
        if self.inner.suspended.swap(false, Ordering::SeqCst) {
            tracing::debug!(entry_id = %self.inner.entry_id, "Scheduled polling resumed");
        }
    }

    /// Returns true while scheduled ticks are suspended.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.inner.suspended.load(Ordering::SeqCst)
    }

    /// Returns a copy of the record of one device.
    #[must_use]
    pub fn get(&self, stable_id: &StableId) -> Option<DeviceRecord> {
        self.inner.cache.read().get(stable_id).cloned()
    }

    /// Returns a copy of the whole cache.
    #[must_use]
    pub fn snapshot(&self) -> StateCache {
        self.inner.cache.read().clone()
    }

    /// Returns true if the device is cached.
    #[must_use]
    pub fn contains(&self, stable_id: &StableId) -> bool {
        self.inner.cache.read().contains(stable_id)
    }

    /// Starts polling on a fixed interval, first tick immediately.
    ///
    /// The loop ends when the task is stopped or a poll fails fatally.
    pub fn start(&self) -> ScheduledTask {
        self.start_at(Instant::now())
    }

    /// Starts polling on a fixed interval, first tick one interval from now.
    ///
    /// Used after an initial refresh already populated the cache.
    pub fn start_deferred(&self) -> ScheduledTask {
        self.start_at(Instant::now() + self.inner.interval)
    }

    fn start_at(&self, first_tick: Instant) -> ScheduledTask {
        let inner = Arc::clone(&self.inner);
        tracing::info!(
            entry_id = %inner.entry_id,
            interval_secs = inner.interval.as_secs(),
            "Starting scheduled polling"
        );

        ScheduledTask::spawn(move |mut cancel| async move {
            let mut ticker = tokio::time::interval_at(first_tick, inner.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    () = super::cancelled(&mut cancel) => break,
                    _ = ticker.tick() => {}
                }

                if inner.suspended.load(Ordering::SeqCst) {
                    tracing::debug!(entry_id = %inner.entry_id, "Polling suspended, skipping tick");
                    continue;
                }

                let Ok(_writer) = inner.writer.try_lock() else {
                    tracing::debug!(entry_id = %inner.entry_id, "Poll in flight, skipping tick");
                    continue;
                };

                if let Err(PollError::Fatal(_)) = inner.poll_locked().await {
                    break;
                }
            }

            tracing::debug!(entry_id = %inner.entry_id, "Scheduled polling stopped");
        })
    }
}

impl<C: RemoteClient> Inner<C> {
    /// Runs one poll. The caller holds the writer lock.
    async fn poll_locked(&self) -> Result<ChangeSet, PollError> {
        let fetched = match tokio::time::timeout(self.timeout, self.client.fetch_snapshot()).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::timeout(self.timeout)),
        };

        let snapshot: Snapshot = match fetched {
            Ok(snapshot) => snapshot,
            Err(e) => return Err(self.classify(e)),
        };

        let devices = snapshot.len();
        let changed = self.cache.write().merge(snapshot);
        tracing::debug!(
            entry_id = %self.entry_id,
            devices,
            changed = changed.len(),
            "Poll completed"
        );

        if !changed.is_empty() {
            self.publish(changed.clone());
        }
        Ok(changed)
    }

    fn classify(&self, err: ClientError) -> PollError {
        let err = PollError::from(err);
        match &err {
            PollError::Fatal(message) => {
                tracing::error!(entry_id = %self.entry_id, error = %err, "Authentication failed, polling stops");
                self.events
                    .publish(SyncEvent::auth_failed(self.entry_id, message.clone()));
            }
            PollError::Transient(_) => {
                tracing::warn!(entry_id = %self.entry_id, error = %err, "Poll failed, retrying next tick");
            }
        }
        err
    }

    fn publish(&self, changed: ChangeSet) {
        self.subscribers.notify(&changed);
        self.events
            .publish(SyncEvent::state_changed(self.entry_id, changed));
    }
}

impl<C> Subscribable for PollingCoordinator<C> {
    fn subscribers(&self) -> &SubscriberBus {
        &self.inner.subscribers
    }
}

impl<C> std::fmt::Debug for PollingCoordinator<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingCoordinator")
            .field("entry_id", &self.inner.entry_id)
            .field("interval", &self.inner.interval)
            .field("devices", &self.inner.cache.read().len())
            .finish_non_exhaustive()
    }
}

/// Exclusive access to a coordinator's cache while polling is paused.
///
/// Obtained from [`PollingCoordinator::pause`]; polling resumes on drop.
pub struct PauseGuard {
    _writer: OwnedMutexGuard<()>,
    cache: Arc<RwLock<StateCache>>,
}

impl PauseGuard {
    /// Rewrites the network address of a device, registering it if unknown.
    ///
    /// Returns true if the address changed.
    pub fn set_address(&self, stable_id: &StableId, address: impl Into<String>) -> bool {
        let address = address.into();
        let mut cache = self.cache.write();
        if !cache.contains(stable_id) {
            cache.register(stable_id.clone(), Some(address));
            return true;
        }
        cache.set_address(stable_id, address)
    }

    /// Replaces the whole cache (full resync).
    pub fn replace(&self, snapshot: Snapshot) -> ChangeSet {
        self.cache.write().replace(snapshot)
    }
}

impl std::fmt::Debug for PauseGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PauseGuard").finish_non_exhaustive()
    }
}
