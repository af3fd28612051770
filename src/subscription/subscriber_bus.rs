// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Callback registry and fan-out for change notifications.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::SubscriberError;
use crate::state::ChangeSet;

/// Unique identifier for a subscription.
///
/// Returned when registering a callback and used to unsubscribe later.
/// IDs are unique within a bus's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

type ChangeCallback = Arc<dyn Fn(&ChangeSet) -> Result<(), SubscriberError> + Send + Sync>;

struct Registry {
    next_id: AtomicU64,
    callbacks: RwLock<HashMap<SubscriptionId, ChangeCallback>>,
}

/// Fan-out bus delivering changed-id sets to every registered subscriber.
///
/// Cloning the bus yields another handle to the same registry, so a
/// callback can capture a clone and subscribe or unsubscribe from inside a
/// notification.
///
/// # Delivery
///
/// - Every subscriber registered when [`notify`](Self::notify) starts
///   receives the change set. Order is unspecified.
/// - Callbacks run with no lock held.
/// - A callback that returns an error or panics is logged and skipped; the
///   remaining subscribers still receive the notification.
#[derive(Clone)]
pub struct SubscriberBus {
    registry: Arc<Registry>,
}

impl SubscriberBus {
    /// Creates a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry {
                next_id: AtomicU64::new(1),
                callbacks: RwLock::new(HashMap::new()),
            }),
        }
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.registry.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a fallible callback.
    ///
    /// An `Err` returned by the callback is logged and does not affect other
    /// subscribers.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeSet) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.registry.callbacks.write().insert(id, Arc::new(callback));
        id
    }

    /// Registers an infallible callback.
    pub fn on_change<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeSet) + Send + Sync + 'static,
    {
        self.subscribe(move |changed| {
            callback(changed);
            Ok(())
        })
    }

    /// Unregisters a callback.
    ///
    /// Returns `true` if a callback was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.registry.callbacks.write().remove(&id).is_some()
    }

    /// Removes all subscribers.
    pub fn clear(&self) {
        self.registry.callbacks.write().clear();
    }

    /// Delivers a change set to every subscriber.
    ///
    /// Returns the number of subscribers that handled it successfully.
    pub fn notify(&self, changed: &ChangeSet) -> usize {
        let callbacks: Vec<(SubscriptionId, ChangeCallback)> = self
            .registry
            .callbacks
            .read()
            .iter()
            .map(|(id, callback)| (*id, Arc::clone(callback)))
            .collect();

        let mut delivered = 0;
        for (id, callback) in callbacks {
            match catch_unwind(AssertUnwindSafe(|| callback(changed))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    tracing::warn!(subscription = %id, error = %e, "Subscriber failed");
                }
                Err(_) => {
                    let e = SubscriberError::new("callback panicked");
                    tracing::warn!(subscription = %id, error = %e, "Subscriber failed");
                }
            }
        }
        delivered
    }

    /// Returns the number of registered callbacks.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.registry.callbacks.read().len()
    }

    /// Returns `true` if there are no registered callbacks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriber_count() == 0
    }
}

impl Default for SubscriberBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SubscriberBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
