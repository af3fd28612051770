// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broadcast bus for lifecycle events.

use tokio::sync::broadcast;

use super::SyncEvent;

/// Default channel capacity for the event bus.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Broadcast bus for [`SyncEvent`]s.
///
/// Each receiver gets its own copy of every event published after it
/// subscribed. A receiver that falls more than the capacity behind loses the
/// oldest events (`RecvError::Lagged`).
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    /// Creates a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates a new event bus buffering at most `capacity` events.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active receivers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publishes an event to all receivers.
    ///
    /// Without receivers the event is discarded.
    pub fn publish(&self, event: SyncEvent) {
        // No receivers is not an error
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntryId;

    #[test]
    fn subscribe_and_drop_track_count() {
        let bus = EventBus::new();
        let rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(rx1);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn publish_delivers_to_multiple_receivers() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.clone().subscribe();

        let entry_id = EntryId::new();
        bus.publish(SyncEvent::auth_failed(entry_id, "denied"));

        assert_eq!(rx1.recv().await.unwrap().entry_id(), entry_id);
        assert_eq!(rx2.recv().await.unwrap().entry_id(), entry_id);
    }

    #[test]
    fn publish_without_receivers_is_silent() {
        let bus = EventBus::with_capacity(4);
        bus.publish(SyncEvent::auth_failed(EntryId::new(), "denied"));
        assert_eq!(bus.subscriber_count(), 0);
    }
}
