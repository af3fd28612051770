// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lifecycle events for integrations and devices.
//!
//! Change sets go to [`SubscriberBus`](crate::subscription::SubscriberBus)
//! callbacks. Everything a host may want to observe beyond that (connection
//! transitions, address rewrites, authentication failures) is broadcast as a
//! [`SyncEvent`] on an [`EventBus`] backed by tokio's broadcast channel.
//!
//! # Examples
//!
//! ```
//! use devsync::event::{EventBus, SyncEvent};
//! use devsync::types::EntryId;
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.publish(SyncEvent::auth_failed(EntryId::new(), "bad password"));
//! ```

mod event_bus;
mod sync_event;

pub use event_bus::EventBus;
pub use sync_event::SyncEvent;
