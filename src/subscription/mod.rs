// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscription system for device state changes.
//!
//! This module provides a callback-based fan-out for the sets of device ids
//! changed by each successful poll.
//!
//! # Overview
//!
//! - [`SubscriptionId`] - A unique identifier for a subscription, used to unsubscribe
//! - [`SubscriberBus`] - Registry that stores callbacks and dispatches change sets
//! - [`Subscribable`] - Trait for components that expose a subscriber bus
//!
//! # Usage
//!
//! ```
//! use devsync::subscription::SubscriberBus;
//! use devsync::state::ChangeSet;
//! use devsync::types::StableId;
//!
//! let bus = SubscriberBus::new();
//!
//! let sub_id = bus.on_change(|changed| {
//!     println!("{} device(s) changed", changed.len());
//! });
//!
//! let changed: ChangeSet = [StableId::from(1_u64)].into_iter().collect();
//! bus.notify(&changed);
//!
//! bus.unsubscribe(sub_id);
//! ```

mod subscribable;
mod subscriber_bus;

pub use subscribable::Subscribable;
pub use subscriber_bus::{SubscriberBus, SubscriptionId};
