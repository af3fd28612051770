// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscribable trait for components that publish change sets.

use crate::error::SubscriberError;
use crate::state::ChangeSet;

use super::{SubscriberBus, SubscriptionId};

/// Trait for components that notify subscribers about changed devices.
///
/// Implementors only expose their [`SubscriberBus`]; registration and
/// removal are provided.
///
/// # Examples
///
/// ```no_run
/// use devsync::subscription::Subscribable;
/// use devsync::coordinator::PollingCoordinator;
/// # use devsync::protocol::RemoteClient;
///
/// # fn example<C: RemoteClient>(coordinator: &PollingCoordinator<C>) {
/// let sub_id = coordinator.on_change(|changed| {
///     for id in changed {
///         println!("{id} changed");
///     }
/// });
///
/// coordinator.unsubscribe(sub_id);
/// # }
/// ```
pub trait Subscribable {
    /// Returns the bus change sets are published on.
    fn subscribers(&self) -> &SubscriberBus;

    /// Subscribes to change sets with an infallible callback.
    fn on_change<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeSet) + Send + Sync + 'static,
    {
        self.subscribers().on_change(callback)
    }

    /// Subscribes to change sets with a fallible callback.
    fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeSet) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.subscribers().subscribe(callback)
    }

    /// Unsubscribes a callback by its subscription ID.
    ///
    /// Returns `true` if the subscription was found and removed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers().unsubscribe(id)
    }
}
