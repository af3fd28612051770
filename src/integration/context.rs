// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-entry runtime context.

use crate::coordinator::{PollingCoordinator, ScheduledTask};
use crate::event::EventBus;
use crate::protocol::RemoteClient;
use crate::types::EntryId;

/// Everything an entry owns while it is loaded.
///
/// Created at setup, shut down at unload. Background tasks registered with
/// [`track`](Self::track) are stopped by [`shutdown`](Self::shutdown), or
/// cancelled when the context is dropped.
#[derive(Debug)]
pub struct IntegrationContext<C> {
    coordinator: PollingCoordinator<C>,
    events: EventBus,
    tasks: Vec<ScheduledTask>,
}

impl<C: RemoteClient> IntegrationContext<C> {
    /// Creates a context around a coordinator.
    #[must_use]
    pub fn new(coordinator: PollingCoordinator<C>, events: EventBus) -> Self {
        Self {
            coordinator,
            events,
            tasks: Vec::new(),
        }
    }

    /// Returns the entry id.
    #[must_use]
    pub fn entry_id(&self) -> EntryId {
        self.coordinator.entry_id()
    }

    /// Returns the coordinator.
    #[must_use]
    pub fn coordinator(&self) -> &PollingCoordinator<C> {
        &self.coordinator
    }

    /// Returns the event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Registers a background task owned by this entry.
    pub fn track(&mut self, task: ScheduledTask) {
        self.tasks.push(task);
    }

    /// Returns true while at least one tracked task is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|task| !task.is_finished())
    }

    /// Stops every tracked task and waits for them.
    pub async fn shutdown(&mut self) {
        let tasks = std::mem::take(&mut self.tasks);
        for task in &tasks {
            task.cancel();
        }
        for task in tasks {
            task.stop().await;
        }
        tracing::debug!(entry_id = %self.entry_id(), "Integration context shut down");
    }
}
