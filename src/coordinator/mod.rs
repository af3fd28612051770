// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polling and background task scheduling.
//!
//! - [`PollingCoordinator`] - Single writer of a state cache, fed by a remote client
//! - [`PauseGuard`] - Suspends polling while an address is rewritten
//! - [`ScheduledTask`] - Cancellable handle to a background loop

mod polling_coordinator;
mod scheduled_task;

pub use polling_coordinator::{PauseGuard, PollingCoordinator};
pub use scheduled_task::ScheduledTask;

pub(crate) use scheduled_task::cancelled;
