// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ready-made integrations built on the synchronizer core.
//!
//! - [`CloudIntegration`] - One account-wide client polled on an interval,
//!   with a lock-state action on pet flaps
//! - [`LanDevice`] - One LAN device reached by address, identified by its
//!   stable id, with discovery fallback when the address changes
//!
//! Both own an [`IntegrationContext`] created at setup and torn down at
//! unload.

mod cloud;
mod context;
mod lan;

pub use cloud::CloudIntegration;
pub use context::IntegrationContext;
pub use lan::{ExposedState, LanDevice};
