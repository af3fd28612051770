// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Identity of LAN devices across address changes.
//!
//! A LAN device is reached by network address but identified by its
//! [`StableId`](crate::types::StableId). When the address stops answering,
//! the [`IdentityReconciler`] sweeps the network for the stable id, rewrites
//! the address and persists it through an [`IdentityStore`], so a later
//! reload connects straight to the new address.
//!
//! - [`ConnectionState`] - Connection state machine of a LAN device
//! - [`IdentityReconciler`] - Discovery-backed address resolution
//! - [`IdentityStore`] - Persistence, with [`MemoryIdentityStore`] and [`JsonFileIdentityStore`]
//! - [`LinkClient`] / [`AddressHandle`] - Polling a single device at a rewritable address
//! - [`unique_id`] - Unique ids of the entities a device exposes

mod connection_state;
mod link_client;
mod reconciler;
mod store;
mod unique_id;

pub use connection_state::ConnectionState;
pub use link_client::{AddressHandle, LinkClient};
pub use reconciler::IdentityReconciler;
pub use store::{IdentityStore, JsonFileIdentityStore, MemoryIdentityStore, PersistedIdentity};
pub use unique_id::{EntityKind, unique_id};
