// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `devsync` - Keep polled device state in sync with local subscribers.
//!
//! This library keeps the states of externally polled devices synchronized
//! with local consumers, and follows LAN devices across network address
//! changes using their stable vendor identifier.
//!
//! # Components
//!
//! - **Polling**: [`PollingCoordinator`] fetches full snapshots from a
//!   [`RemoteClient`] on a fixed interval, under a timeout, never overlapping
//! - **State cache**: [`StateCache`] diffs each snapshot against the last one
//! - **Subscribers**: [`SubscriberBus`] fans the changed ids out, isolating
//!   failing callbacks
//! - **Identity**: [`IdentityReconciler`] finds a moved device through a
//!   bounded discovery sweep and persists its new address
//!
//! Vendor protocols stay outside the crate: they are plugged in through
//! [`RemoteClient`], [`FlapControl`], [`DeviceLink`] and [`DiscoveryScanner`].
//! With the default `http` feature, [`HttpCloudClient`] covers JSON REST
//! cloud accounts.
//!
//! # Quick Start
//!
//! ## Cloud account
//!
//! ```no_run
//! use devsync::config::{CloudConfig, SyncConfig};
//! use devsync::event::EventBus;
//! use devsync::integration::CloudIntegration;
//! use devsync::subscription::Subscribable;
//! use devsync::types::{EntryId, LockState, StableId};
//!
//! #[tokio::main]
//! async fn main() -> devsync::Result<()> {
//!     let account = CloudConfig::new("me@example.org", "secret");
//!     let cloud =
//!         CloudIntegration::from_config(EntryId::new(), &account, &SyncConfig::default(), EventBus::new())
//!             .await?;
//!
//!     cloud.coordinator().on_change(|changed| {
//!         for id in changed {
//!             println!("{id} changed");
//!         }
//!     });
//!
//!     cloud.set_lock_state(&StableId::from(13_579_u64), LockState::LockedIn).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## LAN device
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use devsync::config::{EntryData, LanEntry, SyncConfig};
//! use devsync::discovery::DiscoveryScanner;
//! use devsync::event::EventBus;
//! use devsync::identity::JsonFileIdentityStore;
//! use devsync::integration::LanDevice;
//! use devsync::protocol::DeviceLink;
//!
//! # async fn example<L: DeviceLink, S: DiscoveryScanner>(link: L, scanner: S) -> devsync::Result<()> {
//! let entry = LanEntry::new(EntryData {
//!     host: Some("192.168.1.20".to_string()),
//!     ..EntryData::default()
//! });
//! let store = Arc::new(JsonFileIdentityStore::new("identities.json"));
//!
//! let bulb = LanDevice::setup(
//!     entry,
//!     Arc::new(link),
//!     Arc::new(scanner),
//!     store,
//!     &SyncConfig::default(),
//!     EventBus::new(),
//! )
//! .await?;
//!
//! println!("{} is at {}", bulb.stable_id(), bulb.address());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod discovery;
pub mod error;
pub mod event;
pub mod identity;
pub mod integration;
pub mod protocol;
pub mod state;
pub mod subscription;
pub mod types;

pub use coordinator::{PauseGuard, PollingCoordinator, ScheduledTask};
pub use discovery::{DiscoveredDevice, DiscoveryFilter, DiscoveryScanner};
pub use error::{
    ClientError, DiscoveryError, Error, PollError, Result, SetupError, StoreError,
    SubscriberError, ValueError,
};
pub use event::{EventBus, SyncEvent};
pub use identity::{ConnectionState, IdentityReconciler, IdentityStore};
#[cfg(feature = "http")]
pub use protocol::{HttpCloudClient, HttpConfig};
pub use protocol::{DeviceLink, FlapControl, RemoteClient};
pub use state::{ChangeSet, DeviceRecord, Snapshot, StateCache};
pub use subscription::{Subscribable, SubscriberBus, SubscriptionId};
pub use types::{EntryId, LockState, StableId, StateBlob};
