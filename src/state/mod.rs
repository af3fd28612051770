// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state tracking.
//!
//! The [`StateCache`] maps each [`StableId`](crate::types::StableId) to a
//! [`DeviceRecord`] holding the last known state. Merging a fresh snapshot
//! returns the [`ChangeSet`] of ids whose state actually changed.
//!
//! # Examples
//!
//! ```
//! use devsync::state::{Snapshot, StateCache};
//! use devsync::types::{StableId, StateBlob};
//! use serde_json::json;
//!
//! let mut cache = StateCache::new();
//! let flap = StableId::from(42_u64);
//!
//! let mut snapshot = Snapshot::new();
//! snapshot.insert(flap.clone(), StateBlob::new(json!({"locked": false})));
//!
//! // First merge reports the new device
//! assert!(cache.merge(snapshot.clone()).contains(&flap));
//!
//! // Same values again: nothing changed
//! assert!(cache.merge(snapshot).is_empty());
//! ```

mod device_record;
mod state_cache;

use std::collections::{BTreeSet, HashMap};

use crate::types::{StableId, StateBlob};

pub use device_record::DeviceRecord;
pub use state_cache::StateCache;

/// Full state snapshot as returned by a remote client.
pub type Snapshot = HashMap<StableId, StateBlob>;

/// Ids whose state changed during a merge, in deterministic order.
pub type ChangeSet = BTreeSet<StableId>;
