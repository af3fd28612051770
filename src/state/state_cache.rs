// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Snapshot-diffing state cache.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::types::{StableId, StateBlob};

use super::{ChangeSet, DeviceRecord, Snapshot};

/// Mapping from stable id to the last known [`DeviceRecord`].
///
/// Pure data structure without I/O. It has a single writer (the polling
/// coordinator) and any number of readers.
///
/// Snapshots are treated as complete: an id missing from a snapshot is
/// dropped from the cache and reported as changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateCache {
    records: HashMap<StableId, DeviceRecord>,
}

impl StateCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record for a device.
    #[must_use]
    pub fn get(&self, stable_id: &StableId) -> Option<&DeviceRecord> {
        self.records.get(stable_id)
    }

    /// Returns true if the device is cached.
    #[must_use]
    pub fn contains(&self, stable_id: &StableId) -> bool {
        self.records.contains_key(stable_id)
    }

    /// Returns all cached ids.
    pub fn ids(&self) -> impl Iterator<Item = &StableId> {
        self.records.keys()
    }

    /// Returns the number of cached devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Merges a full snapshot and returns the ids whose state changed.
    pub fn merge(&mut self, snapshot: Snapshot) -> ChangeSet {
        self.merge_at(snapshot, Utc::now())
    }

    /// Merges a full snapshot observed at `now`.
    ///
    /// Network addresses of surviving records are preserved.
    pub fn merge_at(&mut self, snapshot: Snapshot, now: DateTime<Utc>) -> ChangeSet {
        let mut changed = ChangeSet::new();

        self.records.retain(|id, _| {
            let keep = snapshot.contains_key(id);
            if !keep {
                changed.insert(id.clone());
            }
            keep
        });

        for (id, state) in snapshot {
            if self.update_at(id.clone(), state, now) {
                changed.insert(id);
            }
        }

        changed
    }

    /// Records the state of a single device observed at `now`.
    ///
    /// Returns true if the device is new or its state changed.
    pub fn update_at(&mut self, stable_id: StableId, state: StateBlob, now: DateTime<Utc>) -> bool {
        match self.records.get_mut(&stable_id) {
            Some(record) => record.apply_state(state, now),
            None => {
                let record = DeviceRecord::new(stable_id.clone(), state, now);
                self.records.insert(stable_id, record);
                true
            }
        }
    }

    /// Replaces the whole cache with a snapshot (full resync).
    ///
    /// Unlike [`merge`](Self::merge), known network addresses are discarded.
    /// Returns the ids whose state differs between the old and new cache.
    pub fn replace(&mut self, snapshot: Snapshot) -> ChangeSet {
        let now = Utc::now();
        let old = std::mem::take(&mut self.records);

        let mut changed: ChangeSet = old
            .keys()
            .filter(|id| !snapshot.contains_key(*id))
            .cloned()
            .collect();

        for (id, state) in snapshot {
            if old.get(&id).is_none_or(|rec| rec.last_state() != &state) {
                changed.insert(id.clone());
            }
            self.records
                .insert(id.clone(), DeviceRecord::new(id, state, now));
        }

        changed
    }

    /// Registers a device known only by identity, before any state arrived.
    ///
    /// Does nothing if the device is already cached.
    pub fn register(&mut self, stable_id: StableId, address: Option<String>) {
        self.records.entry(stable_id.clone()).or_insert_with(|| {
            let record = DeviceRecord::new(stable_id, StateBlob::default(), Utc::now());
            match address {
                Some(address) => record.with_address(address),
                None => record,
            }
        });
    }

    /// Rewrites the network address of a cached device.
    ///
    /// Returns true if the device exists and its address changed.
    pub fn set_address(&mut self, stable_id: &StableId, address: impl Into<String>) -> bool {
        self.records
            .get_mut(stable_id)
            .is_some_and(|record| record.set_address(address.into()))
    }
}
