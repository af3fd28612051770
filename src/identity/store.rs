// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Persistence of learned device identities.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::types::{EntryId, StableId};

/// Identity of a LAN device as last learned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedIdentity {
    /// Vendor id, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stable_id: Option<StableId>,
    /// Last address the device was reached at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_address: Option<String>,
}

impl PersistedIdentity {
    /// Creates an identity.
    #[must_use]
    pub fn new(stable_id: Option<StableId>, network_address: Option<String>) -> Self {
        Self {
            stable_id,
            network_address,
        }
    }
}

/// Storage of one [`PersistedIdentity`] per entry.
pub trait IdentityStore: Send + Sync + 'static {
    /// Loads the identity of an entry.
    fn load(
        &self,
        entry_id: EntryId,
    ) -> impl Future<Output = Result<Option<PersistedIdentity>, StoreError>> + Send;

    /// Saves the identity of an entry, replacing any previous one.
    fn save(
        &self,
        entry_id: EntryId,
        identity: &PersistedIdentity,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Deletes the identity of an entry.
    ///
    /// Returns true if one was stored.
    fn remove(&self, entry_id: EntryId) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

/// In-memory identity store.
///
/// Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryIdentityStore {
    entries: Arc<parking_lot::RwLock<HashMap<EntryId, PersistedIdentity>>>,
}

impl MemoryIdentityStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the identity of an entry without going through the async API.
    #[must_use]
    pub fn get(&self, entry_id: EntryId) -> Option<PersistedIdentity> {
        self.entries.read().get(&entry_id).cloned()
    }
}

impl IdentityStore for MemoryIdentityStore {
    async fn load(&self, entry_id: EntryId) -> Result<Option<PersistedIdentity>, StoreError> {
        Ok(self.get(entry_id))
    }

    async fn save(&self, entry_id: EntryId, identity: &PersistedIdentity) -> Result<(), StoreError> {
        self.entries.write().insert(entry_id, identity.clone());
        Ok(())
    }

    async fn remove(&self, entry_id: EntryId) -> Result<bool, StoreError> {
        Ok(self.entries.write().remove(&entry_id).is_some())
    }
}

/// Identity store backed by a JSON file.
///
/// The file holds an object keyed by entry id. It is rewritten as a whole
/// on every save through a temporary file and a rename. A missing file
/// reads as empty.
#[derive(Debug)]
pub struct JsonFileIdentityStore {
    path: PathBuf,
    lock: Mutex<()>,
}

type IdentityFile = BTreeMap<String, PersistedIdentity>;

impl JsonFileIdentityStore {
    /// Creates a store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<IdentityFile, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(IdentityFile::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(IdentityFile::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, entries: &IdentityFile) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

impl IdentityStore for JsonFileIdentityStore {
    async fn load(&self, entry_id: EntryId) -> Result<Option<PersistedIdentity>, StoreError> {
        let _lock = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        Ok(entries.remove(&entry_id.to_string()))
    }

    async fn save(&self, entry_id: EntryId, identity: &PersistedIdentity) -> Result<(), StoreError> {
        let _lock = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        entries.insert(entry_id.to_string(), identity.clone());
        self.write_all(&entries).await?;
        tracing::debug!(%entry_id, path = %self.path.display(), "Identity saved");
        Ok(())
    }

    async fn remove(&self, entry_id: EntryId) -> Result<bool, StoreError> {
        let _lock = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        let removed = entries.remove(&entry_id.to_string()).is_some();
        if removed {
            self.write_all(&entries).await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: &str, address: &str) -> PersistedIdentity {
        PersistedIdentity::new(Some(StableId::new(id).unwrap()), Some(address.to_string()))
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("devsync-{name}-{}.json", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemoryIdentityStore::new();
        let entry = EntryId::new();

        assert!(store.load(entry).await.unwrap().is_none());
        store.save(entry, &identity("0x1", "192.168.1.20")).await.unwrap();
        assert_eq!(
            store.load(entry).await.unwrap(),
            Some(identity("0x1", "192.168.1.20"))
        );
        assert!(store.remove(entry).await.unwrap());
        assert!(!store.remove(entry).await.unwrap());
    }

    #[tokio::test]
    async fn file_store_missing_file_is_empty() {
        let store = JsonFileIdentityStore::new(temp_path("missing"));
        assert!(store.load(EntryId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let path = temp_path("reopen");
        let entry = EntryId::new();
        let other = EntryId::new();

        {
            let store = JsonFileIdentityStore::new(&path);
            store.save(entry, &identity("0x1", "192.168.1.20")).await.unwrap();
            store.save(other, &identity("0x2", "192.168.1.21")).await.unwrap();
            store.save(entry, &identity("0x1", "192.168.1.40")).await.unwrap();
        }

        let store = JsonFileIdentityStore::new(&path);
        assert_eq!(
            store.load(entry).await.unwrap(),
            Some(identity("0x1", "192.168.1.40"))
        );
        assert!(store.remove(other).await.unwrap());
        assert!(store.load(other).await.unwrap().is_none());

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn file_store_rejects_corrupt_file() {
        let path = temp_path("corrupt");
        tokio::fs::write(&path, "not json").await.unwrap();

        let store = JsonFileIdentityStore::new(&path);
        let err = store.load(EntryId::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::Json(_)));

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
