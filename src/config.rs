// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration for integrations and LAN device entries.
//!
//! - [`SyncConfig`] - Timing of polling and discovery
//! - [`CloudConfig`] - Account settings of a cloud integration, read from JSON
//! - [`EntryData`] / [`LanEntry`] - Stored data of a LAN device entry

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::discovery::DiscoveryOptions;
use crate::error::SetupError;
use crate::types::{EntryId, StableId};

/// Timing of polling and discovery.
///
/// # Examples
///
/// ```
/// use devsync::config::SyncConfig;
/// use std::time::Duration;
///
/// let config = SyncConfig::new()
///     .with_poll_interval(Duration::from_secs(30))
///     .with_discovery_timeout(Duration::from_secs(5));
///
/// assert_eq!(config.poll_interval, Duration::from_secs(30));
/// assert_eq!(config.poll_timeout, Duration::from_secs(15));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Time between two scheduled polls.
    pub poll_interval: Duration,
    /// Upper bound on a single snapshot fetch.
    pub poll_timeout: Duration,
    /// Upper bound on a single discovery sweep.
    pub discovery_timeout: Duration,
    /// Pause between two scans within a sweep.
    pub discovery_interval: Duration,
    /// Pause between two background sweeps of an unavailable device.
    pub rediscovery_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3 * 60),
            poll_timeout: Duration::from_secs(15),
            discovery_timeout: Duration::from_secs(10),
            discovery_interval: Duration::from_secs(2),
            rediscovery_interval: Duration::from_secs(60),
        }
    }
}

impl SyncConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the polling interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the snapshot fetch timeout.
    #[must_use]
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Sets the discovery sweep timeout.
    #[must_use]
    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Sets the pause between scans of a sweep.
    #[must_use]
    pub fn with_discovery_interval(mut self, interval: Duration) -> Self {
        self.discovery_interval = interval;
        self
    }

    /// Sets the pause between background sweeps.
    #[must_use]
    pub fn with_rediscovery_interval(mut self, interval: Duration) -> Self {
        self.rediscovery_interval = interval;
        self
    }

    /// Returns the discovery options derived from this configuration.
    #[must_use]
    pub fn discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions::new()
            .with_timeout(self.discovery_timeout)
            .with_interval(self.discovery_interval)
    }
}

/// Default cloud API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://app.api.surehub.io/api";

/// Account settings of a cloud integration.
///
/// `feeders`, `flaps`, `pets` and `scan_interval` come from older
/// configurations. They are still accepted but have no effect: every device
/// of the account is polled.
///
/// # Examples
///
/// ```
/// use devsync::config::CloudConfig;
///
/// let config = CloudConfig::from_json(r#"{"username": "me", "password": "secret"}"#).unwrap();
/// assert_eq!(config.username, "me");
/// assert!(!config.has_deprecated_options());
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Account user name.
    pub username: String,
    /// Account password.
    pub password: String,
    /// API endpoint, [`DEFAULT_BASE_URL`] when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Deprecated feeder ids.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feeders: Option<Vec<u64>>,
    /// Deprecated flap ids.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flaps: Option<Vec<u64>>,
    /// Deprecated pet ids.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pets: Option<Vec<u64>>,
    /// Deprecated polling interval in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_interval: Option<u64>,
}

impl CloudConfig {
    /// Creates a configuration from credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            base_url: None,
            feeders: None,
            flaps: None,
            pets: None,
            scan_interval: None,
        }
    }

    /// Sets the API endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns `SetupError::InvalidConfig` if the JSON is malformed, a
    /// required field is missing or empty, or a deprecated id list holds a
    /// non-positive id.
    pub fn from_json(json: &str) -> Result<Self, SetupError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| SetupError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks required fields and deprecated id lists.
    ///
    /// # Errors
    ///
    /// Returns `SetupError::InvalidConfig` describing the first problem found.
    pub fn validate(&self) -> Result<(), SetupError> {
        if self.username.trim().is_empty() {
            return Err(SetupError::InvalidConfig("username is required".to_string()));
        }
        if self.password.is_empty() {
            return Err(SetupError::InvalidConfig("password is required".to_string()));
        }
        for (name, ids) in [("feeders", &self.feeders), ("flaps", &self.flaps), ("pets", &self.pets)] {
            if ids.as_ref().is_some_and(|ids| ids.contains(&0)) {
                return Err(SetupError::InvalidConfig(format!(
                    "{name} must only contain positive ids"
                )));
            }
        }
        Ok(())
    }

    /// Returns the API endpoint.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Returns true if any deprecated option is set.
    #[must_use]
    pub fn has_deprecated_options(&self) -> bool {
        self.feeders.is_some()
            || self.flaps.is_some()
            || self.pets.is_some()
            || self.scan_interval.is_some()
    }

    /// Logs a warning for every deprecated option that is set.
    pub fn warn_deprecated(&self) {
        for (name, set) in [
            ("feeders", self.feeders.is_some()),
            ("flaps", self.flaps.is_some()),
            ("pets", self.pets.is_some()),
            ("scan_interval", self.scan_interval.is_some()),
        ] {
            if set {
                tracing::warn!(option = name, "Deprecated option is ignored and can be removed");
            }
        }
    }

    /// Builds the HTTP client configuration for this account.
    #[cfg(feature = "http")]
    #[must_use]
    pub fn http_config(&self, timeout: Duration) -> crate::protocol::HttpConfig {
        crate::protocol::HttpConfig::new(self.base_url())
            .with_credentials(&self.username, &self.password)
            .with_timeout(timeout)
    }
}

impl std::fmt::Debug for CloudConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("base_url", &self.base_url())
            .finish_non_exhaustive()
    }
}

/// Stored data of a LAN device entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryData {
    /// Vendor id of the device, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<StableId>,
    /// Address entered by the user or learned from discovery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Expose the nightlight as a separate switch.
    #[serde(default)]
    pub nightlight_switch: bool,
    /// The device has a background light, exposed as its own entity.
    #[serde(default)]
    pub ambilight: bool,
}

/// A configured LAN device entry.
///
/// # Examples
///
/// ```
/// use devsync::config::{EntryData, LanEntry};
///
/// let entry = LanEntry::new(EntryData {
///     host: Some("192.168.1.20".to_string()),
///     ..EntryData::default()
/// })
/// .with_unique_id("0x000000000015243f");
///
/// assert!(entry.data.id.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanEntry {
    /// Host-side identifier of the entry.
    pub entry_id: EntryId,
    /// Unique id the host registered the entry under, if any.
    pub unique_id: Option<String>,
    /// Stored entry data.
    pub data: EntryData,
}

impl LanEntry {
    /// Creates an entry with a fresh entry id.
    #[must_use]
    pub fn new(data: EntryData) -> Self {
        Self {
            entry_id: EntryId::new(),
            unique_id: None,
            data,
        }
    }

    /// Sets the entry id.
    #[must_use]
    pub fn with_entry_id(mut self, entry_id: EntryId) -> Self {
        self.entry_id = entry_id;
        self
    }

    /// Sets the host-side unique id.
    #[must_use]
    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }

    /// Fills a missing `data.id` from the unique id.
    ///
    /// Returns true if the id was filled in.
    pub fn backfill_id(&mut self) -> bool {
        if self.data.id.is_some() {
            return false;
        }
        match self.unique_id.as_deref().map(StableId::new) {
            Some(Ok(id)) => {
                self.data.id = Some(id);
                true
            }
            _ => false,
        }
    }
}
