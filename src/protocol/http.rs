// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP cloud client for account-wide device snapshots.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::error::ClientError;
use crate::protocol::{FlapControl, RemoteClient};
use crate::state::Snapshot;
use crate::types::{LockState, StableId, StateBlob};

/// Configuration for a cloud account endpoint.
///
/// # Examples
///
/// ```
/// use devsync::protocol::HttpConfig;
/// use std::time::Duration;
///
/// let config = HttpConfig::new("https://app.example.io/api")
///     .with_credentials("me@example.org", "hunter2")
///     .with_timeout(Duration::from_secs(5));
///
/// assert_eq!(config.base_url(), "https://app.example.io/api");
/// ```
#[derive(Clone)]
pub struct HttpConfig {
    base_url: String,
    credentials: Option<(String, String)>,
    timeout: Duration,
}

impl HttpConfig {
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

    /// Creates a configuration for the given API base URL.
    ///
    /// A trailing slash is stripped.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials: None,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Sets account credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the credentials if set.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        self.credentials
            .as_ref()
            .map(|(u, p)| (u.as_str(), p.as_str()))
    }

    /// Returns the request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Creates an [`HttpCloudClient`] from this configuration.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Transport` if the HTTP client cannot be built.
    pub fn into_client(self) -> Result<HttpCloudClient, ClientError> {
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(HttpCloudClient {
            config: self,
            client,
        })
    }
}

impl std::fmt::Debug for HttpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.credentials.as_ref().map(|(u, _)| u))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// JSON REST client for a cloud account.
///
/// - `GET {base}/entities` returns an object mapping device ids to state
/// - `POST {base}/devices/{id}/lock` with `{"mode": "<lock state>"}` sets a flap
///
/// HTTP 401/403 map to [`ClientError::Auth`].
#[derive(Debug, Clone)]
pub struct HttpCloudClient {
    config: HttpConfig,
    client: Client,
}

impl HttpCloudClient {
    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    fn entities_url(&self) -> String {
        format!("{}/entities", self.config.base_url)
    }

    fn lock_url(&self, flap_id: &StableId) -> String {
        format!(
            "{}/devices/{}/lock",
            self.config.base_url,
            urlencoding::encode(flap_id.as_str())
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.credentials() {
            Some((username, password)) => request.basic_auth(username, Some(password)),
            None => request,
        }
    }

    fn classify(&self, err: reqwest::Error) -> ClientError {
        if err.is_timeout() {
            ClientError::timeout(self.config.timeout)
        } else {
            err.into()
        }
    }
}

impl RemoteClient for HttpCloudClient {
    async fn fetch_snapshot(&self) -> Result<Snapshot, ClientError> {
        let url = self.entities_url();
        tracing::debug!(url = %url, "Fetching entities");

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| self.classify(e))?;

        let entities: HashMap<String, Value> =
            response.json().await.map_err(|e| self.classify(e))?;

        let mut snapshot = Snapshot::with_capacity(entities.len());
        for (id, state) in entities {
            let id = StableId::new(id).map_err(|e| ClientError::Protocol(e.to_string()))?;
            snapshot.insert(id, StateBlob::new(state));
        }
        Ok(snapshot)
    }
}

impl FlapControl for HttpCloudClient {
    async fn set_lock_state(&self, flap_id: &StableId, state: LockState) -> Result<(), ClientError> {
        let url = self.lock_url(flap_id);
        tracing::debug!(url = %url, mode = %state, "Setting lock state");

        self.authorize(self.client.post(&url))
            .json(&serde_json::json!({ "mode": state }))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| self.classify(e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = HttpConfig::new("https://app.example.io/api/");
        assert_eq!(config.base_url(), "https://app.example.io/api");
        assert!(config.credentials().is_none());
        assert_eq!(config.timeout(), Duration::from_secs(15));
    }

    #[test]
    fn config_with_credentials() {
        let config = HttpConfig::new("http://localhost").with_credentials("user", "pass");
        assert_eq!(config.credentials(), Some(("user", "pass")));
    }

    #[test]
    fn lock_url_encodes_id() {
        let client = HttpConfig::new("http://localhost:8080")
            .into_client()
            .unwrap();
        let id = StableId::new("flap 1").unwrap();
        assert_eq!(
            client.lock_url(&id),
            "http://localhost:8080/devices/flap%201/lock"
        );
        assert_eq!(client.entities_url(), "http://localhost:8080/entities");
    }
}
