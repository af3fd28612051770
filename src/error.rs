// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `devsync` library.
//!
//! Errors are split in two layers:
//!
//! - [`ClientError`] is what injected adapters (cloud client, LAN link,
//!   discovery scanner) report. It never leaves the coordinator or the
//!   reconciler.
//! - [`PollError`], [`DiscoveryError`], [`SetupError`] and
//!   [`SubscriberError`] form the taxonomy callers actually see.

use std::time::Duration;

use thiserror::Error;

use crate::types::StableId;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred during value validation.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// A poll or a device action failed.
    #[error("poll error: {0}")]
    Poll(#[from] PollError),

    /// A discovery sweep did not resolve the device.
    #[error("discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Setting up an integration or a device entry failed.
    #[error("setup error: {0}")]
    Setup(#[from] SetupError),

    /// Reading or writing the persisted identity failed.
    #[error("identity store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors related to value validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// An unknown lock state name was provided.
    #[error("invalid lock state: {0}")]
    InvalidLockState(String),

    /// The device is not present in the state cache.
    #[error("unknown device: {0}")]
    UnknownDevice(StableId),

    /// A stable identifier was empty.
    #[error("stable id must not be empty")]
    EmptyStableId,
}

/// Errors reported by injected adapters.
///
/// These are converted into [`PollError`] or [`DiscoveryError`] at the
/// coordinator and reconciler boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The remote service rejected the credentials.
    #[error("authentication failed")]
    Auth,

    /// The remote could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote did not answer in time.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// The remote answered with something unexpected.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    /// Builds a timeout error from the elapsed budget.
    #[must_use]
    pub fn timeout(after: Duration) -> Self {
        Self::Timeout(u64::try_from(after.as_millis()).unwrap_or(u64::MAX))
    }

    /// Returns `true` if retrying with the same credentials cannot succeed.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth)
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status()
            && (status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN)
        {
            return Self::Auth;
        }
        if err.is_decode() || err.is_status() {
            return Self::Protocol(err.to_string());
        }
        Self::Transport(err.to_string())
    }
}

/// Classified failure of a poll.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PollError {
    /// Credentials are invalid; the caller must stop polling and reauthenticate.
    #[error("fatal: {0}")]
    Fatal(String),

    /// Network or server hiccup; the next scheduled tick retries.
    #[error("transient: {0}")]
    Transient(String),
}

impl PollError {
    /// Returns `true` for errors that must stop the poll loop.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    /// Returns `true` for errors retried on the next tick.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<ClientError> for PollError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Auth => Self::Fatal(err.to_string()),
            ClientError::Transport(_) | ClientError::Timeout(_) | ClientError::Protocol(_) => {
                Self::Transient(err.to_string())
            }
        }
    }
}

/// Failure of a discovery sweep.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    /// No matching device advertised itself before the deadline.
    #[error("no matching device found within {0} ms")]
    Timeout(u64),

    /// The sweep was cancelled by unload or a superseding event.
    #[error("discovery cancelled")]
    Cancelled,

    /// The device was found but refused the connection at its advertised address.
    #[error("device found but unavailable: {0}")]
    Unavailable(String),
}

impl DiscoveryError {
    pub(crate) fn timeout(after: Duration) -> Self {
        Self::Timeout(u64::try_from(after.as_millis()).unwrap_or(u64::MAX))
    }
}

/// Failure of an integration or device entry setup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SetupError {
    /// The remote rejected the credentials. Do not retry automatically.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The device could not be reached or identified yet; retry setup later.
    #[error("setup should be retried: {0}")]
    Retryable(String),

    /// The entry does not carry enough information to set up.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SetupError {
    /// Returns `true` if the host should schedule another setup attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

/// Failure reported by a single subscriber during fan-out.
///
/// Logged and isolated; never aborts delivery to the other subscribers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("subscriber failed: {0}")]
pub struct SubscriberError(String);

impl SubscriberError {
    /// Creates a subscriber error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Errors related to the persisted identity store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
