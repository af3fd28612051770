// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounded discovery sweeps over an injected LAN scanner.
//!
//! A [`DiscoveryScanner`] enumerates devices advertising themselves on the
//! local network. One scan is finite: its receiver closes once the scanner
//! stops listening. A sweep repeats scans at a fixed interval until a device
//! matching the [`DiscoveryFilter`] shows up, the sweep times out, or it is
//! cancelled.
//!
//! # Examples
//!
//! ```no_run
//! use devsync::discovery::{sweep, DiscoveryFilter, DiscoveryOptions, DiscoveryScanner};
//! use devsync::types::StableId;
//! use std::time::Duration;
//! use tokio::sync::watch;
//!
//! # async fn example<S: DiscoveryScanner>(scanner: &S) {
//! let (_cancel, cancelled) = watch::channel(false);
//! let options = DiscoveryOptions::new().with_timeout(Duration::from_secs(10));
//! let filter = DiscoveryFilter::ById(StableId::new("0x000000000015243f").unwrap());
//!
//! match sweep(scanner, &filter, &options, cancelled).await {
//!     Ok(found) => println!("{} is at {}", found.stable_id, found.network_address),
//!     Err(e) => println!("not found: {e}"),
//! }
//! # }
//! ```

use std::fmt;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::coordinator::cancelled;
use crate::error::DiscoveryError;
use crate::types::StableId;

/// Default sweep timeout.
const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default pause between two scans of a sweep.
const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(2);

/// A device seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Identifier the device advertises.
    pub stable_id: StableId,
    /// Address the advertisement came from.
    pub network_address: String,
}

impl DiscoveredDevice {
    /// Creates a discovered device.
    #[must_use]
    pub fn new(stable_id: StableId, network_address: impl Into<String>) -> Self {
        Self {
            stable_id,
            network_address: network_address.into(),
        }
    }
}

/// What a sweep is looking for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryFilter {
    /// The device advertising this stable id, wherever it is.
    ById(StableId),
    /// Whatever device answers from this address.
    ByAddress(String),
}

impl DiscoveryFilter {
    /// Returns true if `device` satisfies the filter.
    #[must_use]
    pub fn matches(&self, device: &DiscoveredDevice) -> bool {
        match self {
            Self::ById(id) => &device.stable_id == id,
            Self::ByAddress(address) => &device.network_address == address,
        }
    }
}

impl fmt::Display for DiscoveryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ById(id) => write!(f, "id={id}"),
            Self::ByAddress(address) => write!(f, "address={address}"),
        }
    }
}

/// LAN discovery capability.
pub trait DiscoveryScanner: Send + Sync + 'static {
    /// Starts one finite scan.
    ///
    /// The filter is a hint; scanners may report non-matching devices and
    /// the sweep filters again. Each call starts a fresh scan.
    fn scan(&self, filter: &DiscoveryFilter) -> mpsc::Receiver<DiscoveredDevice>;
}

/// Timing of a discovery sweep.
///
/// # Examples
///
/// ```
/// use devsync::discovery::DiscoveryOptions;
/// use std::time::Duration;
///
/// let options = DiscoveryOptions::new()
///     .with_timeout(Duration::from_secs(30))
///     .with_interval(Duration::from_secs(5));
///
/// assert_eq!(options.timeout(), Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    timeout: Option<Duration>,
    interval: Option<Duration>,
}

impl DiscoveryOptions {
    /// Creates options with default settings.
    ///
    /// Default timeout is 10 seconds, default scan interval 2 seconds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the overall sweep timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the pause between two scans.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Returns the sweep timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_DISCOVERY_TIMEOUT)
    }

    /// Returns the scan interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval.unwrap_or(DEFAULT_SCAN_INTERVAL)
    }
}

/// Runs a bounded, cancellable discovery sweep.
///
/// Scans repeatedly, `options.interval()` apart, until a device matching
/// `filter` is reported. The whole sweep is bounded by `options.timeout()`.
/// Sending `true` on the cancel channel, or dropping its sender, stops the
/// sweep. Scan receivers are dropped on every exit path.
///
/// # Errors
///
/// - `DiscoveryError::Timeout` if nothing matched before the deadline
/// - `DiscoveryError::Cancelled` if the sweep was cancelled
pub async fn sweep<S: DiscoveryScanner + ?Sized>(
    scanner: &S,
    filter: &DiscoveryFilter,
    options: &DiscoveryOptions,
    mut cancel: watch::Receiver<bool>,
) -> Result<DiscoveredDevice, DiscoveryError> {
    let timeout = options.timeout();
    tracing::debug!(%filter, timeout_secs = timeout.as_secs(), "Starting discovery sweep");

    let search = async {
        loop {
            let mut scan = scanner.scan(filter);
            while let Some(device) = scan.recv().await {
                if filter.matches(&device) {
                    return device;
                }
                tracing::trace!(
                    stable_id = %device.stable_id,
                    address = %device.network_address,
                    "Ignoring non-matching device"
                );
            }
            tokio::time::sleep(options.interval()).await;
        }
    };

    tokio::select! {
        () = cancelled(&mut cancel) => {
            tracing::debug!(%filter, "Discovery sweep cancelled");
            Err(DiscoveryError::Cancelled)
        }
        result = tokio::time::timeout(timeout, search) => match result {
            Ok(device) => {
                tracing::info!(
                    stable_id = %device.stable_id,
                    address = %device.network_address,
                    "Discovered device"
                );
                Ok(device)
            }
            Err(_) => {
                tracing::debug!(%filter, "Discovery sweep timed out");
                Err(DiscoveryError::timeout(timeout))
            }
        },
    }
}
