// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Account-wide cloud integration.

use crate::config::SyncConfig;
use crate::coordinator::PollingCoordinator;
use crate::error::{Error, PollError, SetupError, ValueError};
use crate::event::EventBus;
use crate::protocol::FlapControl;
use crate::state::ChangeSet;
use crate::types::{EntryId, LockState, StableId};

use super::IntegrationContext;

/// A cloud account whose devices are polled as one snapshot.
///
/// # Examples
///
/// ```no_run
/// use devsync::config::{CloudConfig, SyncConfig};
/// use devsync::event::EventBus;
/// use devsync::integration::CloudIntegration;
/// use devsync::types::{EntryId, LockState, StableId};
///
/// # async fn example() -> devsync::Result<()> {
/// let account = CloudConfig::from_json(r#"{"username": "me", "password": "secret"}"#)?;
/// let mut cloud =
///     CloudIntegration::from_config(EntryId::new(), &account, &SyncConfig::default(), EventBus::new())
///         .await?;
///
/// cloud.set_lock_state(&StableId::from(13_579_u64), LockState::LockedIn).await?;
///
/// cloud.unload().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CloudIntegration<C> {
    context: IntegrationContext<C>,
}

impl<C: FlapControl> CloudIntegration<C> {
    /// Sets up the integration.
    ///
    /// Polls once before scheduling. Scheduled polling starts one interval
    /// later.
    ///
    /// # Errors
    ///
    /// Returns `SetupError::Auth` if the initial poll was rejected for bad
    /// credentials. Other initial poll failures are logged and setup
    /// continues with an empty cache.
    pub async fn setup(
        entry_id: EntryId,
        client: C,
        config: &SyncConfig,
        events: EventBus,
    ) -> Result<Self, SetupError> {
        let coordinator = PollingCoordinator::new(entry_id, client, config, events.clone());

        match coordinator.refresh_now().await {
            Ok(changed) => {
                tracing::info!(%entry_id, devices = changed.len(), "Cloud integration loaded");
            }
            Err(PollError::Fatal(message)) => return Err(SetupError::Auth(message)),
            Err(PollError::Transient(message)) => {
                tracing::warn!(%entry_id, error = %message, "Initial refresh failed, continuing setup");
            }
        }

        let mut context = IntegrationContext::new(coordinator, events);
        let task = context.coordinator().start_deferred();
        context.track(task);

        Ok(Self { context })
    }

    /// Returns the entry id.
    #[must_use]
    pub fn entry_id(&self) -> EntryId {
        self.context.entry_id()
    }

    /// Returns the coordinator.
    #[must_use]
    pub fn coordinator(&self) -> &PollingCoordinator<C> {
        self.context.coordinator()
    }

    /// Returns the integration context.
    #[must_use]
    pub fn context(&self) -> &IntegrationContext<C> {
        &self.context
    }

    /// Sets the lock mode of a flap, then refreshes.
    ///
    /// Returns the ids changed by the refresh. A failed refresh after a
    /// successful action yields an empty set.
    ///
    /// # Errors
    ///
    /// - `ValueError::UnknownDevice` if the flap is not in the cache
    /// - `PollError` if the remote rejected the action
    pub async fn set_lock_state(
        &self,
        flap_id: &StableId,
        lock_state: LockState,
    ) -> Result<ChangeSet, Error> {
        let coordinator = self.coordinator();
        if !coordinator.contains(flap_id) {
            return Err(ValueError::UnknownDevice(flap_id.clone()).into());
        }

        tracing::info!(entry_id = %self.entry_id(), %flap_id, mode = %lock_state, "Setting lock state");
        coordinator
            .client()
            .set_lock_state(flap_id, lock_state)
            .await
            .map_err(PollError::from)?;

        Ok(coordinator.refresh_now().await.unwrap_or_default())
    }

    /// Service-call form of [`set_lock_state`](Self::set_lock_state).
    ///
    /// Both arguments come as text; the lock state is matched
    /// case-insensitively.
    ///
    /// # Errors
    ///
    /// Also returns `ValueError` for an empty flap id or an unknown lock state.
    pub async fn handle_set_lock_state(
        &self,
        flap_id: &str,
        lock_state: &str,
    ) -> Result<ChangeSet, Error> {
        let flap_id: StableId = flap_id.parse()?;
        let lock_state: LockState = lock_state.parse()?;
        self.set_lock_state(&flap_id, lock_state).await
    }

    /// Stops polling.
    pub async fn unload(&mut self) {
        self.context.shutdown().await;
        tracing::info!(entry_id = %self.entry_id(), "Cloud integration unloaded");
    }
}

#[cfg(feature = "http")]
impl CloudIntegration<crate::protocol::HttpCloudClient> {
    /// Sets up the integration against the HTTP API described by `account`.
    ///
    /// Deprecated options in `account` are logged and ignored.
    ///
    /// # Errors
    ///
    /// `SetupError::InvalidConfig` for an invalid account, otherwise as
    /// [`setup`](Self::setup).
    pub async fn from_config(
        entry_id: EntryId,
        account: &crate::config::CloudConfig,
        config: &SyncConfig,
        events: EventBus,
    ) -> Result<Self, SetupError> {
        account.validate()?;
        account.warn_deprecated();

        let client = account
            .http_config(config.poll_timeout)
            .into_client()
            .map_err(|e| SetupError::InvalidConfig(e.to_string()))?;

        Self::setup(entry_id, client, config, events).await
    }
}
