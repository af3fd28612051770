// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cancellable background task handle.

use std::future::Future;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handle to a spawned background loop.
///
/// The loop receives a cancel flag and is expected to return promptly once
/// it flips to `true`. Dropping the handle cancels the loop.
///
/// # Examples
///
/// ```
/// use devsync::coordinator::ScheduledTask;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let task = ScheduledTask::spawn(|mut cancel| async move {
///     let _ = cancel.changed().await;
/// });
///
/// task.stop().await;
/// # }
/// ```
#[derive(Debug)]
pub struct ScheduledTask {
    cancel: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// Spawns `body` on the tokio runtime.
    pub fn spawn<F, Fut>(body: F) -> Self
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (cancel, cancelled) = watch::channel(false);
        let handle = tokio::spawn(body(cancelled));
        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Signals the loop to stop without waiting for it.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Returns true once the loop has returned.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Cancels the loop and waits for it to return.
    pub async fn stop(mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
            && e.is_panic()
        {
            tracing::warn!(error = %e, "Background task panicked");
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel.send_replace(true);
    }
}

/// Resolves once the cancel flag is set or its sender is gone.
pub(crate) async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            return;
        }
    }
}
