// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Opaque device state.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque state reported by a device or a cloud account.
///
/// The synchronizer never interprets the contents; it only compares blobs
/// by value to decide whether a device changed.
///
/// # Examples
///
/// ```
/// use devsync::types::StateBlob;
/// use serde_json::json;
///
/// let a = StateBlob::new(json!({"locking": {"mode": 0}}));
/// let b = StateBlob::new(json!({"locking": {"mode": 0}}));
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateBlob(Value);

impl StateBlob {
    /// Wraps a JSON value.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Returns the wrapped JSON value.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consumes the blob and returns the JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for StateBlob {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
