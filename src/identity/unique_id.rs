// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Unique ids of the entities exposed for a device.

use crate::types::{EntryId, StableId};

/// Entities a LAN device exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// The device itself.
    Main,
    /// Nightlight switch.
    Nightlight,
    /// Secondary (ambient) light.
    Ambilight,
    /// Nightlight binary sensor.
    NightlightSensor,
}

impl EntityKind {
    /// Returns the suffix appended to the base unique id.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Main => "",
            Self::Nightlight => "-nightlight",
            Self::Ambilight => "-ambilight",
            Self::NightlightSensor => "-nightlight_sensor",
        }
    }
}

/// Builds the unique id of an entity.
///
/// The stable id is used when known, otherwise the entry id.
///
/// # Examples
///
/// ```
/// use devsync::identity::{unique_id, EntityKind};
/// use devsync::types::{EntryId, StableId};
///
/// let id = StableId::new("0x15243f").unwrap();
/// assert_eq!(unique_id(Some(&id), EntryId::new(), EntityKind::Ambilight), "0x15243f-ambilight");
/// ```
#[must_use]
pub fn unique_id(stable_id: Option<&StableId>, entry_id: EntryId, kind: EntityKind) -> String {
    let base = stable_id.map_or_else(|| entry_id.to_string(), ToString::to_string);
    format!("{base}{}", kind.suffix())
}
