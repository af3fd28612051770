// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types shared across the synchronizer.
//!
//! # Types
//!
//! - [`StableId`] - Vendor-assigned identifier of a physical device
//! - [`EntryId`] - Identifier of a configured entry on the host side
//! - [`StateBlob`] - Opaque device state, compared by value
//! - [`LockState`] - Closed set of flap lock modes

mod entry_id;
mod lock_state;
mod stable_id;
mod state_blob;

pub use entry_id::EntryId;
pub use lock_state::LockState;
pub use stable_id::StableId;
pub use state_blob::StateBlob;
