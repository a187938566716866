// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state types.
//!
//! A [`Snapshot`] is the unit of state exchanged between the poll loop and
//! readers. It is replaced as a whole, so a reader always sees the values of
//! exactly one poll (plus any optimistic writes applied on top of it).

mod snapshot;

pub use snapshot::Snapshot;
