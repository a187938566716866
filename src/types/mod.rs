// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types for dehumidifier control.
//!
//! # Types
//!
//! - [`SwitchStatus`] - `"on"`/`"off"` fields
//! - [`Mode`] - Operating mode (dry cloth, auto, continuous)
//! - [`FanLevel`] - Fan level (1-3)
//! - [`HumidityThreshold`] - Auto-mode target humidity (40-60%)
//! - [`DehumidifierProperty`] - Keys polled with `get_prop`

mod level;
mod mode;
mod property;
mod switch;

pub use level::{FanLevel, HumidityThreshold, clamp_to_range};
pub use mode::Mode;
pub use property::DehumidifierProperty;
pub use switch::SwitchStatus;
