// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! On/off switch status as reported by the dehumidifier.
//!
//! The device reports every boolean field (`on_off`, `child_lock`,
//! `tank_full`, `buzzer`, ...) as the lowercase strings `"on"` and `"off"`,
//! and expects the same strings as command parameters.

use std::fmt;
use std::str::FromStr;

use crate::error::ValueError;

/// Status of a two-state device field.
///
/// # Examples
///
/// ```
/// use miio_dehumidifier::types::SwitchStatus;
///
/// assert_eq!(SwitchStatus::from(true).as_str(), "on");
/// assert_eq!("off".parse::<SwitchStatus>().unwrap(), SwitchStatus::Off);
/// assert!(SwitchStatus::On.is_on());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchStatus {
    /// Field is off.
    Off,
    /// Field is on.
    On,
}

impl SwitchStatus {
    /// Returns the device protocol representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::On => "on",
        }
    }

    /// Returns `true` for [`SwitchStatus::On`].
    #[must_use]
    pub const fn is_on(&self) -> bool {
        matches!(self, Self::On)
    }
}

impl fmt::Display for SwitchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SwitchStatus {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" | "0" | "false" => Ok(Self::Off),
            "on" | "1" | "true" => Ok(Self::On),
            _ => Err(ValueError::InvalidSwitchStatus(s.to_string())),
        }
    }
}

impl From<bool> for SwitchStatus {
    fn from(value: bool) -> Self {
        if value { Self::On } else { Self::Off }
    }
}

impl From<SwitchStatus> for serde_json::Value {
    fn from(status: SwitchStatus) -> Self {
        Self::from(status.as_str())
    }
}
