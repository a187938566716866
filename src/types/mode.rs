// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dehumidifier operating modes.

use std::fmt;
use std::str::FromStr;

use crate::error::ValueError;

/// Operating mode of the dehumidifier (`mode` field, `set_mode` command).
///
/// - `Auto`: holds the humidity threshold set with `set_auto`
/// - `On`: continuous dehumidification, threshold ignored
/// - `DryCloth`: laundry drying at maximum airflow
///
/// # Examples
///
/// ```
/// use miio_dehumidifier::types::Mode;
///
/// assert_eq!(Mode::DryCloth.as_str(), "dry_cloth");
/// assert_eq!("auto".parse::<Mode>().unwrap(), Mode::Auto);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Laundry drying mode.
    DryCloth,
    /// Threshold-driven mode.
    Auto,
    /// Continuous mode.
    On,
}

impl Mode {
    /// Returns the device protocol representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DryCloth => "dry_cloth",
            Self::Auto => "auto",
            Self::On => "on",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dry_cloth" => Ok(Self::DryCloth),
            "auto" => Ok(Self::Auto),
            "on" => Ok(Self::On),
            _ => Err(ValueError::InvalidMode(s.to_string())),
        }
    }
}

impl From<Mode> for serde_json::Value {
    fn from(mode: Mode) -> Self {
        Self::from(mode.as_str())
    }
}
