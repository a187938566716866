// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Property keys polled from the dehumidifier.

use std::fmt;

/// A property read with `get_prop`.
///
/// The declaration order is the order in which the properties are requested,
/// and therefore the order of values in the device response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DehumidifierProperty {
    /// Power switch.
    OnOff,
    /// Compressor running.
    CompressorStatus,
    /// Physical controls locked.
    ChildLock,
    /// Auto-mode humidity threshold.
    Auto,
    /// Measured relative humidity.
    Humidity,
    /// Water tank full.
    TankFull,
    /// Operating mode.
    Mode,
    /// Fan level.
    FanLevel,
    /// Buzzer enabled.
    Buzzer,
    /// Indicator LED enabled.
    Led,
}

impl DehumidifierProperty {
    /// Every tracked property, in request order.
    pub const ALL: [Self; 10] = [
        Self::OnOff,
        Self::CompressorStatus,
        Self::ChildLock,
        Self::Auto,
        Self::Humidity,
        Self::TankFull,
        Self::Mode,
        Self::FanLevel,
        Self::Buzzer,
        Self::Led,
    ];

    /// Returns the device protocol key.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::OnOff => "on_off",
            Self::CompressorStatus => "compressor_status",
            Self::ChildLock => "child_lock",
            Self::Auto => "auto",
            Self::Humidity => "humidity",
            Self::TankFull => "tank_full",
            Self::Mode => "mode",
            Self::FanLevel => "fan_st",
            Self::Buzzer => "buzzer",
            Self::Led => "led",
        }
    }

    /// Returns all keys as owned strings, ready for a tracked key set.
    #[must_use]
    pub fn all_keys() -> Vec<String> {
        Self::ALL.iter().map(|p| p.key().to_string()).collect()
    }
}

impl fmt::Display for DehumidifierProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
