// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Characteristic values derived from a device snapshot.
//!
//! Each function reads the fields it needs and returns `None` when one of
//! them is missing or unreadable.

use std::fmt;

use crate::state::Snapshot;
use crate::types::{DehumidifierProperty, Mode};

/// Current activity of a humidifier-dehumidifier service.
///
/// Discriminants match the accessory protocol's numeric values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CurrentState {
    /// Powered off.
    Inactive = 0,
    /// Powered on, compressor idle.
    Idle = 1,
    /// Humidifying. Never reported by this device.
    Humidifying = 2,
    /// Compressor running.
    Dehumidifying = 3,
}

impl CurrentState {
    /// Returns the numeric characteristic value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for CurrentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Inactive => "inactive",
            Self::Idle => "idle",
            Self::Humidifying => "humidifying",
            Self::Dehumidifying => "dehumidifying",
        };
        f.write_str(name)
    }
}

/// Requested operating target. The device only supports dehumidifying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum TargetState {
    /// Dehumidify.
    #[default]
    Dehumidifier = 2,
}

impl TargetState {
    /// Returns the numeric characteristic value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

fn switch_on(snapshot: &Snapshot, property: DehumidifierProperty) -> Option<bool> {
    snapshot.switch(property.key()).map(|status| status.is_on())
}

/// Active: `on_off` is on.
#[must_use]
pub fn active(snapshot: &Snapshot) -> Option<bool> {
    switch_on(snapshot, DehumidifierProperty::OnOff)
}

/// Power predicate used by the ensure-active precondition.
///
/// Anything other than a readable "on" counts as off.
#[must_use]
pub fn is_on(snapshot: &Snapshot) -> bool {
    active(snapshot).unwrap_or(false)
}

/// Lock physical controls: `child_lock` is on.
#[must_use]
pub fn lock_physical_controls(snapshot: &Snapshot) -> Option<bool> {
    switch_on(snapshot, DehumidifierProperty::ChildLock)
}

/// Buzzer switch: `buzzer` is on.
#[must_use]
pub fn buzzer(snapshot: &Snapshot) -> Option<bool> {
    switch_on(snapshot, DehumidifierProperty::Buzzer)
}

/// LED switch: `led` is on.
#[must_use]
pub fn led(snapshot: &Snapshot) -> Option<bool> {
    switch_on(snapshot, DehumidifierProperty::Led)
}

/// Relative humidity threshold: `0` in continuous mode, else the `auto`
/// target.
#[must_use]
pub fn relative_humidity_threshold(snapshot: &Snapshot) -> Option<f64> {
    if snapshot.mode(DehumidifierProperty::Mode.key()) == Some(Mode::On) {
        return Some(0.0);
    }
    snapshot.number(DehumidifierProperty::Auto.key())
}

/// Rotation speed: the fan level.
#[must_use]
pub fn rotation_speed(snapshot: &Snapshot) -> Option<f64> {
    snapshot.number(DehumidifierProperty::FanLevel.key())
}

/// Current state, from compressor and power fields.
///
/// An unreadable compressor field falls through to the power check.
#[must_use]
pub fn current_state(snapshot: &Snapshot) -> Option<CurrentState> {
    if switch_on(snapshot, DehumidifierProperty::CompressorStatus) == Some(true) {
        return Some(CurrentState::Dehumidifying);
    }
    if active(snapshot)? {
        return Some(CurrentState::Idle);
    }
    Some(CurrentState::Inactive)
}

/// Current relative humidity in percent.
#[must_use]
pub fn current_relative_humidity(snapshot: &Snapshot) -> Option<f64> {
    snapshot.number(DehumidifierProperty::Humidity.key())
}

/// Water level: 100 when the tank is full, else 0.
#[must_use]
pub fn water_level(snapshot: &Snapshot) -> Option<f64> {
    switch_on(snapshot, DehumidifierProperty::TankFull).map(|full| if full { 100.0 } else { 0.0 })
}
