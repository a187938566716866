// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounded numeric settings: fan level and auto-mode humidity threshold.

use std::fmt;

use crate::error::ValueError;

/// Clamps `value` into `[min, max]`.
///
/// Values at or beyond either bound collapse onto that bound; anything in
/// between passes through untouched.
///
/// # Examples
///
/// ```
/// use miio_dehumidifier::types::clamp_to_range;
///
/// assert_eq!(clamp_to_range(75.0, 40.0, 60.0), 60.0);
/// assert_eq!(clamp_to_range(10.0, 40.0, 60.0), 40.0);
/// assert_eq!(clamp_to_range(50.0, 40.0, 60.0), 50.0);
/// ```
#[must_use]
pub fn clamp_to_range(value: f64, min: f64, max: f64) -> f64 {
    if value >= max {
        max
    } else if value <= min {
        min
    } else {
        value
    }
}

/// Rounds a clamped value in `[min, max]` to the nearest integer step.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_round(value: f64, min: u8, max: u8) -> u8 {
    clamp_to_range(value, f64::from(min), f64::from(max)).round() as u8
}

/// Fan level (`fan_st` field, `set_fan_level` command), 1 to 3.
///
/// # Examples
///
/// ```
/// use miio_dehumidifier::types::FanLevel;
///
/// assert_eq!(FanLevel::clamped(7.0).value(), 3);
/// assert!(FanLevel::new(0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FanLevel(u8);

impl FanLevel {
    /// Lowest fan level.
    pub const MIN: u8 = 1;

    /// Highest fan level.
    pub const MAX: u8 = 3;

    /// Creates a fan level.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if `value` is outside [1, 3].
    pub fn new(value: u8) -> Result<Self, ValueError> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(ValueError::OutOfRange {
                min: Self::MIN,
                max: Self::MAX,
                actual: value,
            });
        }
        Ok(Self(value))
    }

    /// Creates a fan level, clamping and rounding into the valid range.
    #[must_use]
    pub fn clamped(value: f64) -> Self {
        Self(clamp_round(value, Self::MIN, Self::MAX))
    }

    /// Returns the level.
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for FanLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Target relative humidity in auto mode (`auto` field, `set_auto` command).
///
/// The device accepts 40 to 60 percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HumidityThreshold(u8);

impl HumidityThreshold {
    /// Lowest accepted threshold.
    pub const MIN: u8 = 40;

    /// Highest accepted threshold.
    pub const MAX: u8 = 60;

    /// Creates a threshold.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if `value` is outside [40, 60].
    pub fn new(value: u8) -> Result<Self, ValueError> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(ValueError::OutOfRange {
                min: Self::MIN,
                max: Self::MAX,
                actual: value,
            });
        }
        Ok(Self(value))
    }

    /// Creates a threshold, clamping and rounding into the valid range.
    #[must_use]
    pub fn clamped(value: f64) -> Self {
        Self(clamp_round(value, Self::MIN, Self::MAX))
    }

    /// Returns the threshold in percent.
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for HumidityThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}
