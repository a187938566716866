// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device identity and session configuration.

use std::fmt;
use std::time::Duration;

use crate::types::DehumidifierProperty;

/// Network address and authentication token of one physical device.
///
/// Two identities are equal when both address and token match; the
/// [`DeviceRegistry`](crate::manager::DeviceRegistry) keys sessions on it.
/// The token is redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DeviceIdentity {
    address: String,
    token: String,
}

impl DeviceIdentity {
    /// Creates an identity.
    #[must_use]
    pub fn new(address: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            token: token.into(),
        }
    }

    /// Returns the device address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the authentication token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tail = self
            .token
            .char_indices()
            .rev()
            .nth(3)
            .map_or("", |(i, _)| &self.token[i..]);
        f.debug_struct("DeviceIdentity")
            .field("address", &self.address)
            .field("token", &format_args!("…{tail}"))
            .finish()
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

/// Configuration of a device session.
///
/// # Examples
///
/// ```
/// use miio_dehumidifier::device::DeviceConfig;
/// use std::time::Duration;
///
/// let config = DeviceConfig::new("192.168.1.40", "00112233445566778899aabbccddeeff")
///     .with_polling_interval(Duration::from_secs(10));
///
/// assert_eq!(config.polling_interval(), Duration::from_secs(10));
/// assert_eq!(config.tracked_keys().len(), 10);
/// ```
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    identity: DeviceIdentity,
    polling_interval: Duration,
    tracked_keys: Vec<String>,
}

impl DeviceConfig {
    /// Default interval between polls.
    pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(5);

    /// Creates a configuration tracking every dehumidifier property.
    #[must_use]
    pub fn new(address: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            identity: DeviceIdentity::new(address, token),
            polling_interval: Self::DEFAULT_POLLING_INTERVAL,
            tracked_keys: DehumidifierProperty::all_keys(),
        }
    }

    /// Sets the polling interval.
    #[must_use]
    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }

    /// Sets the polling interval in milliseconds, keeping the default when
    /// `millis` is `None` or zero.
    #[must_use]
    pub fn with_polling_interval_ms(mut self, millis: Option<u64>) -> Self {
        if let Some(millis) = millis.filter(|ms| *ms > 0) {
            self.polling_interval = Duration::from_millis(millis);
        }
        self
    }

    /// Replaces the tracked property keys.
    #[must_use]
    pub fn with_tracked_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tracked_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the device identity.
    #[must_use]
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Returns the polling interval.
    #[must_use]
    pub fn polling_interval(&self) -> Duration {
        self.polling_interval
    }

    /// Returns the tracked property keys, in request order.
    #[must_use]
    pub fn tracked_keys(&self) -> &[String] {
        &self.tracked_keys
    }
}
