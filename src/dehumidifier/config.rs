// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Accessory configuration as supplied by the host.

use serde::Deserialize;

use crate::device::DeviceConfig;
use crate::error::{Error, ParseError, Result};

/// Length of a miIO token in hex characters.
const TOKEN_LEN: usize = 32;

/// Accessory configuration block.
///
/// Field names follow the host's JSON (`camelCase`). Only `ip` and `token`
/// are required.
///
/// # Examples
///
/// ```
/// use miio_dehumidifier::dehumidifier::DehumidifierConfig;
///
/// let config = DehumidifierConfig::from_json(r#"{
///     "name": "Basement",
///     "ip": "192.168.1.40",
///     "token": "00112233445566778899aabbccddeeff",
///     "pollingInterval": 10000,
///     "ledSwitch": "Dehumidifier LED"
/// }"#).unwrap();
///
/// assert_eq!(config.display_name(), "Basement");
/// assert_eq!(config.led_switch.as_deref(), Some("Dehumidifier LED"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DehumidifierConfig {
    /// Display name of the dehumidifier service.
    #[serde(default)]
    pub name: Option<String>,
    /// Device IP address.
    pub ip: String,
    /// 32-character hex token.
    pub token: String,
    /// Polling interval in milliseconds.
    #[serde(default)]
    pub polling_interval: Option<u64>,
    /// Serial number override.
    #[serde(default)]
    pub serial: Option<String>,
    /// Model override.
    #[serde(default)]
    pub model: Option<String>,
    /// Manufacturer override.
    #[serde(default)]
    pub manufacturer: Option<String>,
    /// Display name of the optional LED switch. No switch when absent.
    #[serde(default)]
    pub led_switch: Option<String>,
    /// Display name of the optional buzzer switch. No switch when absent.
    #[serde(default)]
    pub buzzer_switch: Option<String>,
}

impl DehumidifierConfig {
    /// Display name used when the host supplies none.
    pub const DEFAULT_DISPLAY_NAME: &'static str = "Dehumidifier";

    /// Creates a configuration with only the required fields.
    #[must_use]
    pub fn new(ip: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            name: None,
            ip: ip.into(),
            token: token.into(),
            polling_interval: None,
            serial: None,
            model: None,
            manufacturer: None,
            led_switch: None,
            buzzer_switch: None,
        }
    }

    /// Parses and validates a JSON configuration block.
    ///
    /// # Errors
    ///
    /// Returns `Error::Parse` for malformed JSON and
    /// `Error::InvalidConfiguration` if validation fails.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(ParseError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the device can be addressed.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfiguration` if `ip` is empty or `token` is
    /// not 32 hex characters.
    pub fn validate(&self) -> Result<()> {
        if self.ip.trim().is_empty() {
            return Err(Error::InvalidConfiguration("ip is required".into()));
        }
        if self.token.len() != TOKEN_LEN || !self.token.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidConfiguration(format!(
                "token must be {TOKEN_LEN} hex characters"
            )));
        }
        Ok(())
    }

    /// Returns the service display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(Self::DEFAULT_DISPLAY_NAME)
    }

    /// Builds the device session configuration.
    #[must_use]
    pub fn device_config(&self) -> DeviceConfig {
        DeviceConfig::new(self.ip.clone(), self.token.clone())
            .with_polling_interval_ms(self.polling_interval)
    }

    /// Builds the accessory information, applying defaults.
    #[must_use]
    pub fn information(&self) -> AccessoryInformation {
        fn or_default(value: Option<&String>, default: &str) -> String {
            value
                .filter(|v| !v.is_empty())
                .map_or_else(|| default.to_string(), Clone::clone)
        }

        AccessoryInformation {
            manufacturer: or_default(
                self.manufacturer.as_ref(),
                AccessoryInformation::DEFAULT_MANUFACTURER,
            ),
            model: or_default(self.model.as_ref(), AccessoryInformation::DEFAULT_MODEL),
            serial_number: or_default(self.serial.as_ref(), &self.token.to_uppercase()),
        }
    }
}

/// Static identification shown by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessoryInformation {
    /// Manufacturer name.
    pub manufacturer: String,
    /// Model name.
    pub model: String,
    /// Serial number. Defaults to the upper-cased token.
    pub serial_number: String,
}

impl AccessoryInformation {
    /// Manufacturer used when none is configured.
    pub const DEFAULT_MANUFACTURER: &'static str = "New Widetech";

    /// Model used when none is configured.
    pub const DEFAULT_MODEL: &'static str = "Internet Dehumidifier";
}
