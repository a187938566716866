// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `miio_dehumidifier` - device communication core for miIO smart dehumidifiers.
//!
//! This library exposes the state and controls of a New Widetech (miIO
//! protocol) dehumidifier through the characteristic get/set model of a
//! home-automation accessory framework.
//!
//! # Features
//!
//! - **Cached state**: one batched `get_prop` poll per interval; getters read
//!   the cache and never touch the network after the first poll
//! - **Mapped accessors**: bind a characteristic to a device field or method
//!   with a transform, awaited or callback-style
//! - **Debounced writes**: rapid changes of the same setter collapse into one
//!   command carrying the last value
//! - **Ensure-active**: selected commands power the device on first
//! - **Derived setters**: threshold `0` and rotation speed `4` select modes
//! - **Shared sessions**: accessories for the same device share one poll loop
//!
//! The transport (UDP framing, encryption, handshake) is abstracted behind
//! [`protocol::Transport`].
//!
//! # Quick Start
//!
//! ```no_run
//! use miio_dehumidifier::dehumidifier::{Dehumidifier, DehumidifierConfig};
//! use miio_dehumidifier::manager::DeviceRegistry;
//! use miio_dehumidifier::protocol::MockTransport;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> miio_dehumidifier::Result<()> {
//!     let registry = DeviceRegistry::new();
//!     let config = DehumidifierConfig::from_json(r#"{
//!         "name": "Basement",
//!         "ip": "192.168.1.40",
//!         "token": "00112233445566778899aabbccddeeff",
//!         "pollingInterval": 5000
//!     }"#)?;
//!
//!     let dehumidifier =
//!         Dehumidifier::from_registry(&registry, &config, |_| MockTransport::new())?;
//!
//!     dehumidifier.active().set.set(true).await?;
//!     dehumidifier.set_rotation_speed(&json!(2)).await?;
//!
//!     let humidity = dehumidifier.current_relative_humidity().get().await?;
//!     println!("Humidity: {humidity}%");
//!     Ok(())
//! }
//! ```
//!
//! # Custom Bindings
//!
//! ```no_run
//! use miio_dehumidifier::device::{DeviceConfig, MiioDevice, SetOptions};
//! use miio_dehumidifier::protocol::MockTransport;
//! use serde_json::Value;
//! use std::time::Duration;
//!
//! # async fn example() -> miio_dehumidifier::Result<()> {
//! let device = MiioDevice::new(
//!     DeviceConfig::new("192.168.1.40", "00112233445566778899aabbccddeeff"),
//!     MockTransport::new(),
//! );
//!
//! let set_fan = device.map_set(
//!     "setFanLevel",
//!     "set_fan_level",
//!     |level: u8| Value::from(level),
//!     SetOptions::new().with_debounce(Duration::from_millis(400)),
//! );
//! set_fan.set(2).await?;
//! # Ok(())
//! # }
//! ```

pub mod dehumidifier;
pub mod device;
pub mod error;
pub mod manager;
pub mod protocol;
pub mod state;
pub mod types;

pub use dehumidifier::{Dehumidifier, DehumidifierConfig};
pub use device::{DeviceConfig, DeviceIdentity, MiioDevice, SetOptions};
pub use error::{Error, ParseError, Result, TransportError, ValueError};
pub use manager::DeviceRegistry;
pub use protocol::Transport;
pub use state::Snapshot;
pub use types::{DehumidifierProperty, FanLevel, HumidityThreshold, Mode, SwitchStatus};
