// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared device sessions.
//!
//! Several accessories may point at the same physical device (one accessory
//! per characteristic group, or the same device configured twice). They must
//! all talk through one [`MiioDevice`](crate::device::MiioDevice) so that
//! there is a single poll loop and a single debounce map per device.
//!
//! ```
//! use miio_dehumidifier::device::DeviceConfig;
//! use miio_dehumidifier::manager::DeviceRegistry;
//! use miio_dehumidifier::protocol::MockTransport;
//! use std::sync::Arc;
//!
//! let registry = DeviceRegistry::new();
//! let config = DeviceConfig::new("192.168.1.40", "00112233445566778899aabbccddeeff");
//!
//! let first = registry.get_or_create(config.clone(), |_| MockTransport::new());
//! let second = registry.get_or_create(config, |_| MockTransport::new());
//!
//! assert!(Arc::ptr_eq(&first, &second));
//! ```

mod device_registry;

pub use device_registry::DeviceRegistry;
