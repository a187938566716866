// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device session: cached state, command dispatch and mapped accessors.
//!
//! A [`MiioDevice`] is the single session for one physical device. It owns
//! three cooperating parts:
//!
//! - [`StateCache`]: the polled snapshot every getter reads from
//! - [`CommandDispatcher`]: debouncing, the ensure-active precondition and
//!   post-write cache updates for every setter
//! - the property mapper ([`MiioDevice::map_get`], [`MiioDevice::map_set`]),
//!   which binds a characteristic to a device field or method
//!
//! ```no_run
//! use miio_dehumidifier::device::{DeviceConfig, MiioDevice, SetOptions};
//! use miio_dehumidifier::protocol::MockTransport;
//! use miio_dehumidifier::types::SwitchStatus;
//!
//! # async fn example() -> miio_dehumidifier::Result<()> {
//! let config = DeviceConfig::new("192.168.1.40", "00112233445566778899aabbccddeeff");
//! let device = MiioDevice::new(config, MockTransport::new());
//! device.start_polling();
//!
//! let get_led = device.map_get("getLed", |s| s.switch("led").map(|led| led.is_on()));
//! let set_led = device.map_set(
//!     "setLed",
//!     "set_led",
//!     |on: bool| SwitchStatus::from(on).into(),
//!     SetOptions::new().with_update("led"),
//! );
//!
//! set_led.set(true).await?;
//! assert!(get_led.get().await?);
//! # Ok(())
//! # }
//! ```

mod config;
mod dispatcher;
mod mapped;
mod state_cache;

pub use config::{DeviceConfig, DeviceIdentity};
pub use dispatcher::{CommandDispatcher, IsOn, SetOptions};
pub use mapped::{MappedGetter, MappedSetter};
pub use state_cache::StateCache;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;

use crate::protocol::Transport;
use crate::state::Snapshot;

/// The session for one physical miIO device.
///
/// Accessories referencing the same device should share one session; use a
/// [`DeviceRegistry`](crate::manager::DeviceRegistry) to get that guarantee.
pub struct MiioDevice<T: Transport> {
    identity: DeviceIdentity,
    polling_interval: Duration,
    cache: Arc<StateCache<T>>,
    dispatcher: Arc<CommandDispatcher<T>>,
}

impl<T: Transport> MiioDevice<T> {
    /// Creates a session. Polling does not start until
    /// [`start_polling`](Self::start_polling) is called.
    pub fn new(config: DeviceConfig, transport: T) -> Self {
        let transport = Arc::new(transport);
        let identity = config.identity().clone();
        let cache = Arc::new(StateCache::new(
            Arc::clone(&transport),
            identity.address(),
            config.tracked_keys().to_vec(),
        ));
        let dispatcher = Arc::new(CommandDispatcher::new(transport, Arc::clone(&cache)));

        Self {
            identity,
            polling_interval: config.polling_interval(),
            cache,
            dispatcher,
        }
    }

    /// Returns the device identity.
    #[must_use]
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Returns the configured polling interval.
    #[must_use]
    pub fn polling_interval(&self) -> Duration {
        self.polling_interval
    }

    /// Returns the state cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<StateCache<T>> {
        &self.cache
    }

    /// Returns the command dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<CommandDispatcher<T>> {
        &self.dispatcher
    }

    /// Starts polling at the configured interval. Idempotent.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_polling(&self) -> bool {
        self.cache.start_polling(self.polling_interval)
    }

    /// Stops polling.
    pub fn stop_polling(&self) {
        self.cache.stop_polling();
    }

    /// Returns the latest snapshot, possibly empty.
    #[must_use]
    pub fn latest(&self) -> Arc<Snapshot> {
        self.cache.latest()
    }

    /// Polls out of band. See [`StateCache::refresh`].
    pub async fn refresh(&self) -> bool {
        self.cache.refresh().await
    }

    /// Subscribes to snapshot replacements.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.cache.watch()
    }

    /// Binds a getter named `label` to a transform of the snapshot.
    ///
    /// The transform returns `None` when the fields it needs cannot be read.
    pub fn map_get<V, F>(&self, label: &str, transform: F) -> MappedGetter<T, V>
    where
        V: Send + 'static,
        F: Fn(&Snapshot) -> Option<V> + Send + Sync + 'static,
    {
        MappedGetter::new(label, Arc::clone(&self.cache), transform)
    }

    /// Binds a setter named `label` to the device `method`.
    ///
    /// The transform converts the characteristic value into the method's
    /// single parameter.
    pub fn map_set<I, F>(
        &self,
        label: &str,
        method: &str,
        transform: F,
        options: SetOptions,
    ) -> MappedSetter<T, I>
    where
        I: Send + 'static,
        F: Fn(I) -> Value + Send + Sync + 'static,
    {
        MappedSetter::new(
            label,
            method,
            transform,
            options,
            Arc::clone(&self.dispatcher),
        )
    }

    /// Registers the power predicate and the setter used to switch the device
    /// on before ensure-active commands.
    ///
    /// The setter's binding for `true` is retained, not the setter itself.
    pub fn register_power_hooks<F>(&self, is_on: F, power_setter: &MappedSetter<T, bool>)
    where
        F: Fn(&Snapshot) -> bool + Send + Sync + 'static,
    {
        self.dispatcher
            .register_power_hooks(Arc::new(is_on), power_setter.command_for(true));
    }

    /// Evaluates the registered power predicate against the latest snapshot.
    ///
    /// Returns `None` if no power hooks are registered or nothing has been
    /// polled yet.
    #[must_use]
    pub fn is_on(&self) -> Option<bool> {
        let snapshot = self.cache.latest();
        if snapshot.is_empty() {
            return None;
        }
        self.dispatcher.is_on(&snapshot)
    }
}

impl<T: Transport> std::fmt::Debug for MiioDevice<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiioDevice")
            .field("identity", &self.identity)
            .field("polling_interval", &self.polling_interval)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::protocol::{GET_PROP, MockTransport};
    use crate::types::SwitchStatus;

    fn device(transport: MockTransport) -> MiioDevice<MockTransport> {
        MiioDevice::new(config(), transport)
    }

    fn config() -> DeviceConfig {
        DeviceConfig::new("10.0.0.2", "00112233445566778899aabbccddeeff")
            .with_tracked_keys(["on_off", "led"])
    }

    #[tokio::test]
    async fn first_get_triggers_lazy_poll() {
        let transport = Arc::new(
            MockTransport::new()
                .with_property("on_off", "on")
                .with_property("led", "off"),
        );
        let device = MiioDevice::new(config(), Arc::clone(&transport));
        let get_led = device.map_get("getLed", |s| s.switch("led").map(|l| l.is_on()));

        assert!(!get_led.get().await.unwrap());
        assert!(!get_led.get().await.unwrap());

        assert_eq!(transport.count(GET_PROP), 1);
    }

    #[tokio::test]
    async fn get_before_any_successful_poll_is_not_available() {
        let transport = MockTransport::new();
        transport.fail_method(GET_PROP);
        let device = device(transport);
        let get_led = device.map_get("getLed", |s| s.switch("led").map(|l| l.is_on()));

        let err = get_led.get().await.unwrap_err();

        assert!(matches!(err, Error::NotYetAvailable { ref label } if label == "getLed"));
    }

    #[tokio::test]
    async fn set_updates_cache_optimistically() {
        let device = device(
            MockTransport::new()
                .with_property("on_off", "on")
                .with_property("led", "off"),
        );
        device.refresh().await;
        let set_led = device.map_set(
            "setLed",
            "set_led",
            |on: bool| SwitchStatus::from(on).into(),
            SetOptions::new().with_update("led"),
        );

        set_led.set(true).await.unwrap();

        assert_eq!(device.latest().get("led"), Some("on"));
    }

    #[tokio::test]
    async fn callback_style_reports_outcome() {
        let transport = MockTransport::new()
            .with_property("on_off", "on")
            .with_property("led", "off");
        transport.fail_method("set_led");
        let device = device(transport);
        let set_led = device.map_set(
            "setLed",
            "set_led",
            |on: bool| SwitchStatus::from(on).into(),
            SetOptions::new(),
        );
        let get_on = device.map_get("getActive", |s| s.switch("on_off").map(|p| p.is_on()));

        let (tx, rx) = tokio::sync::oneshot::channel();
        set_led.set_with(true, move |result| {
            let _ = tx.send(result);
        });
        assert!(matches!(rx.await.unwrap(), Err(Error::Transport(_))));

        let (tx, rx) = tokio::sync::oneshot::channel();
        get_on.get_with(move |result| {
            let _ = tx.send(result);
        });
        assert!(rx.await.unwrap().unwrap());
    }

    #[tokio::test]
    async fn is_on_uses_registered_predicate() {
        let device = device(
            MockTransport::new()
                .with_property("on_off", "off")
                .with_property("led", "off"),
        );
        let set_power = device.map_set(
            "setActive",
            "set_power",
            |on: bool| SwitchStatus::from(on).into(),
            SetOptions::new().with_update("on_off"),
        );
        assert_eq!(device.is_on(), None);

        device.register_power_hooks(|s| s.get("on_off") == Some("on"), &set_power);
        device.refresh().await;
        assert_eq!(device.is_on(), Some(false));

        set_power.set(true).await.unwrap();
        assert_eq!(device.is_on(), Some(true));
    }
}
