// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dehumidifier accessory: characteristic bindings and derived setters.
//!
//! [`Dehumidifier`] wires a device session to the characteristics of a
//! humidifier-dehumidifier service plus the optional buzzer and LED switches.
//! Most characteristics map one device field to one value. Two do not:
//!
//! - the relative humidity threshold uses `0` to mean continuous mode
//! - the rotation speed uses `4` to mean dry-cloth mode
//!
//! Setting either of those runs a two-step sequence (mode change, then the
//! numeric command) where the second step only runs if the first succeeded.
//!
//! ```no_run
//! use miio_dehumidifier::dehumidifier::{Dehumidifier, DehumidifierConfig};
//! use miio_dehumidifier::manager::DeviceRegistry;
//! use miio_dehumidifier::protocol::MockTransport;
//! use serde_json::json;
//!
//! # async fn example() -> miio_dehumidifier::Result<()> {
//! let registry = DeviceRegistry::new();
//! let config = DehumidifierConfig::new("192.168.1.40", "00112233445566778899aabbccddeeff");
//! let dehumidifier = Dehumidifier::from_registry(&registry, &config, |_| MockTransport::new())?;
//!
//! // Switch to auto mode with a 45 % target.
//! dehumidifier.set_relative_humidity_threshold(&json!(45)).await?;
//! let state = dehumidifier.current_state().get().await?;
//! println!("{state}");
//! # Ok(())
//! # }
//! ```

mod characteristic;
mod config;

pub use characteristic::{
    CurrentState, TargetState, active, buzzer, current_relative_humidity, current_state, is_on,
    led, lock_physical_controls, relative_humidity_threshold, rotation_speed, water_level,
};
pub use config::{AccessoryInformation, DehumidifierConfig};

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::device::{DeviceIdentity, MappedGetter, MappedSetter, MiioDevice, SetOptions};
use crate::error::{Error, Result};
use crate::manager::DeviceRegistry;
use crate::protocol::Transport;
use crate::state::Snapshot;
use crate::types::{DehumidifierProperty, FanLevel, HumidityThreshold, Mode, SwitchStatus};

/// Quiet period before a fan level change is sent.
pub const FAN_LEVEL_DEBOUNCE: Duration = Duration::from_millis(400);

/// Rotation speed selecting dry-cloth mode.
pub const DRY_CLOTH_ROTATION_SPEED: f64 = 4.0;

/// Threshold selecting continuous mode.
pub const CONTINUOUS_THRESHOLD: f64 = 0.0;

const SET_THRESHOLD_LABEL: &str = "setRelativeHumidityDehumidifierThreshold";
const SET_ROTATION_SPEED_LABEL: &str = "setRotationSpeed";

/// An on/off characteristic with its getter and setter.
pub struct SwitchCharacteristic<T: Transport> {
    /// Reads the switch.
    pub get: MappedGetter<T, bool>,
    /// Writes the switch.
    pub set: MappedSetter<T, bool>,
}

impl<T: Transport> SwitchCharacteristic<T> {
    fn bind(
        device: &MiioDevice<T>,
        name: &str,
        method: &str,
        property: DehumidifierProperty,
        read: fn(&Snapshot) -> Option<bool>,
    ) -> Self {
        Self {
            get: device.map_get(&format!("get{name}"), read),
            set: device.map_set(
                &format!("set{name}"),
                method,
                |on: bool| SwitchStatus::from(on).into(),
                SetOptions::new().with_update(property.key()),
            ),
        }
    }
}

impl<T: Transport> std::fmt::Debug for SwitchCharacteristic<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwitchCharacteristic")
            .field("get", &self.get)
            .field("set", &self.set)
            .finish()
    }
}

/// An optional stand-alone switch service with its display name.
#[derive(Debug)]
pub struct ExtraSwitch<T: Transport> {
    /// Display name from the configuration.
    pub name: String,
    /// The switch characteristic.
    pub on: SwitchCharacteristic<T>,
}

/// Internal setters behind the derived threshold and rotation speed setters.
struct ModeSequencer<T: Transport> {
    set_mode: MappedSetter<T, Mode>,
    set_threshold: MappedSetter<T, HumidityThreshold>,
    set_fan_level: MappedSetter<T, FanLevel>,
}

impl<T: Transport> ModeSequencer<T> {
    fn bind(device: &MiioDevice<T>) -> Self {
        Self {
            set_mode: device.map_set(
                "setMode",
                "set_mode",
                |mode: Mode| Value::from(mode),
                SetOptions::new()
                    .with_ensure_active()
                    .with_update(DehumidifierProperty::Mode.key()),
            ),
            set_threshold: device.map_set(
                "setRelativeHumidityThreshold",
                "set_auto",
                |threshold: HumidityThreshold| Value::from(threshold.value()),
                SetOptions::new()
                    .with_ensure_active()
                    .with_update(DehumidifierProperty::Auto.key()),
            ),
            set_fan_level: device.map_set(
                "setFanLevel",
                "set_fan_level",
                |level: FanLevel| Value::from(level.value()),
                SetOptions::new()
                    .with_debounce(FAN_LEVEL_DEBOUNCE)
                    .with_update(DehumidifierProperty::FanLevel.key()),
            ),
        }
    }

    #[allow(clippy::float_cmp)]
    async fn set_relative_humidity_threshold(&self, value: &Value) -> Result<()> {
        let value = numeric(SET_THRESHOLD_LABEL, value)?;
        if value == CONTINUOUS_THRESHOLD {
            return self.set_mode.set(Mode::On).await;
        }

        self.set_mode.set(Mode::Auto).await?;
        self.set_threshold
            .set(HumidityThreshold::clamped(value))
            .await
    }

    #[allow(clippy::float_cmp)]
    async fn set_rotation_speed(&self, value: &Value) -> Result<()> {
        let value = numeric(SET_ROTATION_SPEED_LABEL, value)?;
        if value == DRY_CLOTH_ROTATION_SPEED {
            return self.set_mode.set(Mode::DryCloth).await;
        }

        self.set_mode.set(Mode::Auto).await?;
        self.set_fan_level.set(FanLevel::clamped(value)).await
    }
}

impl<T: Transport> Clone for ModeSequencer<T> {
    fn clone(&self) -> Self {
        Self {
            set_mode: self.set_mode.clone(),
            set_threshold: self.set_threshold.clone(),
            set_fan_level: self.set_fan_level.clone(),
        }
    }
}

fn numeric(label: &str, value: &Value) -> Result<f64> {
    value.as_f64().ok_or_else(|| Error::InvalidValue {
        label: label.to_string(),
        reason: format!("expected a number, got {value}"),
    })
}

/// A dehumidifier accessory bound to a device session.
pub struct Dehumidifier<T: Transport> {
    device: Arc<MiioDevice<T>>,
    name: String,
    information: AccessoryInformation,
    active: SwitchCharacteristic<T>,
    lock_physical_controls: SwitchCharacteristic<T>,
    relative_humidity_threshold: MappedGetter<T, f64>,
    rotation_speed: MappedGetter<T, f64>,
    current_state: MappedGetter<T, CurrentState>,
    current_relative_humidity: MappedGetter<T, f64>,
    water_level: MappedGetter<T, f64>,
    buzzer: Option<ExtraSwitch<T>>,
    led: Option<ExtraSwitch<T>>,
    sequencer: ModeSequencer<T>,
}

impl<T: Transport> Dehumidifier<T> {
    /// Binds every characteristic to `device` and registers its power hooks.
    pub fn new(device: Arc<MiioDevice<T>>, config: &DehumidifierConfig) -> Self {
        let active = SwitchCharacteristic::bind(
            &device,
            "Active",
            "set_power",
            DehumidifierProperty::OnOff,
            active,
        );
        device.register_power_hooks(is_on, &active.set);

        let buzzer = config.buzzer_switch.as_deref().map(|name| ExtraSwitch {
            name: name.to_string(),
            on: SwitchCharacteristic::bind(
                &device,
                "Buzzer",
                "set_buzzer",
                DehumidifierProperty::Buzzer,
                buzzer,
            ),
        });
        let led = config.led_switch.as_deref().map(|name| ExtraSwitch {
            name: name.to_string(),
            on: SwitchCharacteristic::bind(
                &device,
                "Led",
                "set_led",
                DehumidifierProperty::Led,
                led,
            ),
        });

        Self {
            name: config.display_name().to_string(),
            information: config.information(),
            lock_physical_controls: SwitchCharacteristic::bind(
                &device,
                "LockPhysicalControls",
                "set_child_lock",
                DehumidifierProperty::ChildLock,
                lock_physical_controls,
            ),
            relative_humidity_threshold: device
                .map_get("getRelativeHumidityThreshold", relative_humidity_threshold),
            rotation_speed: device.map_get("getRotationSpeed", rotation_speed),
            current_state: device.map_get("getCurrentHumidifierDehumidifierState", current_state),
            current_relative_humidity: device
                .map_get("getCurrentRelativeHumidity", current_relative_humidity),
            water_level: device.map_get("getWaterLevel", water_level),
            sequencer: ModeSequencer::bind(&device),
            active,
            buzzer,
            led,
            device,
        }
    }

    /// Validates `config`, gets the shared session from `registry` and starts
    /// polling it.
    ///
    /// `connect` is only called when no session exists yet for the device.
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfiguration` if `config` is unusable.
    pub fn from_registry<F>(
        registry: &DeviceRegistry<T>,
        config: &DehumidifierConfig,
        connect: F,
    ) -> Result<Self>
    where
        F: FnOnce(&DeviceIdentity) -> T,
    {
        config.validate()?;
        let device = registry.get_or_create(config.device_config(), connect);
        device.start_polling();
        Ok(Self::new(device, config))
    }

    /// Returns the device session.
    #[must_use]
    pub fn device(&self) -> &Arc<MiioDevice<T>> {
        &self.device
    }

    /// Returns the service display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the accessory information.
    #[must_use]
    pub fn information(&self) -> &AccessoryInformation {
        &self.information
    }

    /// Active (power) characteristic.
    #[must_use]
    pub fn active(&self) -> &SwitchCharacteristic<T> {
        &self.active
    }

    /// Lock physical controls characteristic.
    #[must_use]
    pub fn lock_physical_controls(&self) -> &SwitchCharacteristic<T> {
        &self.lock_physical_controls
    }

    /// Relative humidity threshold getter. `0` means continuous mode.
    #[must_use]
    pub fn relative_humidity_threshold(&self) -> &MappedGetter<T, f64> {
        &self.relative_humidity_threshold
    }

    /// Rotation speed getter.
    #[must_use]
    pub fn rotation_speed(&self) -> &MappedGetter<T, f64> {
        &self.rotation_speed
    }

    /// Current state getter.
    #[must_use]
    pub fn current_state(&self) -> &MappedGetter<T, CurrentState> {
        &self.current_state
    }

    /// Current relative humidity getter.
    #[must_use]
    pub fn current_relative_humidity(&self) -> &MappedGetter<T, f64> {
        &self.current_relative_humidity
    }

    /// Water level getter.
    #[must_use]
    pub fn water_level(&self) -> &MappedGetter<T, f64> {
        &self.water_level
    }

    /// Buzzer switch, if configured.
    #[must_use]
    pub fn buzzer(&self) -> Option<&ExtraSwitch<T>> {
        self.buzzer.as_ref()
    }

    /// LED switch, if configured.
    #[must_use]
    pub fn led(&self) -> Option<&ExtraSwitch<T>> {
        self.led.as_ref()
    }

    /// Target state. Always dehumidifying.
    #[must_use]
    pub fn target_state(&self) -> TargetState {
        TargetState::Dehumidifier
    }

    /// Accepts any target state and ignores it.
    pub fn set_target_state(&self, value: &Value) {
        tracing::trace!(%value, "Ignoring target state change");
    }

    /// Sets the relative humidity threshold.
    ///
    /// `0` switches to continuous mode. Any other number switches to auto
    /// mode, then sets the threshold clamped to 40..=60.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidValue` for a non-numeric value (nothing is
    /// sent), or the first failing step's error.
    pub async fn set_relative_humidity_threshold(&self, value: &Value) -> Result<()> {
        self.sequencer.set_relative_humidity_threshold(value).await
    }

    /// Sets the rotation speed.
    ///
    /// `4` switches to dry-cloth mode. Any other number switches to auto
    /// mode, then sets the fan level clamped to 1..=3.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidValue` for a non-numeric value (nothing is
    /// sent), or the first failing step's error.
    pub async fn set_rotation_speed(&self, value: &Value) -> Result<()> {
        self.sequencer.set_rotation_speed(value).await
    }

    /// Callback form of [`set_relative_humidity_threshold`](Self::set_relative_humidity_threshold).
    ///
    /// Must be called from within a Tokio runtime.
    pub fn set_relative_humidity_threshold_with<F>(&self, value: Value, callback: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let sequencer = self.sequencer.clone();
        tokio::spawn(async move {
            callback(sequencer.set_relative_humidity_threshold(&value).await);
        });
    }

    /// Callback form of [`set_rotation_speed`](Self::set_rotation_speed).
    ///
    /// Must be called from within a Tokio runtime.
    pub fn set_rotation_speed_with<F>(&self, value: Value, callback: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let sequencer = self.sequencer.clone();
        tokio::spawn(async move {
            callback(sequencer.set_rotation_speed(&value).await);
        });
    }
}

impl<T: Transport> std::fmt::Debug for Dehumidifier<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dehumidifier")
            .field("name", &self.name)
            .field("device", &self.device)
            .field("buzzer", &self.buzzer.as_ref().map(|s| &s.name))
            .field("led", &self.led.as_ref().map(|s| &s.name))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceConfig;
    use crate::protocol::{GET_PROP, Invocation, MockTransport};
    use serde_json::json;
    use tracing_test::traced_test;

    const TOKEN: &str = "00112233445566778899aabbccddeeff";

    fn transport(power: &str) -> Arc<MockTransport> {
        Arc::new(
            MockTransport::new()
                .with_property("on_off", power)
                .with_property("compressor_status", "off")
                .with_property("child_lock", "off")
                .with_property("auto", 50)
                .with_property("humidity", 58)
                .with_property("tank_full", "off")
                .with_property("mode", "auto")
                .with_property("fan_st", "1")
                .with_property("buzzer", "on")
                .with_property("led", "off"),
        )
    }

    fn dehumidifier(
        transport: &Arc<MockTransport>,
        config: &DehumidifierConfig,
    ) -> Dehumidifier<Arc<MockTransport>> {
        let device = Arc::new(MiioDevice::new(
            DeviceConfig::new("10.0.0.2", TOKEN),
            Arc::clone(transport),
        ));
        Dehumidifier::new(device, config)
    }

    fn sent(transport: &MockTransport) -> Vec<(String, Vec<Value>)> {
        transport
            .commands()
            .into_iter()
            .map(|Invocation { method, params, .. }| (method, params))
            .collect()
    }

    fn cmd(method: &str, param: Value) -> (String, Vec<Value>) {
        (method.to_string(), vec![param])
    }

    #[tokio::test]
    async fn zero_threshold_only_changes_mode() {
        let transport = transport("on");
        let d = dehumidifier(&transport, &DehumidifierConfig::new("10.0.0.2", TOKEN));

        d.set_relative_humidity_threshold(&json!(0)).await.unwrap();

        assert_eq!(sent(&transport), [cmd("set_mode", json!("on"))]);
        assert_eq!(d.relative_humidity_threshold().get().await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn threshold_switches_to_auto_then_clamps() {
        let transport = transport("on");
        let d = dehumidifier(&transport, &DehumidifierConfig::new("10.0.0.2", TOKEN));

        d.set_relative_humidity_threshold(&json!(80)).await.unwrap();
        d.set_relative_humidity_threshold(&json!(10)).await.unwrap();
        d.set_relative_humidity_threshold(&json!(45)).await.unwrap();

        assert_eq!(
            sent(&transport),
            [
                cmd("set_mode", json!("auto")),
                cmd("set_auto", json!(60)),
                cmd("set_mode", json!("auto")),
                cmd("set_auto", json!(40)),
                cmd("set_mode", json!("auto")),
                cmd("set_auto", json!(45)),
            ]
        );
        assert_eq!(d.relative_humidity_threshold().get().await.unwrap(), 45.0);
    }

    #[tokio::test]
    async fn top_rotation_speed_selects_dry_cloth() {
        let transport = transport("on");
        let d = dehumidifier(&transport, &DehumidifierConfig::new("10.0.0.2", TOKEN));

        d.set_rotation_speed(&json!(4)).await.unwrap();

        assert_eq!(sent(&transport), [cmd("set_mode", json!("dry_cloth"))]);
    }

    #[tokio::test(start_paused = true)]
    async fn rotation_speed_switches_to_auto_then_debounces_fan_level() {
        let transport = transport("on");
        let d = dehumidifier(&transport, &DehumidifierConfig::new("10.0.0.2", TOKEN));

        let d = Arc::new(d);
        let first = tokio::spawn({
            let d = Arc::clone(&d);
            async move { d.set_rotation_speed(&json!(2)).await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        d.set_rotation_speed(&json!(3.4)).await.unwrap();
        first.await.unwrap().unwrap();

        assert_eq!(
            sent(&transport),
            [
                cmd("set_mode", json!("auto")),
                cmd("set_mode", json!("auto")),
                cmd("set_fan_level", json!(3)),
            ]
        );
        assert_eq!(d.rotation_speed().get().await.unwrap(), 3.0);
    }

    #[tokio::test]
    async fn non_numeric_values_are_rejected_without_sending() {
        let transport = transport("on");
        let d = dehumidifier(&transport, &DehumidifierConfig::new("10.0.0.2", TOKEN));

        let err = d
            .set_relative_humidity_threshold(&json!("50"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidValue { ref label, .. } if label == SET_THRESHOLD_LABEL));

        let err = d.set_rotation_speed(&json!(true)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidValue { .. }));

        assert!(transport.invocations().is_empty());
    }

    #[tokio::test]
    async fn failed_mode_change_skips_second_step() {
        let transport = transport("on");
        transport.fail_method("set_mode");
        let d = dehumidifier(&transport, &DehumidifierConfig::new("10.0.0.2", TOKEN));

        let err = d.set_relative_humidity_threshold(&json!(50)).await.unwrap_err();

        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(transport.count("set_auto"), 0);
    }

    #[tokio::test]
    async fn threshold_powers_device_on_once() {
        let transport = transport("off");
        let d = dehumidifier(&transport, &DehumidifierConfig::new("10.0.0.2", TOKEN));

        d.set_relative_humidity_threshold(&json!(55)).await.unwrap();

        assert_eq!(
            sent(&transport),
            [
                cmd("set_power", json!("on")),
                cmd("set_mode", json!("auto")),
                cmd("set_auto", json!(55)),
            ]
        );
        assert!(d.active().get.get().await.unwrap());
    }

    #[tokio::test]
    async fn plain_switches_are_not_gated() {
        let transport = transport("off");
        let d = dehumidifier(&transport, &DehumidifierConfig::new("10.0.0.2", TOKEN));

        d.lock_physical_controls().set.set(true).await.unwrap();

        assert_eq!(sent(&transport), [cmd("set_child_lock", json!("on"))]);
        assert_eq!(transport.count(GET_PROP), 0);
    }

    #[tokio::test]
    async fn extra_switches_follow_configuration() {
        let transport = transport("on");
        let mut config = DehumidifierConfig::new("10.0.0.2", TOKEN);
        config.buzzer_switch = Some("Beeper".into());

        let d = dehumidifier(&transport, &config);

        assert!(d.led().is_none());
        let buzzer = d.buzzer().unwrap();
        assert_eq!(buzzer.name, "Beeper");
        assert!(buzzer.on.get.get().await.unwrap());

        buzzer.on.set.set(false).await.unwrap();
        assert_eq!(sent(&transport), [cmd("set_buzzer", json!("off"))]);
        assert!(!buzzer.on.get.get().await.unwrap());
    }

    #[tokio::test]
    async fn getters_read_snapshot() {
        let transport = transport("on");
        let d = dehumidifier(&transport, &DehumidifierConfig::new("10.0.0.2", TOKEN));

        assert_eq!(d.current_state().get().await.unwrap(), CurrentState::Idle);
        assert_eq!(d.current_relative_humidity().get().await.unwrap(), 58.0);
        assert_eq!(d.water_level().get().await.unwrap(), 0.0);
        assert_eq!(d.rotation_speed().get().await.unwrap(), 1.0);
        assert_eq!(d.target_state(), TargetState::Dehumidifier);
        assert_eq!(transport.count(GET_PROP), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn target_state_changes_are_ignored() {
        let transport = transport("on");
        let d = dehumidifier(&transport, &DehumidifierConfig::new("10.0.0.2", TOKEN));

        d.set_target_state(&json!(1));

        assert_eq!(d.target_state(), TargetState::Dehumidifier);
        assert_eq!(d.target_state().as_u8(), 2);
        assert!(transport.invocations().is_empty());
        assert!(logs_contain("Ignoring target state change"));
    }

    #[tokio::test]
    async fn callback_setter_reports_result() {
        let transport = transport("on");
        let d = dehumidifier(&transport, &DehumidifierConfig::new("10.0.0.2", TOKEN));

        let (tx, rx) = tokio::sync::oneshot::channel();
        d.set_rotation_speed_with(json!("fast"), move |result| {
            let _ = tx.send(result);
        });

        assert!(matches!(rx.await.unwrap(), Err(Error::InvalidValue { .. })));
    }
}
