// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state snapshot.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;

use crate::error::ParseError;
use crate::types::{Mode, SwitchStatus};

/// The raw values of every tracked property, as reported by one poll.
///
/// A snapshot is either empty (nothing has been polled yet) or holds a value
/// for every tracked key. It is never edited in place: optimistic updates
/// build a new snapshot with [`Snapshot::with_value`].
///
/// # Examples
///
/// ```
/// use miio_dehumidifier::state::Snapshot;
/// use miio_dehumidifier::types::SwitchStatus;
/// use serde_json::json;
///
/// let keys = vec!["on_off".to_string(), "humidity".to_string()];
/// let snapshot = Snapshot::from_poll(&keys, json!(["on", 48])).unwrap();
///
/// assert_eq!(snapshot.switch("on_off"), Some(SwitchStatus::On));
/// assert_eq!(snapshot.number("humidity"), Some(48.0));
/// assert!(Snapshot::empty().is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    values: HashMap<String, String>,
    polled_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// Returns the snapshot that exists before the first successful poll.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a snapshot from a `get_prop` result.
    ///
    /// The result must be an array with exactly one value per key, in key
    /// order. Strings are kept verbatim; numbers and booleans are stored in
    /// their JSON text form.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the result is not an array, has the wrong
    /// length, or contains a null, array or object value.
    pub fn from_poll(keys: &[String], result: Value) -> Result<Self, ParseError> {
        let Value::Array(raw) = result else {
            return Err(ParseError::UnexpectedFormat(format!(
                "get_prop result is not an array: {result}"
            )));
        };
        if raw.len() != keys.len() {
            return Err(ParseError::PropertyCount {
                expected: keys.len(),
                actual: raw.len(),
            });
        }

        let values = keys
            .iter()
            .zip(raw)
            .map(|(key, value)| Ok((key.clone(), raw_text(key, value)?)))
            .collect::<Result<HashMap<_, _>, ParseError>>()?;

        Ok(Self {
            values,
            polled_at: Some(Utc::now()),
        })
    }

    /// Returns a copy with `key` set to `value`.
    ///
    /// Returns `None` when this snapshot does not track `key` (including when
    /// it is empty), so an update can never turn a complete snapshot into a
    /// partial one.
    #[must_use]
    pub fn with_value(&self, key: &str, value: &Value) -> Option<Self> {
        if !self.values.contains_key(key) {
            return None;
        }
        let text = raw_text(key, value.clone()).ok()?;
        let mut next = self.clone();
        next.values.insert(key.to_string(), text);
        Some(next)
    }

    /// Returns `true` when no poll has completed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the number of properties held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when every key in `keys` has a value.
    #[must_use]
    pub fn contains_all(&self, keys: &[String]) -> bool {
        keys.iter().all(|key| self.values.contains_key(key))
    }

    /// Returns the raw value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns `key` parsed as an on/off field.
    #[must_use]
    pub fn switch(&self, key: &str) -> Option<SwitchStatus> {
        self.parse(key)
    }

    /// Returns `key` parsed as an operating mode.
    #[must_use]
    pub fn mode(&self, key: &str) -> Option<Mode> {
        self.parse(key)
    }

    /// Returns `key` parsed as a number.
    #[must_use]
    pub fn number(&self, key: &str) -> Option<f64> {
        self.parse(key)
    }

    /// Returns when the underlying poll completed.
    #[must_use]
    pub fn polled_at(&self) -> Option<DateTime<Utc>> {
        self.polled_at
    }

    /// Returns how long ago the underlying poll completed.
    #[must_use]
    pub fn age(&self) -> Option<TimeDelta> {
        self.polled_at.map(|at| Utc::now() - at)
    }

    fn parse<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|raw| raw.trim().parse().ok())
    }
}

fn raw_text(key: &str, value: Value) -> Result<String, ParseError> {
    match value {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        other => Err(ParseError::UnexpectedFormat(format!(
            "unsupported value for {key}: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys() -> Vec<String> {
        ["on_off", "mode", "auto"]
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn from_poll_keeps_every_key() {
        let snapshot = Snapshot::from_poll(&keys(), json!(["off", "auto", "50"])).unwrap();

        assert!(snapshot.contains_all(&keys()));
        assert_eq!(snapshot.mode("mode"), Some(Mode::Auto));
        assert_eq!(snapshot.number("auto"), Some(50.0));
        assert!(snapshot.polled_at().is_some());
    }

    #[test]
    fn from_poll_rejects_short_result() {
        let err = Snapshot::from_poll(&keys(), json!(["off", "auto"])).unwrap_err();
        assert!(matches!(
            err,
            ParseError::PropertyCount {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn from_poll_rejects_non_array() {
        assert!(Snapshot::from_poll(&keys(), json!({"on_off": "on"})).is_err());
    }

    #[test]
    fn from_poll_rejects_null_values() {
        assert!(Snapshot::from_poll(&keys(), json!(["on", null, "40"])).is_err());
    }

    #[test]
    fn with_value_replaces_one_field() {
        let snapshot = Snapshot::from_poll(&keys(), json!(["off", "auto", "50"])).unwrap();

        let updated = snapshot.with_value("on_off", &json!("on")).unwrap();

        assert_eq!(updated.switch("on_off"), Some(SwitchStatus::On));
        assert_eq!(updated.get("mode"), Some("auto"));
        assert_eq!(snapshot.switch("on_off"), Some(SwitchStatus::Off));
    }

    #[test]
    fn with_value_refuses_untracked_key_or_empty_snapshot() {
        let snapshot = Snapshot::from_poll(&keys(), json!(["off", "auto", "50"])).unwrap();
        assert!(snapshot.with_value("led", &json!("on")).is_none());
        assert!(Snapshot::empty().with_value("on_off", &json!("on")).is_none());
    }

    #[test]
    fn unparseable_field_reads_as_none() {
        let snapshot = Snapshot::from_poll(&keys(), json!(["maybe", "turbo", "high"])).unwrap();
        assert_eq!(snapshot.switch("on_off"), None);
        assert_eq!(snapshot.mode("mode"), None);
        assert_eq!(snapshot.number("auto"), None);
    }
}
