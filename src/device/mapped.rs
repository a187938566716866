// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mapped getters and setters handed to accessory characteristics.
//!
//! Each accessor is created once at setup and invoked many times. Both can be
//! awaited directly ([`MappedGetter::get`], [`MappedSetter::set`]) or driven
//! callback-style ([`MappedGetter::get_with`], [`MappedSetter::set_with`]),
//! which is the shape characteristic handlers of accessory frameworks expect.

use std::sync::Arc;

use serde_json::Value;

use super::dispatcher::{Command, CommandDispatcher, SetOptions};
use super::state_cache::StateCache;
use crate::error::{Error, ParseError, Result};
use crate::protocol::Transport;
use crate::state::Snapshot;

type GetTransform<V> = Arc<dyn Fn(&Snapshot) -> Option<V> + Send + Sync>;
type SetTransform<I> = Arc<dyn Fn(I) -> Value + Send + Sync>;

/// A getter reading one characteristic value from the cached snapshot.
pub struct MappedGetter<T: Transport, V> {
    label: Arc<str>,
    cache: Arc<StateCache<T>>,
    transform: GetTransform<V>,
}

impl<T: Transport, V: Send + 'static> MappedGetter<T, V> {
    pub(crate) fn new(
        label: &str,
        cache: Arc<StateCache<T>>,
        transform: impl Fn(&Snapshot) -> Option<V> + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            cache,
            transform: Arc::new(transform),
        }
    }

    /// Returns the diagnostic label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Reads the value.
    ///
    /// Only the very first read on a session can reach the network (it polls
    /// if nothing has been polled yet); every later read is served from the
    /// cache, however old.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotYetAvailable` if no poll has succeeded yet, and
    /// `Error::Parse` if the cached field cannot be converted.
    pub async fn get(&self) -> Result<V> {
        let snapshot = self.cache.ensure_loaded().await;
        if snapshot.is_empty() {
            return Err(Error::NotYetAvailable {
                label: self.label.to_string(),
            });
        }

        let value = (self.transform)(&*snapshot).ok_or_else(|| {
            ParseError::UnexpectedFormat(format!("{}: cached value is unreadable", self.label))
        })?;
        tracing::trace!(label = %self.label, "Characteristic read");
        Ok(value)
    }

    /// Reads the value in the background and reports it to `callback`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn get_with<F>(&self, callback: F)
    where
        F: FnOnce(Result<V>) + Send + 'static,
    {
        let getter = self.clone();
        tokio::spawn(async move {
            callback(getter.get().await);
        });
    }
}

impl<T: Transport, V> Clone for MappedGetter<T, V> {
    fn clone(&self) -> Self {
        Self {
            label: Arc::clone(&self.label),
            cache: Arc::clone(&self.cache),
            transform: Arc::clone(&self.transform),
        }
    }
}

impl<T: Transport, V> std::fmt::Debug for MappedGetter<T, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedGetter")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// A setter translating one characteristic value into a device command.
pub struct MappedSetter<T: Transport, I> {
    label: Arc<str>,
    method: Arc<str>,
    transform: SetTransform<I>,
    options: Arc<SetOptions>,
    dispatcher: Arc<CommandDispatcher<T>>,
}

impl<T: Transport, I: Send + 'static> MappedSetter<T, I> {
    pub(crate) fn new(
        label: &str,
        method: &str,
        transform: impl Fn(I) -> Value + Send + Sync + 'static,
        options: SetOptions,
        dispatcher: Arc<CommandDispatcher<T>>,
    ) -> Self {
        Self {
            label: label.into(),
            method: method.into(),
            transform: Arc::new(transform),
            options: Arc::new(options),
            dispatcher,
        }
    }

    /// Returns the diagnostic label, which is also the debounce bucket.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the device method this setter invokes.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the dispatch options.
    #[must_use]
    pub fn options(&self) -> &SetOptions {
        &self.options
    }

    /// Transforms `value` and dispatches the command.
    ///
    /// # Errors
    ///
    /// Returns the dispatch error: transport failure or failed power-on.
    pub async fn set(&self, value: I) -> Result<()> {
        let param = (self.transform)(value);
        self.dispatcher
            .dispatch(&self.label, &self.method, vec![param], &self.options)
            .await
    }

    /// Sets the value in the background and reports the outcome to `callback`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn set_with<F>(&self, value: I, callback: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let setter = self.clone();
        tokio::spawn(async move {
            callback(setter.set(value).await);
        });
    }

    /// Builds the command this setter would send for `value`, bypassing
    /// debounce and precondition checks.
    pub(crate) fn command_for(&self, value: I) -> Command {
        Command::new(
            &self.label,
            &self.method,
            vec![(self.transform)(value)],
            &self.options,
        )
    }
}

impl<T: Transport, I> Clone for MappedSetter<T, I> {
    fn clone(&self) -> Self {
        Self {
            label: Arc::clone(&self.label),
            method: Arc::clone(&self.method),
            transform: Arc::clone(&self.transform),
            options: Arc::clone(&self.options),
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}

impl<T: Transport, I> std::fmt::Debug for MappedSetter<T, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedSetter")
            .field("label", &self.label)
            .field("method", &self.method)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
