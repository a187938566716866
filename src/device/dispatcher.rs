// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command dispatch: debouncing, the ensure-active precondition and
//! post-write cache updates.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use super::state_cache::StateCache;
use crate::error::{Error, Result};
use crate::protocol::Transport;
use crate::state::Snapshot;

/// Per-setter dispatch options.
///
/// # Examples
///
/// ```
/// use miio_dehumidifier::device::SetOptions;
/// use std::time::Duration;
///
/// let options = SetOptions::new()
///     .with_debounce(Duration::from_millis(400))
///     .with_update("fan_st");
///
/// assert_eq!(options.debounce(), Some(Duration::from_millis(400)));
/// assert!(!options.ensure_active());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOptions {
    debounce: Option<Duration>,
    ensure_active: bool,
    update: Option<String>,
    refresh_after: bool,
}

impl SetOptions {
    /// Creates options for an immediate, ungated command.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays the command by `delay`; a newer call to the same setter within
    /// the delay replaces this one.
    #[must_use]
    pub fn with_debounce(mut self, delay: Duration) -> Self {
        self.debounce = Some(delay);
        self
    }

    /// Powers the device on before sending, if it is off.
    #[must_use]
    pub fn with_ensure_active(mut self) -> Self {
        self.ensure_active = true;
        self
    }

    /// Writes the sent value into `key` of the cached snapshot on success.
    #[must_use]
    pub fn with_update(mut self, key: impl Into<String>) -> Self {
        self.update = Some(key.into());
        self
    }

    /// Starts an out-of-band poll after a successful send.
    #[must_use]
    pub fn with_refresh_after(mut self) -> Self {
        self.refresh_after = true;
        self
    }

    /// Returns the debounce delay.
    #[must_use]
    pub fn debounce(&self) -> Option<Duration> {
        self.debounce
    }

    /// Returns whether the command is gated on the device being on.
    #[must_use]
    pub fn ensure_active(&self) -> bool {
        self.ensure_active
    }

    /// Returns the snapshot key updated on success.
    #[must_use]
    pub fn update(&self) -> Option<&str> {
        self.update.as_deref()
    }

    /// Returns whether a poll follows a successful send.
    #[must_use]
    pub fn refresh_after(&self) -> bool {
        self.refresh_after
    }
}

/// A fully transformed command, ready for the transport.
#[derive(Debug, Clone)]
pub(crate) struct Command {
    pub label: String,
    pub method: String,
    pub params: Vec<Value>,
    pub update: Option<String>,
    pub refresh_after: bool,
}

impl Command {
    pub(crate) fn new(label: &str, method: &str, params: Vec<Value>, options: &SetOptions) -> Self {
        Self {
            label: label.to_string(),
            method: method.to_string(),
            params,
            update: options.update.clone(),
            refresh_after: options.refresh_after,
        }
    }
}

/// Predicate deciding from a snapshot whether the device is on.
pub type IsOn = Arc<dyn Fn(&Snapshot) -> bool + Send + Sync>;

struct PowerHooks {
    is_on: IsOn,
    power_on: Command,
}

struct PendingCommand {
    generation: u64,
    handle: AbortHandle,
    waiter: oneshot::Sender<Result<()>>,
}

/// Turns setter calls into transport invocations.
///
/// Commands for different setters run independently. For one setter label,
/// debounced calls are coalesced: each call cancels the one still waiting
/// and only the last value of a burst reaches the device.
pub struct CommandDispatcher<T: Transport> {
    transport: Arc<T>,
    cache: Arc<StateCache<T>>,
    pending: Mutex<HashMap<String, PendingCommand>>,
    next_generation: AtomicU64,
    power_hooks: RwLock<Option<Arc<PowerHooks>>>,
    power_gate: tokio::sync::Mutex<()>,
}

impl<T: Transport> CommandDispatcher<T> {
    /// Creates a dispatcher sending through `transport` and updating `cache`.
    pub fn new(transport: Arc<T>, cache: Arc<StateCache<T>>) -> Self {
        Self {
            transport,
            cache,
            pending: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
            power_hooks: RwLock::new(None),
            power_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Registers how to tell whether the device is on and how to turn it on.
    ///
    /// Replaces any previous registration.
    pub(crate) fn register_power_hooks(&self, is_on: IsOn, power_on: Command) {
        tracing::debug!(label = %power_on.label, "Power hooks registered");
        *self.power_hooks.write() = Some(Arc::new(PowerHooks { is_on, power_on }));
    }

    /// Evaluates the registered power predicate against `snapshot`.
    ///
    /// Returns `None` when no hooks are registered.
    pub fn is_on(&self, snapshot: &Snapshot) -> Option<bool> {
        self.power_hooks
            .read()
            .as_ref()
            .map(|hooks| (hooks.is_on)(snapshot))
    }

    /// Returns the number of debounced commands still waiting.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Sends `method(params)` on behalf of the setter `label`.
    ///
    /// Resolves once the command has been sent and acknowledged, or once a
    /// newer call to the same debounced setter replaced it.
    ///
    /// # Errors
    ///
    /// Returns `Error::PowerOnFailed` if the ensure-active power-on fails (the
    /// command is then not sent), and `Error::Transport` if the command fails.
    pub async fn dispatch(
        self: &Arc<Self>,
        label: &str,
        method: &str,
        params: Vec<Value>,
        options: &SetOptions,
    ) -> Result<()> {
        let command = Command::new(label, method, params, options);
        match options.debounce {
            Some(delay) => self.debounce(command, delay, options.ensure_active).await,
            None => self.send(&command, options.ensure_active).await,
        }
    }

    async fn debounce(
        self: &Arc<Self>,
        command: Command,
        delay: Duration,
        ensure_active: bool,
    ) -> Result<()> {
        let label = command.label.clone();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (waiter, outcome) = oneshot::channel();

        {
            // The task cannot claim its entry before it is inserted: claiming
            // takes this same lock.
            let mut pending = self.pending.lock();
            let dispatcher = Arc::clone(self);
            let task = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let Some(entry) = dispatcher.claim(&command.label, generation) else {
                    return;
                };
                let result = dispatcher.send(&command, ensure_active).await;
                let _ = entry.waiter.send(result);
            });

            let entry = PendingCommand {
                generation,
                handle: task.abort_handle(),
                waiter,
            };
            if let Some(previous) = pending.insert(label.clone(), entry) {
                previous.handle.abort();
                let _ = previous.waiter.send(Ok(()));
                tracing::trace!(%label, "Debounced command superseded");
            }
        }

        outcome.await.map_err(|_| Error::TaskFailed(label))?
    }

    /// Removes and returns the pending entry if it still belongs to `generation`.
    fn claim(&self, label: &str, generation: u64) -> Option<PendingCommand> {
        let mut pending = self.pending.lock();
        if pending
            .get(label)
            .is_some_and(|entry| entry.generation == generation)
        {
            pending.remove(label)
        } else {
            None
        }
    }

    async fn send(&self, command: &Command, ensure_active: bool) -> Result<()> {
        if ensure_active {
            self.ensure_active(&command.label).await?;
        }
        self.invoke(command).await
    }

    async fn ensure_active(&self, label: &str) -> Result<()> {
        let Some(hooks) = self.power_hooks.read().clone() else {
            return Ok(());
        };
        if (hooks.is_on)(&*self.cache.ensure_loaded().await) {
            return Ok(());
        }

        // Concurrent gated commands re-check after the first power-on landed.
        let _gate = self.power_gate.lock().await;
        if (hooks.is_on)(&*self.cache.latest()) {
            return Ok(());
        }

        tracing::debug!(%label, "Device is off, powering on first");
        self.invoke(&hooks.power_on)
            .await
            .map_err(|e| Error::PowerOnFailed {
                label: label.to_string(),
                source: Box::new(e),
            })
    }

    async fn invoke(&self, command: &Command) -> Result<()> {
        tracing::debug!(
            label = %command.label,
            method = %command.method,
            params = ?command.params,
            "Sending command"
        );

        if let Err(e) = self
            .transport
            .invoke(&command.method, command.params.clone())
            .await
        {
            tracing::debug!(label = %command.label, error = %e, "Command failed");
            return Err(e.into());
        }

        if let (Some(key), Some(value)) = (&command.update, command.params.first()) {
            self.cache.apply(key, value);
        }
        if command.refresh_after {
            let cache = Arc::clone(&self.cache);
            tokio::spawn(async move {
                cache.refresh().await;
            });
        }
        Ok(())
    }
}

impl<T: Transport> std::fmt::Debug for CommandDispatcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}
