// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polled device state cache.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::Result;
use crate::protocol::{GET_PROP, Transport};
use crate::state::Snapshot;

/// Periodically refreshed snapshot of a device's tracked properties.
///
/// Readers never touch the network: [`latest`](Self::latest) returns the
/// snapshot currently held. A single poll reads every tracked key in one
/// `get_prop` call and, on success, replaces the snapshot as a whole. A failed
/// poll is logged and leaves the previous snapshot in place.
///
/// At most one poll runs at a time. Timer ticks and [`refresh`](Self::refresh)
/// calls that arrive while a poll is in flight are skipped, not queued.
///
/// Optimistic writes made through [`apply`](Self::apply) while a poll is in
/// flight are laid over that poll's result, since the device answered before
/// it saw them.
pub struct StateCache<T: Transport> {
    transport: Arc<T>,
    address: String,
    keys: Vec<String>,
    snapshot: watch::Sender<Arc<Snapshot>>,
    poll_gate: tokio::sync::Mutex<()>,
    poll_attempts: AtomicU64,
    recent_writes: Mutex<Vec<(String, Value)>>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Transport> StateCache<T> {
    /// Creates an empty cache polling `keys` through `transport`.
    pub fn new(transport: Arc<T>, address: impl Into<String>, keys: Vec<String>) -> Self {
        Self {
            transport,
            address: address.into(),
            keys,
            snapshot: watch::Sender::new(Arc::new(Snapshot::empty())),
            poll_gate: tokio::sync::Mutex::new(()),
            poll_attempts: AtomicU64::new(0),
            recent_writes: Mutex::new(Vec::new()),
            poller: Mutex::new(None),
        }
    }

    /// Returns the tracked keys, in request order.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Returns the current snapshot. Empty until the first successful poll.
    #[must_use]
    pub fn latest(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.borrow())
    }

    /// Returns a receiver notified whenever the snapshot is replaced.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshot.subscribe()
    }

    /// Starts the recurring poll.
    ///
    /// Returns `false` without doing anything if polling is already running.
    /// The poll task only holds a weak reference and stops once the cache is
    /// dropped.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_polling(self: &Arc<Self>, interval: Duration) -> bool {
        let mut poller = self.poller.lock();
        if poller.as_ref().is_some_and(|task| !task.is_finished()) {
            return false;
        }

        let cache = Arc::downgrade(self);
        let address = self.address.clone();
        *poller = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                cache.refresh().await;
            }
            tracing::debug!(%address, "Poll loop stopped");
        }));

        tracing::debug!(address = %self.address, ?interval, "Polling started");
        true
    }

    /// Stops the recurring poll. A poll already in flight still completes.
    pub fn stop_polling(&self) {
        if let Some(task) = self.poller.lock().take() {
            task.abort();
        }
    }

    /// Returns `true` while the recurring poll is running.
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Polls now, outside the regular cadence.
    ///
    /// Returns `true` if a new snapshot was stored. Returns `false` if another
    /// poll was already in flight or if this poll failed; failures are logged.
    pub async fn refresh(&self) -> bool {
        let Ok(_gate) = self.poll_gate.try_lock() else {
            tracing::trace!(address = %self.address, "Poll already in flight, skipping");
            return false;
        };
        self.poll().await
    }

    /// Returns the current snapshot, polling first if none has completed yet.
    ///
    /// Callers that find a poll in flight wait for it and take its outcome
    /// instead of polling again, so the result is still empty if that poll
    /// failed.
    pub async fn ensure_loaded(&self) -> Arc<Snapshot> {
        let current = self.latest();
        if !current.is_empty() {
            return current;
        }

        let attempts = self.poll_attempts.load(Ordering::Acquire);
        let _gate = self.poll_gate.lock().await;
        if self.poll_attempts.load(Ordering::Acquire) == attempts && self.latest().is_empty() {
            self.poll().await;
        }
        self.latest()
    }

    /// Optimistically sets one field after a successful command.
    ///
    /// Ignored (returns `false`) while the snapshot is empty or when `key` is
    /// not tracked.
    pub fn apply(&self, key: &str, value: &Value) -> bool {
        let mut recent = self.recent_writes.lock();
        let applied = self.snapshot.send_if_modified(|current| {
            match current.with_value(key, value) {
                Some(next) => {
                    *current = Arc::new(next);
                    true
                }
                None => false,
            }
        });
        if applied {
            recent.push((key.to_string(), value.clone()));
        }
        applied
    }

    /// Performs one poll. Callers hold `poll_gate`.
    async fn poll(&self) -> bool {
        self.recent_writes.lock().clear();
        let fetched = self.fetch().await;
        self.poll_attempts.fetch_add(1, Ordering::AcqRel);

        match fetched {
            Ok(snapshot) => {
                let recent = self.recent_writes.lock();
                let snapshot = recent.iter().fold(snapshot, |snapshot, (key, value)| {
                    snapshot.with_value(key, value).unwrap_or(snapshot)
                });
                self.snapshot.send_replace(Arc::new(snapshot));
                drop(recent);
                tracing::debug!(address = %self.address, "Device state refreshed");
                true
            }
            Err(e) => {
                tracing::warn!(
                    address = %self.address,
                    error = %e,
                    "Poll failed, keeping previous state"
                );
                false
            }
        }
    }

    async fn fetch(&self) -> Result<Snapshot> {
        let params = self.keys.iter().map(|k| Value::from(k.as_str())).collect();
        let result = self.transport.invoke(GET_PROP, params).await?;
        Ok(Snapshot::from_poll(&self.keys, result)?)
    }
}

impl<T: Transport> Drop for StateCache<T> {
    fn drop(&mut self) {
        if let Some(task) = self.poller.get_mut().take() {
            task.abort();
        }
    }
}

impl<T: Transport> std::fmt::Debug for StateCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCache")
            .field("address", &self.address)
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MockTransport;
    use tracing_test::traced_test;

    fn keys() -> Vec<String> {
        vec!["on_off".to_string(), "humidity".to_string()]
    }

    fn device() -> Arc<MockTransport> {
        Arc::new(
            MockTransport::new()
                .with_property("on_off", "on")
                .with_property("humidity", 52),
        )
    }

    #[tokio::test]
    async fn latest_is_empty_before_first_poll() {
        let cache = StateCache::new(device(), "10.0.0.2", keys());
        assert!(cache.latest().is_empty());
    }

    #[tokio::test]
    async fn refresh_stores_complete_snapshot() {
        let cache = StateCache::new(device(), "10.0.0.2", keys());

        assert!(cache.refresh().await);

        let snapshot = cache.latest();
        assert!(snapshot.contains_all(&keys()));
        assert_eq!(snapshot.get("on_off"), Some("on"));
        assert_eq!(snapshot.get("humidity"), Some("52"));
    }

    #[tokio::test]
    #[traced_test]
    async fn failed_poll_keeps_previous_snapshot() {
        let transport = device();
        let cache = StateCache::new(Arc::clone(&transport), "10.0.0.2", keys());
        assert!(cache.refresh().await);
        let before = cache.latest();

        transport.set_property("humidity", 70);
        transport.fail_method(GET_PROP);
        assert!(!cache.refresh().await);

        assert_eq!(*cache.latest(), *before);
        assert!(logs_contain("Poll failed, keeping previous state"));
    }

    #[tokio::test]
    async fn short_poll_result_is_discarded() {
        let transport = device();
        let cache = StateCache::new(Arc::clone(&transport), "10.0.0.2", keys());
        assert!(cache.refresh().await);

        transport.remove_property("humidity");
        assert!(!cache.refresh().await);

        assert_eq!(cache.latest().get("humidity"), Some("52"));
    }

    #[tokio::test]
    async fn ensure_loaded_polls_only_once() {
        let transport = device();
        let cache = StateCache::new(Arc::clone(&transport), "10.0.0.2", keys());

        assert!(!cache.ensure_loaded().await.is_empty());
        assert!(!cache.ensure_loaded().await.is_empty());

        assert_eq!(transport.count(GET_PROP), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_refresh_is_skipped() {
        let transport = Arc::new(
            MockTransport::new()
                .with_property("on_off", "on")
                .with_property("humidity", 52)
                .with_latency(Duration::from_millis(200)),
        );
        let cache = Arc::new(StateCache::new(Arc::clone(&transport), "10.0.0.2", keys()));

        let first = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.refresh().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(!cache.refresh().await);
        assert!(first.await.unwrap());
        assert_eq!(transport.count(GET_PROP), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn start_polling_is_idempotent() {
        let transport = device();
        let cache = Arc::new(StateCache::new(Arc::clone(&transport), "10.0.0.2", keys()));

        assert!(cache.start_polling(Duration::from_secs(5)));
        assert!(!cache.start_polling(Duration::from_secs(5)));
        assert!(cache.is_polling());

        // First tick fires immediately, then one every 5 s.
        tokio::time::sleep(Duration::from_millis(12_500)).await;
        assert_eq!(transport.count(GET_PROP), 3);

        cache.stop_polling();
        assert!(!cache.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_first_reads_share_one_failed_poll() {
        let transport = Arc::new(
            MockTransport::new()
                .with_property("on_off", "on")
                .with_property("humidity", 52)
                .with_latency(Duration::from_secs(5)),
        );
        transport.fail_method(GET_PROP);
        let cache = Arc::new(StateCache::new(Arc::clone(&transport), "10.0.0.2", keys()));

        let started = tokio::time::Instant::now();
        let readers: Vec<_> = (0..10)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.ensure_loaded().await })
            })
            .collect();
        for reader in readers {
            assert!(reader.await.unwrap().is_empty());
        }

        assert_eq!(transport.count(GET_PROP), 1);
        assert!(started.elapsed() < Duration::from_secs(6));
    }

    #[tokio::test]
    async fn ensure_loaded_retries_after_earlier_failure() {
        let transport = device();
        transport.fail_method(GET_PROP);
        let cache = StateCache::new(Arc::clone(&transport), "10.0.0.2", keys());
        assert!(cache.ensure_loaded().await.is_empty());

        transport.restore_method(GET_PROP);
        assert!(!cache.ensure_loaded().await.is_empty());
        assert_eq!(transport.count(GET_PROP), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn write_during_poll_survives_older_result() {
        let transport = Arc::new(
            MockTransport::new()
                .with_property("on_off", "off")
                .with_property("humidity", 52),
        );
        let cache = Arc::new(StateCache::new(Arc::clone(&transport), "10.0.0.2", keys()));
        assert!(cache.refresh().await);

        transport.set_latency(Duration::from_millis(200));
        transport.set_property("humidity", 64);
        let poll = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.refresh().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(cache.apply("on_off", &Value::from("on")));

        assert!(poll.await.unwrap());
        assert_eq!(cache.latest().get("on_off"), Some("on"));
        assert_eq!(cache.latest().get("humidity"), Some("64"));

        // The next poll was sent after the write and is authoritative again.
        assert!(cache.refresh().await);
        assert_eq!(cache.latest().get("on_off"), Some("off"));
    }

    #[tokio::test]
    async fn apply_updates_single_field_of_complete_snapshot() {
        let cache = StateCache::new(device(), "10.0.0.2", keys());
        assert!(!cache.apply("on_off", &Value::from("off")));

        cache.refresh().await;
        let mut changes = cache.watch();
        assert!(cache.apply("on_off", &Value::from("off")));

        assert!(changes.has_changed().unwrap());
        assert_eq!(cache.latest().get("on_off"), Some("off"));
        assert_eq!(cache.latest().get("humidity"), Some("52"));
    }
}
