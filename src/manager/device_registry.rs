// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lookup-or-create registry of device sessions.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::device::{DeviceConfig, DeviceIdentity, MiioDevice};
use crate::protocol::Transport;

/// Registry of device sessions keyed by [`DeviceIdentity`].
///
/// The registry holds weak references: a session lives as long as some
/// accessory holds it, and the next lookup after the last holder is gone
/// creates a fresh one.
///
/// Lookup and insertion happen under one lock, so concurrent callers asking
/// for the same identity always end up with the same session.
pub struct DeviceRegistry<T: Transport> {
    sessions: Mutex<HashMap<DeviceIdentity, Weak<MiioDevice<T>>>>,
}

impl<T: Transport> DeviceRegistry<T> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the session for `config`'s identity, creating it if needed.
    ///
    /// `connect` builds the transport and is only called when a new session is
    /// created. When an existing session is reused, the rest of `config`
    /// (polling interval, tracked keys) is ignored.
    pub fn get_or_create<F>(&self, config: DeviceConfig, connect: F) -> Arc<MiioDevice<T>>
    where
        F: FnOnce(&DeviceIdentity) -> T,
    {
        let mut sessions = self.sessions.lock();
        let identity = config.identity().clone();

        if let Some(device) = sessions.get(&identity).and_then(Weak::upgrade) {
            tracing::info!(address = %identity, "Reusing device session");
            return device;
        }

        let transport = connect(&identity);
        let device = Arc::new(MiioDevice::new(config, transport));
        sessions.retain(|_, weak| weak.strong_count() > 0);
        sessions.insert(identity, Arc::downgrade(&device));
        tracing::info!(address = %device.identity(), "Created device session");
        device
    }

    /// Returns the live session for `identity`, if any.
    #[must_use]
    pub fn get(&self, identity: &DeviceIdentity) -> Option<Arc<MiioDevice<T>>> {
        self.sessions.lock().get(identity).and_then(Weak::upgrade)
    }

    /// Returns the number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Returns `true` if no session is alive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops entries whose session has been released.
    pub fn cleanup(&self) {
        self.sessions.lock().retain(|_, weak| weak.strong_count() > 0);
    }
}

impl<T: Transport> Default for DeviceRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> std::fmt::Debug for DeviceRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("sessions", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MockTransport;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_test::traced_test;

    const TOKEN: &str = "00112233445566778899aabbccddeeff";

    #[test]
    #[traced_test]
    fn same_identity_shares_one_session() {
        let registry = DeviceRegistry::new();
        let connects = AtomicUsize::new(0);
        let connect = |_: &DeviceIdentity| {
            connects.fetch_add(1, Ordering::SeqCst);
            MockTransport::new()
        };

        let a = registry.get_or_create(DeviceConfig::new("10.0.0.2", TOKEN), connect);
        let b = registry.get_or_create(DeviceConfig::new("10.0.0.2", TOKEN), connect);

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
        assert!(logs_contain("Reusing device session"));
    }

    #[test]
    fn different_token_gets_separate_session() {
        let registry = DeviceRegistry::new();

        let a = registry.get_or_create(DeviceConfig::new("10.0.0.2", TOKEN), |_| {
            MockTransport::new()
        });
        let b = registry.get_or_create(
            DeviceConfig::new("10.0.0.2", "ffeeddccbbaa99887766554433221100"),
            |_| MockTransport::new(),
        );

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn released_session_is_recreated() {
        let registry = DeviceRegistry::new();
        let identity = DeviceIdentity::new("10.0.0.2", TOKEN);

        let first = registry.get_or_create(DeviceConfig::new("10.0.0.2", TOKEN), |_| {
            MockTransport::new()
        });
        assert!(registry.get(&identity).is_some());
        drop(first);

        assert!(registry.get(&identity).is_none());
        assert!(registry.is_empty());

        let second = registry.get_or_create(DeviceConfig::new("10.0.0.2", TOKEN), |_| {
            MockTransport::new()
        });
        assert!(Arc::ptr_eq(&registry.get(&identity).unwrap(), &second));
    }

    #[test]
    fn cleanup_removes_dead_entries() {
        let registry = DeviceRegistry::new();
        drop(registry.get_or_create(DeviceConfig::new("10.0.0.2", TOKEN), |_| {
            MockTransport::new()
        }));

        registry.cleanup();

        assert!(registry.sessions.lock().is_empty());
    }
}
