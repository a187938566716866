// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-process device for tests and demos.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Value, json};

use super::rpc::{RequestIds, RpcRequest, RpcResponse};
use super::{GET_PROP, Transport};
use crate::error::TransportError;

/// One recorded call to [`MockTransport::invoke`].
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Method name.
    pub method: String,
    /// Positional parameters.
    pub params: Vec<Value>,
}

/// A scripted miIO device.
///
/// `get_prop` answers from a property table, every other method answers
/// `["ok"]`. Methods can be made to fail, calls can be slowed down, and every
/// call is recorded in order. Requests and answers pass through the JSON
/// envelope exactly as a network transport would decode them.
///
/// # Examples
///
/// ```
/// use miio_dehumidifier::protocol::{MockTransport, Transport};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let device = MockTransport::new().with_property("on_off", "on");
/// let values = device.invoke("get_prop", vec![json!("on_off")]).await.unwrap();
/// assert_eq!(values, json!(["on"]));
/// assert_eq!(device.invocations().len(), 1);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MockTransport {
    ids: RequestIds,
    properties: Mutex<HashMap<String, Value>>,
    failing: Mutex<HashSet<String>>,
    latency: Mutex<Option<Duration>>,
    log: Mutex<Vec<Invocation>>,
}

impl MockTransport {
    /// Timeout reported by failing methods, in milliseconds.
    pub const SIMULATED_TIMEOUT_MS: u64 = 5000;

    /// Creates a device with no properties.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a property value at construction.
    #[must_use]
    pub fn with_property(self, key: &str, value: impl Into<Value>) -> Self {
        self.set_property(key, value);
        self
    }

    /// Delays every answer by `latency`.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(latency);
        self
    }

    /// Delays every later answer by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    /// Sets a property value.
    pub fn set_property(&self, key: &str, value: impl Into<Value>) {
        self.properties.lock().insert(key.to_string(), value.into());
    }

    /// Removes a property, so `get_prop` answers with fewer values.
    pub fn remove_property(&self, key: &str) {
        self.properties.lock().remove(key);
    }

    /// Makes every call to `method` fail with a timeout.
    pub fn fail_method(&self, method: &str) {
        self.failing.lock().insert(method.to_string());
    }

    /// Lets `method` succeed again.
    pub fn restore_method(&self, method: &str) {
        self.failing.lock().remove(method);
    }

    /// Returns every recorded call, oldest first.
    #[must_use]
    pub fn invocations(&self) -> Vec<Invocation> {
        self.log.lock().clone()
    }

    /// Returns recorded calls other than `get_prop`.
    #[must_use]
    pub fn commands(&self) -> Vec<Invocation> {
        self.log
            .lock()
            .iter()
            .filter(|call| call.method != GET_PROP)
            .cloned()
            .collect()
    }

    /// Returns how many times `method` was called.
    #[must_use]
    pub fn count(&self, method: &str) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|call| call.method == method)
            .count()
    }

    fn answer(&self, request: &RpcRequest) -> RpcResponse {
        if self.failing.lock().contains(&request.method) {
            return RpcResponse::err(request.id, -1, "simulated timeout");
        }
        if request.method != GET_PROP {
            return RpcResponse::ok(request.id, json!(["ok"]));
        }
        let properties = self.properties.lock();
        let values: Vec<Value> = request
            .params
            .iter()
            .filter_map(|key| key.as_str().and_then(|key| properties.get(key)).cloned())
            .collect();
        RpcResponse::ok(request.id, Value::Array(values))
    }
}

impl Transport for MockTransport {
    async fn invoke(&self, method: &str, params: Vec<Value>) -> Result<Value, TransportError> {
        let request = RpcRequest::new(self.ids.next_id(), method, params);
        self.log.lock().push(Invocation {
            method: request.method.clone(),
            params: request.params.clone(),
        });

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let response = self.answer(&request);
        if response.error.is_some() {
            return Err(TransportError::Timeout(Self::SIMULATED_TIMEOUT_MS));
        }
        let payload = serde_json::to_string(&response)
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        RpcResponse::parse(&payload)
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?
            .into_result(method)
    }
}
