// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device transport abstraction.
//!
//! The miIO protocol is a JSON-RPC exchange (`{"id", "method", "params"}`)
//! carried inside encrypted UDP packets. Packet framing, encryption and the
//! hello handshake live in the [`Transport`] implementation; the rest of the
//! library only ever sees method names, positional parameters and decoded
//! results.
//!
//! - [`Transport`]: the seam every device session talks through
//! - [`RpcRequest`] / [`RpcResponse`]: the JSON envelope, for transport implementors
//! - [`MockTransport`]: an in-process device for tests and demos

mod mock;
mod rpc;

pub use mock::{Invocation, MockTransport};
pub use rpc::{RequestIds, RpcErrorBody, RpcRequest, RpcResponse};

use std::future::Future;

use serde_json::Value;

use crate::error::TransportError;

/// Method used to read a batch of properties.
pub const GET_PROP: &str = "get_prop";

/// Trait for transports that can invoke miIO methods on a device.
///
/// Latency and availability are outside the library's control: every call may
/// take a full network round-trip and may fail. Timeouts are the transport's
/// responsibility and surface as [`TransportError::Timeout`].
pub trait Transport: Send + Sync + 'static {
    /// Invokes `method` with positional `params` and returns the decoded
    /// `result` member of the device response.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` on network failure, timeout or when the device
    /// answers with an RPC error.
    fn invoke(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> impl Future<Output = Result<Value, TransportError>> + Send;
}

impl<T: Transport> Transport for std::sync::Arc<T> {
    fn invoke(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> impl Future<Output = Result<Value, TransportError>> + Send {
        (**self).invoke(method, params)
    }
}
