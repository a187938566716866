// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! miIO JSON-RPC envelope.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ParseError, TransportError};

/// A request as serialized into the packet payload.
///
/// # Examples
///
/// ```
/// use miio_dehumidifier::protocol::RpcRequest;
/// use serde_json::json;
///
/// let request = RpcRequest::new(7, "set_mode", vec![json!("auto")]);
/// assert_eq!(
///     request.to_json(),
///     r#"{"id":7,"method":"set_mode","params":["auto"]}"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Request id, echoed back by the device.
    pub id: u32,
    /// Method name.
    pub method: String,
    /// Positional parameters.
    pub params: Vec<Value>,
}

impl RpcRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(id: u32, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            id,
            method: method.into(),
            params,
        }
    }

    /// Serializes the request to its wire JSON.
    #[must_use]
    pub fn to_json(&self) -> String {
        // A struct of strings, integers and JSON values always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Error member of a device response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorBody {
    /// Device error code.
    pub code: i64,
    /// Device error message.
    pub message: String,
}

/// A decoded device response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Id of the request being answered.
    pub id: u32,
    /// Result on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorBody>,
}

impl RpcResponse {
    /// Creates a successful response.
    #[must_use]
    pub fn ok(id: u32, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Creates an error response.
    #[must_use]
    pub fn err(id: u32, code: i64, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(RpcErrorBody {
                code,
                message: message.into(),
            }),
        }
    }

    /// Parses a response payload.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Json` if the payload is not a valid envelope.
    pub fn parse(payload: &str) -> Result<Self, ParseError> {
        // Some firmware pads the payload with trailing NUL bytes.
        serde_json::from_str(payload.trim_end_matches('\0')).map_err(Into::into)
    }

    /// Converts the envelope into the call outcome for `method`.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::DeviceRejected` when the device reported an
    /// error, or when the response carries neither a result nor an error.
    pub fn into_result(self, method: &str) -> Result<Value, TransportError> {
        match (self.result, self.error) {
            (_, Some(error)) => Err(TransportError::DeviceRejected {
                method: method.to_string(),
                code: error.code,
                message: error.message,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Err(TransportError::DeviceRejected {
                method: method.to_string(),
                code: 0,
                message: "empty response".to_string(),
            }),
        }
    }
}

/// Sequential request ids.
///
/// Devices drop requests whose id they have just seen, so every call gets a
/// fresh one. Ids wrap back to 1 after [`RequestIds::MAX`].
#[derive(Debug)]
pub struct RequestIds(AtomicU32);

impl RequestIds {
    /// Largest id handed out before wrapping.
    pub const MAX: u32 = 9999;

    /// Creates a sequence starting at 1.
    #[must_use]
    pub fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Returns the next id.
    pub fn next_id(&self) -> u32 {
        let previous = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |id| {
                Some(if id >= Self::MAX { 1 } else { id + 1 })
            })
            .unwrap_or_default();
        if previous >= Self::MAX { 1 } else { previous + 1 }
    }
}

impl Default for RequestIds {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_success_response() {
        let response = RpcResponse::parse(r#"{"id":3,"result":["on","off"]}"#).unwrap();
        assert_eq!(response.id, 3);
        assert_eq!(
            response.into_result("get_prop").unwrap(),
            json!(["on", "off"])
        );
    }

    #[test]
    fn parse_tolerates_trailing_nul_padding() {
        let response = RpcResponse::parse("{\"id\":4,\"result\":[\"ok\"]}\0\0").unwrap();
        assert_eq!(response.result, Some(json!(["ok"])));
    }

    #[test]
    fn error_response_maps_to_device_rejected() {
        let response =
            RpcResponse::parse(r#"{"id":5,"error":{"code":-5001,"message":"invalid arg"}}"#)
                .unwrap();
        let err = response.into_result("set_auto").unwrap_err();
        assert!(matches!(
            err,
            TransportError::DeviceRejected { ref method, code: -5001, .. } if method == "set_auto"
        ));
    }

    #[test]
    fn empty_response_is_rejected() {
        let response = RpcResponse::parse(r#"{"id":6}"#).unwrap();
        assert!(response.into_result("set_led").is_err());
    }

    #[test]
    fn malformed_payload_is_parse_error() {
        assert!(matches!(
            RpcResponse::parse("not json"),
            Err(ParseError::Json(_))
        ));
    }

    #[test]
    fn request_ids_wrap() {
        let ids = RequestIds(AtomicU32::new(RequestIds::MAX - 1));
        assert_eq!(ids.next_id(), RequestIds::MAX);
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);
    }
}
