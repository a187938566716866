// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the dehumidifier library.
//!
//! Transport failures, malformed device responses, caller validation
//! failures and precondition failures each get their own variant so the
//! accessory boundary can report them without inspecting strings.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred during value validation.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// The device transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A device response could not be decoded.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// A caller supplied a value the setter cannot accept.
    #[error("invalid value for {label}: {reason}")]
    InvalidValue {
        /// The setter that rejected the value.
        label: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The device had to be powered on first and that command failed.
    #[error("power-on before {label} failed: {source}")]
    PowerOnFailed {
        /// The gated setter that was not sent.
        label: String,
        /// The underlying power-on failure.
        #[source]
        source: Box<Error>,
    },

    /// No successful poll has completed, so there is nothing to read.
    #[error("{label}: device state not yet available")]
    NotYetAvailable {
        /// The getter that was invoked.
        label: String,
    },

    /// Accessory configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A scheduled command task ended without reporting an outcome.
    #[error("command task for {0} ended without a result")]
    TaskFailed(String),
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A numeric value is outside the allowed range.
    #[error("value {actual} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Minimum allowed value.
        min: u8,
        /// Maximum allowed value.
        max: u8,
        /// The actual value that was provided.
        actual: u8,
    },

    /// An unknown switch status string was provided.
    #[error("invalid switch status: {0}")]
    InvalidSwitchStatus(String),

    /// An unknown operating mode string was provided.
    #[error("invalid mode: {0}")]
    InvalidMode(String),
}

/// Errors reported by a device transport.
///
/// The core never retries on any of these; they are either logged (polling)
/// or handed back to the caller (commands).
#[derive(Debug, Error)]
pub enum TransportError {
    /// The device could not be reached.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The request timed out.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// The device answered with an RPC error.
    #[error("device rejected {method}: {message} (code {code})")]
    DeviceRejected {
        /// The method that was rejected.
        method: String,
        /// The device error code.
        code: i64,
        /// The device error message.
        message: String,
    },
}

/// Errors related to decoding device responses.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON decoding failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The response did not have the expected shape.
    #[error("unexpected response format: {0}")]
    UnexpectedFormat(String),

    /// A property read returned the wrong number of values.
    #[error("expected {expected} property values, got {actual}")]
    PropertyCount {
        /// Number of tracked keys requested.
        expected: usize,
        /// Number of values returned.
        actual: usize,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
