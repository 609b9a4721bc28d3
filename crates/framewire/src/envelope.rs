//! # Envelope shape and JSON codec
//!
//! Defines the serialized message unit crossing the transport: a request
//! carrying a method name, argument list, and correlation id, or a
//! response carrying the correlation id plus exactly one of result/error.
//!
//! ## Invariants
//!
//! - Decoding never panics on unknown input; malformed bytes produce
//!   [`Error::Malformed`].
//! - Unknown fields are skipped on decode, for forward compatibility.
//! - On decode of a response, a present `error` wins; an absent `result`
//!   reads as JSON null, mirroring an implementation that returned nothing.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::fault::Fault;
use crate::id::CorrelationId;

/// Codec failures.
#[derive(Debug, Clone)]
pub enum Error {
    /// The bytes did not parse as an envelope.
    Malformed(String),
    /// The envelope could not be serialized.
    Encode(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(msg) => write!(f, "malformed envelope: {}", msg),
            Self::Encode(msg) => write!(f, "envelope encoding failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// The serialized message unit crossing the transport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Envelope {
    /// An invocation of a named method on the remote endpoint.
    Request {
        method: String,
        args: Vec<Value>,
        correlation_id: CorrelationId,
    },
    /// The single terminal answer to a request.
    Response {
        correlation_id: CorrelationId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<Fault>,
    },
}

impl Envelope {
    /// Builds a request envelope.
    pub fn request(method: impl Into<String>, args: Vec<Value>, correlation_id: CorrelationId) -> Self {
        Self::Request {
            method: method.into(),
            args,
            correlation_id,
        }
    }

    /// Builds a successful response.
    pub fn response_ok(correlation_id: CorrelationId, result: Value) -> Self {
        Self::Response {
            correlation_id,
            result: Some(result),
            error: None,
        }
    }

    /// Builds a failed response.
    pub fn response_err(correlation_id: CorrelationId, fault: Fault) -> Self {
        Self::Response {
            correlation_id,
            result: None,
            error: Some(fault),
        }
    }

    /// Serializes the envelope for the transport.
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Encode(e.to_string()))
    }

    /// Parses an envelope off the transport.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::Malformed(e.to_string()))
    }
}

/// Collapses a response's fields into its terminal outcome.
///
/// A present error wins over any result; an absent result reads as null.
pub fn response_outcome(result: Option<Value>, error: Option<Fault>) -> std::result::Result<Value, Fault> {
    match error {
        Some(fault) => Err(fault),
        None => Ok(result.unwrap_or(Value::Null)),
    }
}
