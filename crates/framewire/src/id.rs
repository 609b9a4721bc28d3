//! Identifier generation for calls and callbacks.
//!
//! Both id kinds are random tokens, optionally suffixed with a
//! human-readable label for diagnostics. Ids are generated, never
//! caller-supplied, so a fresh id can never silently overwrite an
//! existing registration.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

fn random_token() -> String {
    format!("{:016x}", rand::random::<u64>())
}

/// Unique token pairing a request to its eventual response.
///
/// Unique per call attempt: a retried call carries a fresh id, so a late
/// response to an abandoned attempt can never match a live one.
#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generates a fresh id, optionally suffixed with the method name.
    pub fn generate(method: Option<&str>) -> Self {
        match method {
            Some(method) => Self(format!("{}-{}", random_token(), method)),
            None => Self(random_token()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CorrelationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier of an ephemeral callback handler.
///
/// Callback ids double as wire method names: invoking the id routes back
/// to the function registered under it.
#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallbackId(String);

impl CallbackId {
    /// Generates a fresh id, optionally suffixed with a label naming the
    /// property the callback stands in for.
    pub fn generate(label: Option<&str>) -> Self {
        match label {
            Some(label) => Self(format!("cb-{}-{}", random_token(), label)),
            None => Self(format!("cb-{}", random_token())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CallbackId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
