//! Wire-visible failure taxonomy.
//!
//! A fault is the `error` half of a response envelope: something the
//! remote endpoint reports back to the caller. Local failures (timeouts,
//! transport loss) never appear here; they are the caller's own concern.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Failure reported by the remote endpoint inside a response envelope.
///
/// The two cases must stay distinguishable on the caller side: a request
/// for a method nobody registered is a wiring problem, while an
/// implementation that ran and failed is an application problem.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Fault {
    /// The request named a method with no registered implementation.
    NoSuchMethod { method: String },
    /// The registered implementation failed; its rendered message crossed
    /// the wire.
    Application { message: String },
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSuchMethod { method } => write!(f, "no such method: {}", method),
            Self::Application { message } => write!(f, "remote implementation failed: {}", message),
        }
    }
}

impl std::error::Error for Fault {}
