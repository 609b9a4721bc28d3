//! # Framewire
//!
//! Wire protocol for cross-sandbox RPC: the envelope shape that crosses a
//! window-messaging channel, the fault taxonomy a remote endpoint can
//! report, and generation of the identifiers that correlate requests with
//! responses.
//!
//! ## Architecture
//!
//! This crate is pure data plus codec. It knows nothing about transports,
//! pending-call tables, or dispatch; those live in `framerpc`. Everything
//! here is JSON-shaped because argument lists cross a serialization
//! boundary and must be expressible as plain values.

pub mod envelope;
pub mod fault;
pub mod id;

pub use envelope::Envelope;
pub use envelope::response_outcome;
pub use fault::Fault;
pub use id::CallbackId;
pub use id::CorrelationId;
