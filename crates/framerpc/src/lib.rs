//! # Framerpc
//!
//! Cross-sandbox RPC runtime. A top-level window, a sandboxed child frame,
//! and further nested frames each hold an [`endpoint::Endpoint`] over a
//! window-style message [`transport::Transport`] and invoke typed async
//! methods on each other: request/response correlation, per-call
//! timeout/retry policy, callback indirection for live objects, and
//! explicit teardown when a session ends.
//!
//! Application code works through [`session::Session`] and the typed
//! [`api`] wrappers; envelopes, correlation ids, and the transport never
//! leak past this crate.

pub mod api;
pub mod callback;
pub mod endpoint;
pub mod mock_transport;
pub mod observer;
pub mod session;
pub mod transport;
