//! # Transport Abstraction
//!
//! A minimal, async interface for moving bytes between two window-like
//! endpoints.
//!
//! ## Philosophy
//!
//! - **Byte-Oriented**: the transport knows nothing about envelopes,
//!   correlation ids, or methods. It moves opaque buffers.
//! - **One-Way, Unordered**: delivery is asynchronous and may reorder or
//!   duplicate messages relative to other messages. Correlation happens
//!   above, in the endpoint, purely by id.

use std::fmt;

/// Errors that occur at the messaging-channel layer.
#[derive(Debug, Clone)]
pub enum Error {
    /// The peer frame is gone or the channel was dropped.
    ConnectionLost(String),
    /// The operation timed out before completing.
    Timeout,
    /// The channel rejected the payload size.
    PayloadTooLarge,
    /// Generic I/O error or internal transport failure.
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionLost(msg) => write!(f, "connection lost: {}", msg),
            Self::Timeout => write!(f, "transport timed out"),
            Self::PayloadTooLarge => write!(f, "payload too large for transport"),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// A mechanism to deliver byte buffers to a peer endpoint and receive the
/// peer's buffers in return.
///
/// This trait is designed to be object-safe (`Arc<dyn Transport>`).
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Delivers a payload to the peer endpoint. Fire-and-forget: success
    /// means the channel accepted the buffer, not that the peer processed it.
    async fn send(&self, payload: &[u8]) -> Result<()>;

    /// Receives the next payload from the peer.
    ///
    /// `Ok(None)` means the channel is closed and no further messages will
    /// ever arrive.
    async fn recv(&self) -> Result<Option<Vec<u8>>>;
}
