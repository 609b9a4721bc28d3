//! In-process mock transports.
//!
//! Used by the test suite and by demos that run several "frames" inside
//! one process.

use std::sync::Arc;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;

use tokio::sync::Mutex;
use tokio::sync::mpsc;

use crate::transport;
use crate::transport::Transport;

/// A duplex channel transport using tokio mpsc channels.
///
/// Messages sent on one half appear on the peer half's `recv` and vice
/// versa, standing in for a `postMessage` link between two frames.
pub struct DuplexTransport {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Vec<u8>>>>,
}

impl DuplexTransport {
    /// Creates a pair of transports connected to each other.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();

        let a = Self {
            tx: tx_a,
            rx: Arc::new(Mutex::new(rx_b)),
        };

        let b = Self {
            tx: tx_b,
            rx: Arc::new(Mutex::new(rx_a)),
        };

        (a, b)
    }
}

#[async_trait::async_trait]
impl Transport for DuplexTransport {
    async fn send(&self, payload: &[u8]) -> transport::Result<()> {
        self.tx
            .send(payload.to_vec())
            .map_err(|_| transport::Error::ConnectionLost("channel closed".into()))
    }

    async fn recv(&self) -> transport::Result<Option<Vec<u8>>> {
        let mut rx = self.rx.lock().await;
        Ok(rx.recv().await)
    }
}

/// Accepts every send and never delivers anything. For timeout tests.
pub struct SilentTransport;

#[async_trait::async_trait]
impl Transport for SilentTransport {
    async fn send(&self, _payload: &[u8]) -> transport::Result<()> {
        Ok(())
    }

    async fn recv(&self) -> transport::Result<Option<Vec<u8>>> {
        std::future::pending().await
    }
}

/// Fails the first `failures` sends with a connection error, then behaves
/// as the wrapped transport. For retry-policy tests.
pub struct FlakyTransport {
    remaining_failures: AtomicU32,
    inner: DuplexTransport,
}

impl FlakyTransport {
    pub fn new(inner: DuplexTransport, failures: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(failures),
            inner,
        }
    }
}

#[async_trait::async_trait]
impl Transport for FlakyTransport {
    async fn send(&self, payload: &[u8]) -> transport::Result<()> {
        let remaining = self.remaining_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.remaining_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(transport::Error::ConnectionLost("simulated drop".into()));
        }
        self.inner.send(payload).await
    }

    async fn recv(&self) -> transport::Result<Option<Vec<u8>>> {
        self.inner.recv().await
    }
}
