//! # RPC Endpoint with Async Pump
//!
//! One side of a cross-frame channel: the pending-invocation table, the
//! method registry, and the pump task that demultiplexes inbound envelopes
//! and correlates responses with outstanding calls by id.
//!
//! ## Invariants
//!
//! - Exactly one terminal outcome per call; the pending entry is removed on
//!   every terminal path (resolve, fault, timeout, send failure, shutdown).
//! - Dispatch never blocks the pump: each inbound request runs in its own
//!   task, so an implementation may reenter the endpoint, including calling
//!   back into its own caller while still executing.
//! - A request for an unregistered method is answered with a no-such-method
//!   fault, never dropped; dropping it would leak the caller's pending
//!   entry until timeout.
//! - A response whose correlation id matches no pending entry (typically a
//!   late reply arriving after a local timeout) is discarded silently.

use std::future::Future;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use dashmap::DashMap;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use framewire::CorrelationId;
use framewire::Envelope;
use framewire::Fault;
use framewire::response_outcome;

use crate::transport;
use crate::transport::Transport;

/// Failures surfaced to the immediate caller of [`Endpoint::invoke`].
#[derive(Debug, Clone)]
pub enum InvokeError {
    /// The underlying message channel failed.
    Transport(transport::Error),
    /// The remote endpoint reported a fault.
    Remote(Fault),
    /// No response arrived within the configured budget.
    Timeout,
    /// The endpoint shut down (or its pump died) with the call in flight.
    ChannelClosed,
    /// The envelope could not be serialized.
    Codec(String),
}

impl std::fmt::Display for InvokeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport failure: {}", e),
            Self::Remote(fault) => write!(f, "remote fault: {}", fault),
            Self::Timeout => write!(f, "invocation timed out"),
            Self::ChannelClosed => write!(f, "endpoint closed with call in flight"),
            Self::Codec(msg) => write!(f, "codec failure: {}", msg),
        }
    }
}

impl std::error::Error for InvokeError {}

impl From<transport::Error> for InvokeError {
    fn from(e: transport::Error) -> Self {
        Self::Transport(e)
    }
}

impl InvokeError {
    /// Whether a failed attempt may be retried under the given policy.
    ///
    /// Transport-level failures, closures, and timeouts are always
    /// eligible; remote faults only when the caller opted into retrying
    /// all failures. Codec failures are deterministic and never retried.
    fn retry_eligible(&self, retry_all_failures: bool) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::ChannelClosed => true,
            Self::Remote(_) => retry_all_failures,
            Self::Codec(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, InvokeError>;

/// Per-call timeout and retry policy.
#[derive(Clone, Debug)]
pub struct CallOptions {
    /// `None` waits forever. An explicit opt-in to be used sparingly, e.g.
    /// a handshake call awaiting user interaction.
    pub timeout: Option<Duration>,
    /// Additional attempts after the first failure.
    pub retry_limit: u32,
    /// Retry remote faults too, not just transport-level failures.
    pub retry_all_failures: bool,
}

impl CallOptions {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Policy with no deadline and no retries.
    pub fn no_timeout() -> Self {
        Self {
            timeout: None,
            ..Self::default()
        }
    }
}

impl Default for CallOptions {
    /// Fail-fast: a bounded timeout and zero retries.
    fn default() -> Self {
        Self {
            timeout: Some(Self::DEFAULT_TIMEOUT),
            retry_limit: 0,
            retry_all_failures: false,
        }
    }
}

/// A registered method implementation.
///
/// Always async-capable; long-running work must be expressed through the
/// future so the dispatch loop stays responsive. Errors are serialized
/// into the response rather than propagated.
pub type Handler = Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// Boxes an async closure into a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(move |args| f(args).boxed())
}

struct Inner {
    name: String,
    transport: Arc<dyn Transport>,
    pending: DashMap<CorrelationId, oneshot::Sender<std::result::Result<Value, Fault>>>,
    handlers: DashMap<String, Handler>,
    pump: OnceLock<JoinHandle<()>>,
}

/// One side of an RPC channel.
///
/// Cheap to clone; all clones share the same registry, pending table, and
/// pump task. Both state tables are endpoint-local: there is no cross-frame
/// shared state, only envelopes.
#[derive(Clone)]
pub struct Endpoint {
    inner: Arc<Inner>,
}

impl Endpoint {
    /// Creates the endpoint and spawns its pump task.
    ///
    /// The name identifies this frame in logs and diagnostics.
    pub fn connect(name: impl Into<String>, transport: Box<dyn Transport>) -> Self {
        let inner = Arc::new(Inner {
            name: name.into(),
            transport: Arc::from(transport),
            pending: DashMap::new(),
            handlers: DashMap::new(),
            pump: OnceLock::new(),
        });

        let endpoint = Self { inner };
        let pump = tokio::spawn(Self::pump(endpoint.clone()));
        let _ = endpoint.inner.pump.set(pump);
        endpoint
    }

    /// Returns the frame name this endpoint was created with.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Installs (or replaces) the implementation for `method`.
    pub fn register(&self, method: impl Into<String>, handler: Handler) {
        self.inner.handlers.insert(method.into(), handler);
    }

    /// Removes the implementation for `method`. Idempotent.
    pub fn unregister(&self, method: &str) {
        self.inner.handlers.remove(method);
    }

    /// Whether `method` currently has an implementation.
    pub fn registered(&self, method: &str) -> bool {
        self.inner.handlers.contains_key(method)
    }

    /// Invokes `method` on the remote endpoint and awaits its response.
    ///
    /// Each attempt registers a fresh pending invocation under a fresh
    /// correlation id, sends the request envelope, and awaits the matching
    /// response within the configured budget. Failed attempts are retried
    /// up to `retry_limit` times when the failure is retry-eligible under
    /// the policy.
    pub async fn invoke(&self, method: &str, args: Vec<Value>, options: &CallOptions) -> Result<Value> {
        let mut attempts_left = options.retry_limit;
        loop {
            match self.invoke_once(method, args.clone(), options.timeout).await {
                Ok(value) => return Ok(value),
                Err(e) if attempts_left > 0 && e.retry_eligible(options.retry_all_failures) => {
                    attempts_left -= 1;
                    tracing::debug!(
                        endpoint = %self.inner.name,
                        method,
                        error = %e,
                        attempts_left,
                        "retrying failed invocation"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn invoke_once(&self, method: &str, args: Vec<Value>, timeout: Option<Duration>) -> Result<Value> {
        let id = CorrelationId::generate(Some(method));
        let (tx, rx) = oneshot::channel();
        self.inner.pending.insert(id.clone(), tx);

        let payload = match Envelope::request(method, args, id.clone()).encode() {
            Ok(payload) => payload,
            Err(e) => {
                self.inner.pending.remove(&id);
                return Err(InvokeError::Codec(e.to_string()));
            }
        };

        if let Err(e) = self.inner.transport.send(&payload).await {
            self.inner.pending.remove(&id);
            return Err(e.into());
        }

        let received = match timeout {
            Some(budget) => match tokio::time::timeout(budget, rx).await {
                Ok(received) => received,
                Err(_) => {
                    // The remote may still answer; the late response will
                    // find no pending entry and be discarded.
                    self.inner.pending.remove(&id);
                    return Err(InvokeError::Timeout);
                }
            },
            None => rx.await,
        };

        match received {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(fault)) => Err(InvokeError::Remote(fault)),
            Err(_) => {
                self.inner.pending.remove(&id);
                Err(InvokeError::ChannelClosed)
            }
        }
    }

    /// Stops the pump, fails every outstanding call, and clears the
    /// registry. Further inbound traffic is ignored.
    pub fn shutdown(&self) {
        if let Some(pump) = self.inner.pump.get() {
            pump.abort();
        }
        self.inner.handlers.clear();
        self.fail_all_pending();
    }

    /// Drops every pending entry; waiting callers observe `ChannelClosed`.
    fn fail_all_pending(&self) {
        self.inner.pending.clear();
    }

    /// Reads the transport until it closes or fails, routing every inbound
    /// envelope. On exit, all outstanding calls are failed.
    async fn pump(endpoint: Endpoint) {
        loop {
            match endpoint.inner.transport.recv().await {
                Ok(Some(payload)) => endpoint.accept(&payload),
                Ok(None) => {
                    tracing::debug!(endpoint = %endpoint.inner.name, "transport closed");
                    break;
                }
                Err(e) => {
                    tracing::warn!(endpoint = %endpoint.inner.name, error = %e, "transport failure in pump");
                    break;
                }
            }
        }
        endpoint.fail_all_pending();
    }

    fn accept(&self, payload: &[u8]) {
        let envelope = match Envelope::decode(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(endpoint = %self.inner.name, error = %e, "discarding malformed envelope");
                return;
            }
        };

        match envelope {
            Envelope::Request { method, args, correlation_id } => {
                // Spawned so a slow implementation cannot stall unrelated
                // calls sharing this pump, and so implementations may issue
                // their own invocations mid-dispatch.
                let endpoint = self.clone();
                tokio::spawn(async move {
                    endpoint.dispatch(method, args, correlation_id).await;
                });
            }
            Envelope::Response { correlation_id, result, error } => {
                self.settle(correlation_id, result, error);
            }
        }
    }

    /// Completes the pending invocation matching `id`, if any.
    fn settle(&self, id: CorrelationId, result: Option<Value>, error: Option<Fault>) {
        let Some((_, tx)) = self.inner.pending.remove(&id) else {
            // Late reply after a local timeout, or a duplicate. Dropped.
            tracing::debug!(endpoint = %self.inner.name, correlation_id = %id, "discarding response with no pending invocation");
            return;
        };
        let _ = tx.send(response_outcome(result, error));
    }

    /// Services one inbound request and sends exactly one response.
    ///
    /// Implementation errors are caught and serialized into the response;
    /// nothing thrown here can reach the pump.
    async fn dispatch(&self, method: String, args: Vec<Value>, id: CorrelationId) {
        // Clone the handler out of the map before awaiting.
        let handler = self.inner.handlers.get(&method).map(|entry| entry.value().clone());

        let reply = match handler {
            None => Envelope::response_err(id, Fault::NoSuchMethod { method }),
            Some(handler) => match handler(args).await {
                Ok(value) => Envelope::response_ok(id, value),
                // An implementation may report a wire fault directly (e.g.
                // a relay forwarding a downstream fault, or a one-shot
                // callback that already fired); anything else crosses as
                // an application error.
                Err(e) => match e.downcast::<Fault>() {
                    Ok(fault) => Envelope::response_err(id, fault),
                    Err(e) => Envelope::response_err(id, Fault::Application { message: format!("{e:#}") }),
                },
            },
        };

        let payload = match reply.encode() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(endpoint = %self.inner.name, error = %e, "failed to encode reply");
                return;
            }
        };
        if let Err(e) = self.inner.transport.send(&payload).await {
            tracing::warn!(endpoint = %self.inner.name, error = %e, "failed to send reply");
        }
    }
}
