//! # Typed API surfaces
//!
//! Thin, stateless wrappers pairing compile-time request/response types
//! with wire method names. A definer/client pair per named API surface
//! (e.g. a parent-facing API and a child-facing API), optionally
//! namespaced by a prefix so multiple logical APIs can share one channel
//! without method-name collisions.
//!
//! Typing is compile-time only: the wire carries plain JSON, and both
//! ends must agree on the shared interface out-of-band.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::endpoint::CallOptions;
use crate::endpoint::Endpoint;
use crate::endpoint::InvokeError;
use crate::endpoint::handler;

#[derive(Debug)]
pub enum Error {
    /// The invocation itself failed.
    Invoke(InvokeError),
    /// The payload did not match the compile-time type.
    Codec(serde_json::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invoke(e) => write!(f, "invocation failed: {}", e),
            Self::Codec(e) => write!(f, "payload did not match the typed interface: {}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<InvokeError> for Error {
    fn from(e: InvokeError) -> Self {
        Self::Invoke(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

fn wire_name(prefix: Option<&str>, method: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}/{}", prefix, method),
        None => method.to_string(),
    }
}

/// Registers typed implementations on the local endpoint.
#[derive(Clone)]
pub struct ApiDefiner {
    endpoint: Endpoint,
    prefix: Option<String>,
}

impl ApiDefiner {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint, prefix: None }
    }

    /// Namespaces every defined method under `prefix`.
    pub fn with_prefix(endpoint: Endpoint, prefix: impl Into<String>) -> Self {
        Self {
            endpoint,
            prefix: Some(prefix.into()),
        }
    }

    /// Installs (or replaces) the implementation for `method`.
    ///
    /// The first wire argument is decoded into `Req` (a missing argument
    /// reads as JSON null); the implementation's return value is encoded
    /// back as the result. Implementation errors travel to the caller as
    /// application faults.
    pub fn define<Req, Resp, F, Fut>(&self, method: &str, f: F)
    where
        Req: DeserializeOwned + Send + 'static,
        Resp: Serialize + Send + 'static,
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Resp>> + Send + 'static,
    {
        let f = Arc::new(f);
        let typed = handler(move |mut args: Vec<Value>| {
            let f = f.clone();
            async move {
                let first = if args.is_empty() { Value::Null } else { args.swap_remove(0) };
                let request: Req = serde_json::from_value(first)
                    .map_err(|e| anyhow::anyhow!("invalid request payload: {e}"))?;
                let response = f(request).await?;
                serde_json::to_value(response).map_err(|e| anyhow::anyhow!("unencodable response: {e}"))
            }
        });
        self.endpoint.register(wire_name(self.prefix.as_deref(), method), typed);
    }

    /// Removes the implementation for `method`. Idempotent.
    pub fn undefine(&self, method: &str) {
        self.endpoint.unregister(&wire_name(self.prefix.as_deref(), method));
    }
}

/// Issues typed calls against the remote endpoint.
#[derive(Clone)]
pub struct ApiClient {
    endpoint: Endpoint,
    prefix: Option<String>,
    options: CallOptions,
}

impl ApiClient {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            prefix: None,
            options: CallOptions::default(),
        }
    }

    /// Namespaces every called method under `prefix`; must match the
    /// remote definer's prefix.
    pub fn with_prefix(endpoint: Endpoint, prefix: impl Into<String>) -> Self {
        Self {
            endpoint,
            prefix: Some(prefix.into()),
            options: CallOptions::default(),
        }
    }

    /// Replaces the timeout/retry policy applied to every call.
    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    /// Calls `method` with a single typed argument, decoding the result.
    pub async fn call<Req, Resp>(&self, method: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let arg = serde_json::to_value(request).map_err(Error::Codec)?;
        let value = self
            .endpoint
            .invoke(&wire_name(self.prefix.as_deref(), method), vec![arg], &self.options)
            .await?;
        serde_json::from_value(value).map_err(Error::Codec)
    }
}
