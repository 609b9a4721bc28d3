//! # Session context
//!
//! One explicit object per frame holding everything needed to issue and
//! service calls: the endpoint and its callback manager. Built once at
//! session start, passed to whatever needs to issue calls, and torn down
//! once at session end. Nothing ambient, nothing global.

use std::sync::Arc;

use crate::api::ApiClient;
use crate::api::ApiDefiner;
use crate::callback::CallbackManager;
use crate::endpoint::CallOptions;
use crate::endpoint::Endpoint;
use crate::transport::Transport;

/// Per-frame RPC context.
pub struct Session {
    endpoint: Endpoint,
    callbacks: Arc<CallbackManager>,
}

impl Session {
    /// Opens a session over the given transport and spawns the endpoint
    /// pump. The name identifies this frame in logs.
    pub fn connect(name: impl Into<String>, transport: Box<dyn Transport>) -> Self {
        let endpoint = Endpoint::connect(name, transport);
        let callbacks = Arc::new(CallbackManager::new(endpoint.clone()));
        Self { endpoint, callbacks }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn callbacks(&self) -> &CallbackManager {
        &self.callbacks
    }

    /// Typed definer for one named API surface.
    pub fn definer(&self, prefix: Option<&str>) -> ApiDefiner {
        match prefix {
            Some(prefix) => ApiDefiner::with_prefix(self.endpoint.clone(), prefix),
            None => ApiDefiner::new(self.endpoint.clone()),
        }
    }

    /// Typed client for one named API surface.
    pub fn client(&self, prefix: Option<&str>, options: CallOptions) -> ApiClient {
        let client = match prefix {
            Some(prefix) => ApiClient::with_prefix(self.endpoint.clone(), prefix),
            None => ApiClient::new(self.endpoint.clone()),
        };
        client.with_options(options)
    }

    /// Tears the session down: unregisters every callback this side handed
    /// out, clears the registry, fails outstanding calls, and stops the
    /// pump.
    pub fn shutdown(&self) {
        self.callbacks.clear();
        self.endpoint.shutdown();
    }
}
