//! # Callback Manager
//!
//! Live functions cannot cross a serialization boundary. The manager
//! stands them in with id-indexed indirection: each callback is registered
//! as an ephemeral wire method under a generated id, the id map travels in
//! place of the object, and the receiving side rebuilds a stub whose calls
//! round-trip back to the original functions.
//!
//! ## Lifecycle
//!
//! The registering side owns every id it hands out. A leaked registration
//! is a permanent handler leak, so cleanup is explicit and happens one of
//! two ways: proactively at session teardown via [`CallbackManager::clear`],
//! or reactively when the stub side announces it is done via
//! [`CallbackStub::cleanup`]. Unregistering an id twice is a no-op.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use framewire::CallbackId;
use framewire::Fault;

use crate::endpoint::CallOptions;
use crate::endpoint::Endpoint;
use crate::endpoint::Handler;
use crate::endpoint::InvokeError;
use crate::endpoint::handler;

/// Wire method every manager installs for reactive cleanup. Receives a
/// list of callback ids and unregisters each; unknown ids are ignored.
pub const CLEANUP_METHOD: &str = "callback/unregister";

/// Serializable stand-in for a live multi-method object, keyed by property
/// name to callback id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackMap {
    pub props: BTreeMap<String, CallbackId>,
}

impl CallbackMap {
    pub fn callback_id(&self, prop: &str) -> Option<&CallbackId> {
        self.props.get(prop)
    }
}

/// Registers ephemeral single-purpose methods on the fly and keeps the
/// books on every id handed out, so a session can tear them all down.
///
/// Cheap to clone; all clones share one ledger of registered ids.
#[derive(Clone)]
pub struct CallbackManager {
    endpoint: Endpoint,
    registered: Arc<DashMap<CallbackId, ()>>,
}

impl CallbackManager {
    /// Wraps an endpoint and installs the reactive cleanup method.
    pub fn new(endpoint: Endpoint) -> Self {
        let registered: Arc<DashMap<CallbackId, ()>> = Arc::new(DashMap::new());

        let cleanup_endpoint = endpoint.clone();
        let cleanup_registered = registered.clone();
        endpoint.register(
            CLEANUP_METHOD,
            handler(move |args: Vec<Value>| {
                let endpoint = cleanup_endpoint.clone();
                let registered = cleanup_registered.clone();
                async move {
                    let ids = args.first().and_then(Value::as_array).cloned().unwrap_or_default();
                    for id in ids.iter().filter_map(Value::as_str) {
                        endpoint.unregister(id);
                        registered.remove(&CallbackId::from(id.to_string()));
                    }
                    Ok(Value::Null)
                }
            }),
        );

        Self { endpoint, registered }
    }

    /// Registers `f` under a fresh id and returns the id.
    ///
    /// The id doubles as the wire method name. Ids are generated, never
    /// caller-supplied, so registration can never silently overwrite an
    /// existing handler.
    pub fn register_method(&self, f: Handler, label: Option<&str>) -> CallbackId {
        let id = CallbackId::generate(label);
        self.endpoint.register(id.as_str(), f);
        self.registered.insert(id.clone(), ());
        id
    }

    /// Registers every named function, producing the serializable map that
    /// travels in place of the live object.
    pub fn register_object(&self, methods: Vec<(&str, Handler)>) -> CallbackMap {
        let mut props = BTreeMap::new();
        for (name, f) in methods {
            let id = self.register_method(f, Some(name));
            props.insert(name.to_string(), id);
        }
        CallbackMap { props }
    }

    /// Registers a one-shot handler that unregisters itself after its
    /// first invocation. Used for one-shot acknowledgements; later
    /// invocations see no-such-method.
    pub fn callback_once(&self, f: Handler) -> CallbackId {
        let id = CallbackId::generate(Some("once"));
        let endpoint = self.endpoint.clone();
        let registered = self.registered.clone();
        let fired = Arc::new(AtomicBool::new(false));
        let once_id = id.clone();

        let wrapped = handler(move |args: Vec<Value>| {
            let f = f.clone();
            let endpoint = endpoint.clone();
            let registered = registered.clone();
            let fired = fired.clone();
            let id = once_id.clone();
            async move {
                // Guards at-most-once firing even when two requests race
                // in before the unregister lands. Losers see the same
                // fault as any unregistered id.
                if fired.swap(true, Ordering::SeqCst) {
                    anyhow::bail!(Fault::NoSuchMethod {
                        method: id.as_str().to_string(),
                    });
                }
                endpoint.unregister(id.as_str());
                registered.remove(&id);
                f(args).await
            }
        });

        self.endpoint.register(id.as_str(), wrapped);
        self.registered.insert(id.clone(), ());
        id
    }

    /// Unregisters one id. Already-unregistered ids are a no-op.
    pub fn unregister(&self, id: &CallbackId) {
        self.endpoint.unregister(id.as_str());
        self.registered.remove(id);
    }

    /// Unregisters everything this manager ever handed out. Called at
    /// session teardown.
    pub fn clear(&self) {
        let ids: Vec<CallbackId> = self.registered.iter().map(|entry| entry.key().clone()).collect();
        for id in ids {
            self.unregister(&id);
        }
    }

    /// Rebuilds a callable stub from a received map. Stub calls route back
    /// to the registering side through this endpoint's channel.
    pub fn make_stub(&self, map: CallbackMap) -> CallbackStub {
        CallbackStub {
            endpoint: self.endpoint.clone(),
            map,
            options: CallOptions::default(),
        }
    }
}

#[derive(Debug)]
pub enum StubError {
    /// The map has no entry for the requested property. Local; no wire
    /// traffic happens.
    UnknownProperty(String),
    /// The round trip to the original callback failed.
    Invoke(InvokeError),
}

impl std::fmt::Display for StubError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownProperty(prop) => write!(f, "callback map has no property: {}", prop),
            Self::Invoke(e) => write!(f, "callback round trip failed: {}", e),
        }
    }
}

impl std::error::Error for StubError {}

pub type StubResult<T> = std::result::Result<T, StubError>;

/// Reconstructed callable object built from a callback map.
///
/// Each call crosses back over the channel and invokes the original bound
/// function on the side that registered it, returning that call's result.
pub struct CallbackStub {
    endpoint: Endpoint,
    map: CallbackMap,
    options: CallOptions,
}

impl CallbackStub {
    /// Replaces the timeout/retry policy applied to stub calls.
    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    pub fn map(&self) -> &CallbackMap {
        &self.map
    }

    /// Invokes the original callback behind `prop` with `args`.
    pub async fn call(&self, prop: &str, args: Vec<Value>) -> StubResult<Value> {
        let id = self
            .map
            .callback_id(prop)
            .ok_or_else(|| StubError::UnknownProperty(prop.to_string()))?;
        self.endpoint
            .invoke(id.as_str(), args, &self.options)
            .await
            .map_err(StubError::Invoke)
    }

    /// Tells the registering side the object is no longer needed; every id
    /// in the map is unregistered over there. Call when the logical
    /// operation finishes (upload complete, widget destroyed) so the
    /// registrant does not accumulate dead handlers.
    pub async fn cleanup(&self) -> StubResult<()> {
        let ids: Vec<Value> = self
            .map
            .props
            .values()
            .map(|id| Value::String(id.as_str().to_string()))
            .collect();
        self.endpoint
            .invoke(CLEANUP_METHOD, vec![Value::Array(ids)], &self.options)
            .await
            .map_err(StubError::Invoke)?;
        Ok(())
    }
}
