//! # Invocation Observer
//!
//! Local fan-out for a virtual interface: many independent subscribers
//! observe the same method, every subscriber runs for its side effects,
//! and the first one to supply a result determines the return value.
//!
//! This never crosses a transport. It is same-frame plumbing for
//! side-channel events (progress, completion) fanned out from code that
//! directly exposes only a single callback-shaped parameter.
//!
//! Visibility restriction is an explicit allow-list with direct dispatch,
//! not reflective property interception.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The method is not in the configured allow-list.
    MethodNotExposed(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MethodNotExposed(method) => write!(f, "method not exposed by observer: {}", method),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// A subscriber. Returning `Some(value)` supplies a result; `None` is "no
/// opinion" (side effects only).
pub type ObserverHandler = Arc<dyn Fn(&[Value]) -> Option<Value> + Send + Sync>;

/// Boxes a closure into an [`ObserverHandler`].
///
/// Subscribers are removed by reference identity, so callers that intend
/// to unsubscribe must retain the returned handle.
pub fn observer_handler<F>(f: F) -> ObserverHandler
where
    F: Fn(&[Value]) -> Option<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Configuration for [`InvocationObserver`].
#[derive(Clone, Debug, Default)]
pub struct ObserverConfig {
    /// Restricts the observable method names. `None` exposes everything.
    pub properties: Option<Vec<String>>,
    /// Returned when no subscriber supplies a result. Defaults to null.
    pub default_response: Option<Value>,
}

/// Many-subscriber observation of a virtual interface, scoped to one
/// process.
pub struct InvocationObserver {
    subscribers: DashMap<String, Vec<ObserverHandler>>,
    allowed: Option<HashSet<String>>,
    default_response: Value,
}

impl InvocationObserver {
    pub fn new(config: ObserverConfig) -> Self {
        Self {
            subscribers: DashMap::new(),
            allowed: config.properties.map(|props| props.into_iter().collect()),
            default_response: config.default_response.unwrap_or(Value::Null),
        }
    }

    fn check_exposed(&self, method: &str) -> Result<()> {
        match &self.allowed {
            Some(allowed) if !allowed.contains(method) => Err(Error::MethodNotExposed(method.to_string())),
            _ => Ok(()),
        }
    }

    /// Appends a subscriber; invocation order is subscription order.
    pub fn subscribe(&self, method: &str, handler: ObserverHandler) -> Result<()> {
        self.check_exposed(method)?;
        self.subscribers.entry(method.to_string()).or_default().push(handler);
        Ok(())
    }

    /// Removes a previously subscribed handler by reference identity.
    /// Unknown handlers are a no-op.
    pub fn unsubscribe(&self, method: &str, handler: &ObserverHandler) {
        if let Some(mut list) = self.subscribers.get_mut(method) {
            list.retain(|subscribed| !Arc::ptr_eq(subscribed, handler));
        }
    }

    /// Runs every subscriber in order.
    ///
    /// All of them are called for their side effects; the first one to
    /// supply a result determines the return value, falling back to the
    /// configured default when nobody has an opinion.
    pub fn invoke(&self, method: &str, args: &[Value]) -> Result<Value> {
        self.check_exposed(method)?;

        // Snapshot so handlers may subscribe or unsubscribe reentrantly.
        let snapshot: Vec<ObserverHandler> = self
            .subscribers
            .get(method)
            .map(|list| list.clone())
            .unwrap_or_default();

        let mut winner = None;
        for subscriber in &snapshot {
            let supplied = subscriber(args);
            if winner.is_none() {
                winner = supplied;
            }
        }

        Ok(winner.unwrap_or_else(|| self.default_response.clone()))
    }
}
