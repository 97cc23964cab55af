//! The per-request event.
//!
//! An [`Event`] is assembled once per request from the decoded [`Data`], a
//! pending [`Reply`], the host's environment bindings and either its execution
//! context or its durable-object state. Middleware extend it with
//! [`Extension`] fields as the pipeline runs.
//!
//! Middleware and handlers receive an `Arc<Event>` snapshot. The dispatcher
//! merges their results back in between steps, so every step sees the fields
//! contributed by the steps before it.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::cookies::Cookies;
use crate::data::Data;
use crate::error::Error;
use crate::reply::Reply;

/// A host-provided object the engine threads through without inspecting.
pub type Opaque = Arc<dyn Any + Send + Sync>;

/// The host object supplied alongside a request.
#[derive(Clone)]
pub enum Host {
    ExecutionContext(Opaque),
    DurableObject(Opaque),
}

/// Fields a middleware contributes to the event.
///
/// ```rust
/// use vesta::Extension;
/// use serde_json::json;
///
/// let ext = Extension::new()
///     .with("user", json!({"id": "u-1"}))
///     .with("logged", true);
/// assert_eq!(ext.len(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Extension(Map<String, Value>);

impl Extension {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl FromIterator<(String, Value)> for Extension {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The in-flight request as seen by middleware and handlers.
#[derive(Clone)]
pub struct Event {
    data: Data,
    reply: Reply,
    env: Opaque,
    host: Host,
    extensions: Map<String, Value>,
}

impl Event {
    pub(crate) fn new(data: Data, env: Opaque, host: Host) -> Self {
        Self { data, reply: Reply::pending(), env, host, extensions: Map::new() }
    }

    pub fn data(&self) -> &Data { &self.data }
    pub fn method(&self) -> &str { self.data.method() }
    pub fn pathname(&self) -> &str { self.data.pathname() }
    pub fn hostname(&self) -> &str { self.data.hostname() }
    pub fn headers(&self) -> &HeaderMap { self.data.headers() }
    pub fn header(&self, name: &str) -> Option<&str> { self.data.header(name) }
    pub fn cookies(&self) -> &Cookies { self.data.cookies() }
    pub fn query(&self) -> &HashMap<String, String> { self.data.query() }
    pub fn params(&self) -> &HashMap<String, String> { self.data.params() }
    pub fn param(&self, key: &str) -> Option<&str> { self.data.param(key) }
    pub fn body(&self) -> Option<&Value> { self.data.body() }

    /// The current reply. Unsent until a middleware or the handler replies.
    pub fn reply(&self) -> &Reply { &self.reply }

    /// The environment bindings, if they are a `T`.
    pub fn env<T: Any>(&self) -> Option<&T> {
        (*self.env).downcast_ref::<T>()
    }

    pub fn is_durable_object(&self) -> bool {
        matches!(self.host, Host::DurableObject(_))
    }

    /// The execution context, if the server runs in execution-context mode
    /// and it is a `T`.
    pub fn execution_context<T: Any>(&self) -> Option<&T> {
        match &self.host {
            Host::ExecutionContext(ctx) => (**ctx).downcast_ref::<T>(),
            Host::DurableObject(_) => None,
        }
    }

    /// The durable-object state, if the server runs in durable-object mode
    /// and it is a `T`.
    pub fn durable_object_state<T: Any>(&self) -> Option<&T> {
        match &self.host {
            Host::DurableObject(state) => (**state).downcast_ref::<T>(),
            Host::ExecutionContext(_) => None,
        }
    }

    /// An extension field contributed by an earlier middleware.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extensions.get(key)
    }

    /// An extension field deserialized into `T`.
    pub fn extension<T: DeserializeOwned>(&self, key: &str) -> Result<T, Error> {
        let value = self
            .extensions
            .get(key)
            .ok_or_else(|| Error::MissingExtension(key.to_owned()))?;
        T::deserialize(value).map_err(|source| Error::Extension { key: key.to_owned(), source })
    }

    pub fn extensions(&self) -> &Map<String, Value> {
        &self.extensions
    }

    /// Merges `extension` in. A key set twice keeps the later value.
    pub(crate) fn extend(&mut self, extension: Extension) {
        self.extensions.extend(extension.0);
    }

    /// Replaces the current reply. The last reply wins.
    pub(crate) fn send(&mut self, reply: Reply) {
        self.reply = reply;
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.data.params = params;
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("data", &self.data)
            .field("reply", &self.reply)
            .field("durable_object", &self.is_durable_object())
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}
