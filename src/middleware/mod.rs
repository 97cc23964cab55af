//! Middleware layer.
//!
//! A middleware reads the in-flight [`Event`] and either continues, optionally
//! contributing [`Extension`](crate::Extension) fields for later steps, or
//! stops the current phase with a [`Reply`](crate::Reply).
//!
//! ```rust
//! use std::sync::Arc;
//! use vesta::{Event, Extension, Middleware, Reply};
//!
//! let session = Middleware::builder()
//!     .name("session")
//!     .handler(|event: Arc<Event>| async move {
//!         match event.cookies().get("sid") {
//!             Some(sid) => Extension::new().with("session", sid).into(),
//!             None => vesta::Next::Reply(Reply::unauthorized()),
//!         }
//!     })
//!     .build()
//!     .unwrap();
//!
//! let audit = Middleware::builder()
//!     .name("audit")
//!     .requires([session.clone()])
//!     .handler(|event: Arc<Event>| async move {
//!         tracing::info!(session = ?event.get("session"), "audited");
//!     })
//!     .build()
//!     .unwrap();
//!
//! assert!(vesta::middleware::check_requirements([&session, &audit]).is_ok());
//! ```
//!
//! # Requirements
//!
//! `requires` documents which middleware must already have run for this one's
//! reads to succeed. It is not enforced while serving: a field that was never
//! contributed simply reads as absent. [`check_requirements`] verifies an
//! execution order, and the server runs it once per registered route, logging
//! a warning on failure.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::Error;
use crate::event::{Event, Extension};
use crate::handler::{BoxedMiddlewareFn, MiddlewareFn};

pub use crate::handler::{IntoNext, Next};

/// Response descriptors keyed by status code. Stored for documentation tools;
/// the engine never interprets them.
pub type Replies = BTreeMap<u16, Value>;

/// A reusable, named unit of request logic. Cloning is cheap and clones
/// compare equal under [`Middleware::same_as`].
#[derive(Clone)]
pub struct Middleware {
    inner: Arc<Inner>,
}

struct Inner {
    name: Option<String>,
    requires: Vec<Middleware>,
    replies: Replies,
    handler: BoxedMiddlewareFn,
}

impl Middleware {
    /// An anonymous middleware with no requirements.
    pub fn new(handler: impl MiddlewareFn) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: None,
                requires: Vec::new(),
                replies: Replies::new(),
                handler: handler.into_boxed_middleware(),
            }),
        }
    }

    pub fn builder() -> MiddlewareBuilder {
        MiddlewareBuilder::default()
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub fn requires(&self) -> &[Middleware] {
        &self.inner.requires
    }

    pub fn replies(&self) -> &Replies {
        &self.inner.replies
    }

    /// Whether both handles point at the same middleware.
    pub fn same_as(&self, other: &Middleware) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn label(&self) -> &str {
        self.name().unwrap_or("<anonymous>")
    }

    pub(crate) async fn call(&self, event: Arc<Event>) -> Result<Next, Error> {
        self.inner.handler.call(event).await
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Middleware")
            .field("name", &self.inner.name)
            .field("requires", &self.inner.requires.iter().map(Middleware::label).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl From<Extension> for Next {
    fn from(extension: Extension) -> Self {
        Next::Continue(extension)
    }
}

/// Builder for middleware with a name, requirements or reply descriptors.
///
/// [`build`](MiddlewareBuilder::build) fails with [`Error::MissingHandler`]
/// when no handler was supplied.
#[derive(Default)]
pub struct MiddlewareBuilder {
    name: Option<String>,
    requires: Vec<Middleware>,
    replies: Replies,
    handler: Option<BoxedMiddlewareFn>,
}

impl MiddlewareBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn requires(mut self, requires: impl IntoIterator<Item = Middleware>) -> Self {
        self.requires.extend(requires);
        self
    }

    /// Declares the body a reply with `status` carries.
    pub fn reply(mut self, status: u16, descriptor: Value) -> Self {
        self.replies.insert(status, descriptor);
        self
    }

    pub fn handler(mut self, handler: impl MiddlewareFn) -> Self {
        self.handler = Some(handler.into_boxed_middleware());
        self
    }

    pub fn build(self) -> Result<Middleware, Error> {
        let handler = self.handler.ok_or(Error::MissingHandler)?;
        Ok(Middleware {
            inner: Arc::new(Inner {
                name: self.name,
                requires: self.requires,
                replies: self.replies,
                handler,
            }),
        })
    }
}

/// Checks that every middleware's requirements appear earlier in `chain`.
///
/// `chain` is the execution order, e.g. global before, route before, route
/// after, global after.
pub fn check_requirements<'a>(chain: impl IntoIterator<Item = &'a Middleware>) -> Result<(), Error> {
    let mut seen: Vec<&Middleware> = Vec::new();
    for mw in chain {
        if let Some(missing) = mw.requires().iter().find(|r| !seen.iter().any(|s| s.same_as(r))) {
            return Err(Error::UnmetRequirement {
                middleware: mw.label().to_owned(),
                requires: missing.label().to_owned(),
            });
        }
        seen.push(mw);
    }
    Ok(())
}

// ── Execution ─────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Replied,
}

/// Runs `chain` in order against `event`.
///
/// Extensions are merged as they arrive. The first reply is recorded on the
/// event and ends the chain.
pub(crate) async fn run(chain: &[Middleware], event: &mut Arc<Event>) -> Result<Flow, Error> {
    for mw in chain {
        match mw.call(Arc::clone(event)).await? {
            Next::Continue(extension) => {
                if !extension.is_empty() {
                    Arc::make_mut(event).extend(extension);
                }
            }
            Next::Reply(reply) => {
                debug!(middleware = mw.label(), status = reply.status().as_u16(), "middleware replied");
                Arc::make_mut(event).send(reply);
                return Ok(Flow::Replied);
            }
        }
    }
    Ok(Flow::Continue)
}
