//! Handler traits and type erasure.
//!
//! # How async handlers are stored
//!
//! The registry holds route handlers of *different* closure types in one
//! `Vec<Route>`, and a middleware chain holds differently-typed middleware
//! functions in one `Vec<Middleware>`. Both are stored as **trait objects**
//! behind an `Arc`.
//!
//! ```text
//! |event| async move { ... }                       ← user writes this
//!        ↓ server.route(options, handler)
//! handler.into_boxed_handler()                     ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(handler))                     ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(event)  at request time             ← one vtable dispatch
//!        ↓
//! Box::pin(async { handler(event).await.into_reply() })  ← BoxFuture
//! ```
//!
//! Handlers take an `Arc<Event>` snapshot rather than a borrow so their
//! futures are `'static` and can be written as plain `async move` blocks.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Error;
use crate::event::{Event, Extension};
use crate::reply::{IntoReply, Reply};

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future.
pub(crate) type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, event: Arc<Event>) -> BoxFuture<Result<Reply, Error>>;
}

#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

#[doc(hidden)]
pub trait ErasedMiddlewareFn {
    fn call(&self, event: Arc<Event>) -> BoxFuture<Result<Next, Error>>;
}

#[doc(hidden)]
pub type BoxedMiddlewareFn = Arc<dyn ErasedMiddlewareFn + Send + Sync + 'static>;

// ── Middleware outcome ────────────────────────────────────────────────────────

/// What a middleware decided.
#[derive(Clone, Debug)]
pub enum Next {
    /// Keep going, merging these fields into the event first.
    Continue(Extension),
    /// Stop the current phase with this reply.
    Reply(Reply),
}

/// Conversion into a [`Next`], used for middleware return values.
///
/// `()` and an empty [`Extension`] both mean "continue with nothing new".
pub trait IntoNext {
    fn into_next(self) -> Result<Next, Error>;
}

impl IntoNext for Next {
    fn into_next(self) -> Result<Next, Error> { Ok(self) }
}

impl IntoNext for () {
    fn into_next(self) -> Result<Next, Error> { Ok(Next::Continue(Extension::new())) }
}

impl IntoNext for Extension {
    fn into_next(self) -> Result<Next, Error> { Ok(Next::Continue(self)) }
}

impl IntoNext for Reply {
    fn into_next(self) -> Result<Next, Error> { Ok(Next::Reply(self)) }
}

impl<T, E> IntoNext for Result<T, E>
where
    T: IntoNext,
    E: Into<Error>,
{
    fn into_next(self) -> Result<Next, Error> {
        self.map_err(Into::into)?.into_next()
    }
}

// ── Public traits ─────────────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is automatically satisfied for any
/// closure or function with the signature:
///
/// ```text
/// Fn(Arc<Event>) -> impl Future<Output = impl IntoReply>
/// ```
pub trait Handler: private::SealedHandler + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

/// Implemented for every valid middleware function.
///
/// ```text
/// Fn(Arc<Event>) -> impl Future<Output = impl IntoNext>
/// ```
pub trait MiddlewareFn: private::SealedMiddleware + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_middleware(self) -> BoxedMiddlewareFn;
}

/// Two sealing traits, one per public trait, so the blanket impls below do
/// not overlap.
mod private {
    pub trait SealedHandler {}
    pub trait SealedMiddleware {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut, R> private::SealedHandler for F
where
    F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

impl<F, Fut, R> private::SealedMiddleware for F
where
    F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoNext + Send + 'static,
{
}

impl<F, Fut, R> MiddlewareFn for F
where
    F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoNext + Send + 'static,
{
    fn into_boxed_middleware(self) -> BoxedMiddlewareFn {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Newtype that bridges a concrete closure to the erased traits.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Arc<Event>) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + Send + 'static,
{
    fn call(&self, event: Arc<Event>) -> BoxFuture<Result<Reply, Error>> {
        let fut = (self.0)(event);
        Box::pin(async move { fut.await.into_reply() })
    }
}

impl<F, Fut, R> ErasedMiddlewareFn for FnHandler<F>
where
    F: Fn(Arc<Event>) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoNext + Send + 'static,
{
    fn call(&self, event: Arc<Event>) -> BoxFuture<Result<Next, Error>> {
        let fut = (self.0)(event);
        Box::pin(async move { fut.await.into_next() })
    }
}
