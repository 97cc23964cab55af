//! # vesta
//!
//! Versioned routing and middleware pipelines for serverless edge functions.
//!
//! ## The contract
//!
//! The host runtime owns the socket, TLS and process lifecycle. It hands each
//! request to [`Server::handle`] along with its bindings and a host object,
//! and sends back whatever comes out. vesta does the part that changes
//! between applications:
//!
//! - Routing on `(pathname, method, compatibility date)`: several versions of
//!   an endpoint live side by side and callers pick one with the
//!   `x-compatibility-date` header
//! - Request decoding: JSON, url-encoded and multipart bodies, query, cookies
//! - Middleware chains, global and per route, that pass data forward through
//!   [`Extension`]s or stop early with a [`Reply`]
//! - A failure boundary: an error or panic anywhere becomes a `500`
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use vesta::{Config, Event, Extension, Middleware, Next, Reply, RouteOptions, Server};
//!
//! # async fn run() {
//! let auth = Middleware::builder()
//!     .name("auth")
//!     .handler(|event: Arc<Event>| async move {
//!         match event.header("authorization") {
//!             Some(token) => Next::Continue(Extension::new().with("token", token)),
//!             None => Next::Reply(Reply::unauthorized()),
//!         }
//!     })
//!     .build()
//!     .unwrap();
//!
//! let server = Server::new(Config::default())
//!     .route(
//!         RouteOptions::new().method("GET").pathname("/books/:bookId").before([auth.clone()]),
//!         get_book_v1,
//!     )
//!     .route(
//!         RouteOptions::new()
//!             .method("GET")
//!             .pathname("/books/:bookId")
//!             .compatibility_date("2024-01-01")
//!             .before([auth]),
//!         get_book_v2,
//!     );
//!
//! let request = http::Request::get("/books/42")
//!     .header("authorization", "secret")
//!     .header("x-compatibility-date", "2024-03-01")
//!     .body(http_body_util::Full::<bytes::Bytes>::default())
//!     .unwrap();
//! let response = server.handle(request, Arc::new(()), Arc::new(())).await;
//! assert_eq!(response.status(), 200);
//! # }
//!
//! async fn get_book_v1(event: Arc<Event>) -> Reply {
//!     Reply::ok().json(serde_json::json!({ "id": event.param("bookId") }))
//! }
//!
//! async fn get_book_v2(event: Arc<Event>) -> Reply {
//!     Reply::ok().json(serde_json::json!({ "book": { "id": event.param("bookId") } }))
//! }
//! ```

mod config;
mod cookies;
mod data;
mod date;
mod error;
mod event;
mod handler;
mod introspect;
mod method;
mod pattern;
mod reply;
mod router;
mod server;
mod validation;

pub mod middleware;

pub use config::Config;
pub use cookies::{CookieOptions, Cookies};
pub use data::Data;
pub use date::CompatibilityDate;
pub use error::{BoxError, Error, Result};
pub use event::{Event, Extension, Host, Opaque};
pub use handler::{Handler, IntoNext, MiddlewareFn, Next};
pub use introspect::INTROSPECTION_PATHNAME;
pub use method::Method;
pub use middleware::{Middleware, MiddlewareBuilder};
pub use pattern::Pattern;
pub use reply::{IntoReply, Reply, Response};
pub use router::{Route, RouteOptions, Router, Schemas};
pub use server::{COMPATIBILITY_DATE_HEADER, EdgeService, Server};
pub use validation::Validator;
