//! Request dispatch.
//!
//! [`Server::handle`] drives one request through its lifecycle:
//!
//! 1. Decode the request into an [`Event`].
//! 2. Run global before-middleware. A reply skips straight to step 7.
//! 3. Read the `x-compatibility-date` header and find the route serving
//!    `(pathname, method, date)`. A malformed or future date replies `400`,
//!    no matching route replies `404`; both skip to step 7.
//! 4. Attach path parameters, validate declared schemas, then run the route's
//!    before-middleware. A reply skips to step 6.
//! 5. Call the route handler.
//! 6. Run the route's after-middleware.
//! 7. Run global after-middleware. This always happens.
//! 8. Serialize whatever was replied, or an empty response with the
//!    configured default status.
//!
//! Any error or panic along the way is logged and answered with a bare `500`.
//!
//! The host runtime owns the listener. It hands every request to
//! [`Server::handle`] together with its bindings and host object, or serves
//! [`Server::into_service`] from a hyper connection.

use std::any::Any;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Once};

use futures_util::FutureExt;
use http::StatusCode;
use hyper::body::{Body, Incoming};
use tracing::{Instrument, debug, error, info_span, warn};

use crate::config::Config;
use crate::data::Data;
use crate::date::CompatibilityDate;
use crate::error::{BoxError, Error};
use crate::event::{Event, Host, Opaque};
use crate::handler::Handler;
use crate::introspect;
use crate::method::Method;
use crate::middleware::{self, Flow, Middleware};
use crate::reply::{Reply, Response};
use crate::router::{RouteOptions, Router};
use crate::validation::{self, Validator};

/// Request header selecting which version of a route serves the request.
pub const COMPATIBILITY_DATE_HEADER: &str = "x-compatibility-date";

/// The dispatcher: configuration, route registry and global middleware.
///
/// Build it during startup, then share it behind an [`Arc`]:
///
/// ```rust
/// use std::sync::{Arc, Once};
/// use vesta::{Config, Event, Middleware, Reply, RouteOptions, Server};
///
/// async fn hello(event: Arc<Event>) -> Reply {
///     let name = event.param("name").unwrap_or("world");
///     Reply::ok().json(serde_json::json!({ "hello": name }))
/// }
///
/// let server = Server::new(Config::default())
///     .before(Middleware::new(|_event: Arc<Event>| async {}))
///     .route(RouteOptions::new().method("GET").pathname("/hello/:name"), hello);
/// let server = Arc::new(server);
/// ```
pub struct Server {
    config: Config,
    default_status: StatusCode,
    router: Router,
    before: Vec<Middleware>,
    after: Vec<Middleware>,
    validator: Option<Arc<dyn Validator>>,
    requirements: Once,
}

impl Server {
    pub fn new(config: Config) -> Self {
        let default_status = StatusCode::from_u16(config.default_status).unwrap_or_else(|_| {
            warn!(status = config.default_status, "invalid default status, using 200");
            StatusCode::OK
        });
        Self {
            default_status,
            router: Router::with_prefix(config.prefix.clone()),
            config,
            before: Vec::new(),
            after: Vec::new(),
            validator: None,
            requirements: Once::new(),
        }
    }

    /// Appends a global middleware that runs before route lookup.
    pub fn before(mut self, middleware: Middleware) -> Self {
        self.before.push(middleware);
        self
    }

    /// Appends a global middleware that runs after everything else, even when
    /// an earlier step replied.
    pub fn after(mut self, middleware: Middleware) -> Self {
        self.after.push(middleware);
        self
    }

    /// Installs the validator for route schemas.
    pub fn validator(mut self, validator: impl Validator) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Registers a route.
    ///
    /// An invalid route is logged and dropped; registration never fails the
    /// caller. Middleware requirements are checked against the final global
    /// chains when the first request is handled, see
    /// [`unmet_requirements`](Server::unmet_requirements).
    pub fn route(mut self, options: RouteOptions, handler: impl Handler) -> Self {
        self.router.register(options, handler);
        self
    }

    /// Every registered route whose full chain (global before, route before,
    /// route after, global after) runs a middleware ahead of one it requires.
    pub fn unmet_requirements(&self) -> Vec<(&str, Error)> {
        self.router
            .routes()
            .iter()
            .filter_map(|route| {
                let chain = self.before.iter().chain(route.before()).chain(route.after()).chain(&self.after);
                middleware::check_requirements(chain).err().map(|e| (route.name(), e))
            })
            .collect()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Handles one request.
    ///
    /// `env` carries the deployment bindings. `host` is the execution context,
    /// or the durable-object state when [`Config::durable_object`] is set.
    /// Never fails: errors become a `500` response.
    pub async fn handle<B>(&self, request: http::Request<B>, env: Opaque, host: Opaque) -> Response
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        self.requirements.call_once(|| {
            for (route, e) in self.unmet_requirements() {
                warn!(route, error = %e, "middleware requirements are not met");
            }
        });

        let span = info_span!("request", method = %request.method(), path = %request.uri().path());
        async move {
            match AssertUnwindSafe(self.dispatch(request, env, host)).catch_unwind().await {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    error!(error = %e, "request failed");
                    server_error()
                }
                Err(panic) => {
                    error!(panic = panic_message(panic.as_ref()), "request handler panicked");
                    server_error()
                }
            }
        }
        .instrument(span)
        .await
    }

    /// A hyper service answering every request with [`Server::handle`].
    pub fn into_service(self: Arc<Self>, env: Opaque, host: Opaque) -> EdgeService {
        EdgeService { server: self, env, host }
    }

    async fn dispatch<B>(&self, request: http::Request<B>, env: Opaque, host: Opaque) -> Result<Response, Error>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        if self.config.introspection
            && let Some(response) = introspect::respond(&self.router, &self.config, request.uri())?
        {
            return Ok(response);
        }

        let data = Data::from_request(request, &self.config.cookies).await?;
        let host = if self.config.durable_object {
            Host::DurableObject(host)
        } else {
            Host::ExecutionContext(host)
        };
        let mut event = Arc::new(Event::new(data, env, host));

        if middleware::run(&self.before, &mut event).await? == Flow::Continue {
            self.serve_route(&mut event).await?;
        }
        middleware::run(&self.after, &mut event).await?;

        event.reply().to_response(self.default_status)
    }

    /// Steps 3 to 6: everything between the global middleware phases.
    async fn serve_route(&self, event: &mut Arc<Event>) -> Result<(), Error> {
        let date = match event.headers().get(COMPATIBILITY_DATE_HEADER) {
            None => None,
            Some(raw) => match raw.to_str().ok().and_then(|s| s.parse::<CompatibilityDate>().ok()) {
                Some(date) if !date.is_future() => Some(date),
                _ => {
                    debug!(date = ?raw, "rejected compatibility date");
                    Arc::make_mut(event).send(Reply::bad_request().message("Invalid compatibility date"));
                    return Ok(());
                }
            },
        };

        let found = event
            .method()
            .parse::<Method>()
            .ok()
            .filter(|method| *method != Method::All)
            .and_then(|method| self.router.find(event.pathname(), method, date, false))
            .cloned();
        let Some(route) = found else {
            debug!("no route matched");
            Arc::make_mut(event).send(Reply::not_found());
            return Ok(());
        };
        debug!(route = route.name(), "route matched");

        let params = route.pattern().captures(event.pathname()).unwrap_or_default();
        Arc::make_mut(event).set_params(params);

        let invalid = self
            .validator
            .as_deref()
            .and_then(|validator| validation::check(validator, route.schemas(), &**event));
        let flow = match invalid {
            Some(reply) => {
                Arc::make_mut(event).send(reply);
                Flow::Replied
            }
            None => middleware::run(route.before(), event).await?,
        };

        if flow == Flow::Continue {
            let reply = route.call(Arc::clone(event)).await?;
            Arc::make_mut(event).send(reply);
        }
        middleware::run(route.after(), event).await?;
        Ok(())
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("routes", &self.router.len())
            .field("before", &self.before)
            .field("after", &self.after)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

fn server_error() -> Response {
    let mut response = Response::default();
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic>")
}

// ── hyper adapter ─────────────────────────────────────────────────────────────

/// A [`hyper::service::Service`] bound to one set of bindings and host object.
///
/// Cloning is cheap, so one instance can be handed to every connection.
#[derive(Clone)]
pub struct EdgeService {
    server: Arc<Server>,
    env: Opaque,
    host: Opaque,
}

impl hyper::service::Service<hyper::Request<Incoming>> for EdgeService {
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn call(&self, request: hyper::Request<Incoming>) -> Self::Future {
        let EdgeService { server, env, host } = self.clone();
        Box::pin(async move { Ok(server.handle(request, env, host).await) })
    }
}

impl fmt::Debug for EdgeService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EdgeService").field("server", &self.server).finish_non_exhaustive()
    }
}
