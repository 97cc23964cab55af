//! Route registry.
//!
//! Routes are registered during startup and matched per request on
//! `(pathname, method, compatibility date)`. Several routes may share a
//! pathname and method as long as their compatibility dates differ; the
//! registry picks the one with the latest date not after the request's.
//!
//! # Lifecycle
//!
//! Registration takes `&mut Router`, matching takes `&Router`, so the borrow
//! checker keeps the two phases apart. The date-ordered index is built lazily
//! by [`Router::init`] on first use and discarded by the next registration.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

use crate::date::{self, CompatibilityDate};
use crate::error::Error;
use crate::event::Event;
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::middleware::{Middleware, Replies};
use crate::pattern::Pattern;
use crate::reply::Reply;

/// Opaque validation descriptors for the parts of a request.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Schemas {
    pub body: Option<Value>,
    pub params: Option<Value>,
    pub query: Option<Value>,
}

impl Schemas {
    pub fn is_empty(&self) -> bool {
        self.body.is_none() && self.params.is_none() && self.query.is_none()
    }
}

/// Everything a route is registered with, apart from its handler.
///
/// ```rust
/// use vesta::{Method, RouteOptions};
///
/// let options = RouteOptions::new()
///     .method(Method::Get)
///     .pathname("/books/:bookId")
///     .compatibility_date("2024-01-01");
/// ```
#[derive(Clone, Debug, Default)]
pub struct RouteOptions {
    name: Option<String>,
    method: Option<String>,
    pathname: Option<String>,
    compatibility_date: Option<String>,
    before: Vec<Middleware>,
    after: Vec<Middleware>,
    replies: Replies,
    schemas: Schemas,
}

impl RouteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Accepts a [`Method`] or its wire name. Unknown names are rejected at
    /// registration. Defaults to [`Method::All`].
    pub fn method(mut self, method: impl ToString) -> Self {
        self.method = Some(method.to_string());
        self
    }

    /// Defaults to `*`. The router prefix is prepended.
    pub fn pathname(mut self, pathname: impl Into<String>) -> Self {
        self.pathname = Some(pathname.into());
        self
    }

    pub fn compatibility_date(mut self, date: impl Into<String>) -> Self {
        self.compatibility_date = Some(date.into());
        self
    }

    pub fn before(mut self, middleware: impl IntoIterator<Item = Middleware>) -> Self {
        self.before.extend(middleware);
        self
    }

    pub fn after(mut self, middleware: impl IntoIterator<Item = Middleware>) -> Self {
        self.after.extend(middleware);
        self
    }

    pub fn reply(mut self, status: u16, descriptor: Value) -> Self {
        self.replies.insert(status, descriptor);
        self
    }

    pub fn body(mut self, schema: Value) -> Self {
        self.schemas.body = Some(schema);
        self
    }

    pub fn params(mut self, schema: Value) -> Self {
        self.schemas.params = Some(schema);
        self
    }

    pub fn query(mut self, schema: Value) -> Self {
        self.schemas.query = Some(schema);
        self
    }
}

/// A registered endpoint.
pub struct Route {
    name: String,
    method: Method,
    pattern: Pattern,
    compatibility_date: Option<CompatibilityDate>,
    before: Vec<Middleware>,
    after: Vec<Middleware>,
    replies: Replies,
    schemas: Schemas,
    handler: BoxedHandler,
}

impl Route {
    pub fn name(&self) -> &str { &self.name }
    pub fn method(&self) -> Method { self.method }
    pub fn pathname(&self) -> &str { self.pattern.as_str() }
    pub fn pattern(&self) -> &Pattern { &self.pattern }
    pub fn compatibility_date(&self) -> Option<CompatibilityDate> { self.compatibility_date }
    pub fn before(&self) -> &[Middleware] { &self.before }
    pub fn after(&self) -> &[Middleware] { &self.after }
    pub fn replies(&self) -> &Replies { &self.replies }
    pub fn schemas(&self) -> &Schemas { &self.schemas }

    pub(crate) async fn call(&self, event: Arc<Event>) -> Result<Reply, Error> {
        self.handler.call(event).await
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("pathname", &self.pattern.as_str())
            .field("compatibility_date", &self.compatibility_date)
            .finish_non_exhaustive()
    }
}

/// The route registry.
#[derive(Default)]
pub struct Router {
    prefix: String,
    routes: Vec<Arc<Route>>,
    index: OnceLock<Vec<Arc<Route>>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// A router that prepends `prefix` to every registered pathname.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), ..Self::default() }
    }

    /// Registers a route.
    ///
    /// An invalid pathname, method or compatibility date is logged and the
    /// route is dropped; registration never fails the caller.
    pub fn register(&mut self, options: RouteOptions, handler: impl Handler) {
        let pathname = format!("{}{}", self.prefix, options.pathname.as_deref().unwrap_or("*"));
        let method = options.method.clone().unwrap_or_else(|| Method::All.to_string());
        let name = options.name.clone().unwrap_or_else(|| match &options.compatibility_date {
            Some(date) => format!("{method} {pathname} ({date})"),
            None => format!("{method} {pathname}"),
        });

        match build_route(name.clone(), &method, &pathname, options, handler.into_boxed_handler()) {
            Ok(route) => {
                debug!(route = %name, "route registered");
                self.routes.push(Arc::new(route));
                self.index = OnceLock::new();
            }
            Err(e) => error!(route = %name, error = %e, "failed to set up route, it will not be served"),
        }
    }

    /// Builds the date-ordered index if registration changed it since the last
    /// call, and returns it.
    ///
    /// Within each `(pathname, method)` group routes are ordered newest date
    /// first, undated last, registration order among equals. Routes of
    /// different groups keep their registration positions.
    pub fn init(&self) -> &[Arc<Route>] {
        self.index.get_or_init(|| order_by_date(&self.routes))
    }

    /// Whether the index is built and current.
    pub fn is_ready(&self) -> bool {
        self.index.get().is_some()
    }

    /// Routes in match order.
    pub fn routes(&self) -> &[Arc<Route>] {
        self.init()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Finds the route serving `(pathname, method, date)`.
    ///
    /// A query string on `pathname` is ignored. With `ignore_date` the first
    /// pathname and method match wins regardless of dates.
    pub fn find(
        &self,
        pathname: &str,
        method: Method,
        date: Option<CompatibilityDate>,
        ignore_date: bool,
    ) -> Option<&Arc<Route>> {
        let pathname = pathname.split('?').next().unwrap_or_default();
        self.init().iter().find(|route| {
            route.pattern.matches(pathname)
                && route.method.accepts(method)
                && (ignore_date || date::serves(date, route.compatibility_date))
        })
    }

    /// For every distinct `(pathname, method)` pair, the route that would serve
    /// a request dated `date`.
    pub fn resolve_all(&self, date: CompatibilityDate) -> Vec<&Arc<Route>> {
        let mut seen = HashSet::new();
        self.init()
            .iter()
            .filter(|route| date::serves(Some(date), route.compatibility_date))
            .filter(|route| seen.insert((route.pattern.as_str(), route.method)))
            .collect()
    }
}

fn build_route(
    name: String,
    method: &str,
    pathname: &str,
    options: RouteOptions,
    handler: BoxedHandler,
) -> Result<Route, Error> {
    let pattern = Pattern::parse(pathname)?;
    let method = method.parse::<Method>()?;
    let compatibility_date = options
        .compatibility_date
        .as_deref()
        .map(str::parse::<CompatibilityDate>)
        .transpose()?;

    Ok(Route {
        name,
        method,
        pattern,
        compatibility_date,
        before: options.before,
        after: options.after,
        replies: options.replies,
        schemas: options.schemas,
        handler,
    })
}

fn order_by_date(routes: &[Arc<Route>]) -> Vec<Arc<Route>> {
    let mut groups: HashMap<(&str, Method), Vec<usize>> = HashMap::new();
    for (slot, route) in routes.iter().enumerate() {
        groups.entry((route.pattern.as_str(), route.method)).or_default().push(slot);
    }

    let mut ordered = routes.to_vec();
    for slots in groups.values().filter(|slots| slots.len() > 1) {
        let mut members: Vec<&Arc<Route>> = slots.iter().map(|&slot| &routes[slot]).collect();
        members.sort_by(|a, b| newest_first(a.compatibility_date, b.compatibility_date));
        for (&slot, route) in slots.iter().zip(members) {
            ordered[slot] = Arc::clone(route);
        }
    }
    ordered
}

fn newest_first(a: Option<CompatibilityDate>, b: Option<CompatibilityDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
