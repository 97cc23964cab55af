//! Route listing for documentation tooling.
//!
//! `GET /__generate_openapi__?date=2024-01-01[&entry=worker]` returns every
//! registered `(pathname, method)` pair as resolved for that date, together
//! with the opaque schema and reply descriptors. `date=today` resolves against
//! the current UTC day. Expanding `ALL` into concrete methods is left to the
//! consumer.

use std::collections::HashMap;

use http::{StatusCode, Uri};
use serde::Serialize;

use crate::config::Config;
use crate::date::CompatibilityDate;
use crate::error::Error;
use crate::middleware::{Middleware, Replies};
use crate::reply::{Reply, Response};
use crate::router::{Route, Router, Schemas};

/// The reserved pathname of the route listing.
pub const INTROSPECTION_PATHNAME: &str = "/__generate_openapi__";

#[derive(Serialize)]
struct Listing<'a> {
    date: CompatibilityDate,
    routes: Vec<RouteEntry<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RouteEntry<'a> {
    name: &'a str,
    method: &'static str,
    pathname: &'a str,
    compatibility_date: Option<CompatibilityDate>,
    schemas: &'a Schemas,
    replies: &'a Replies,
    middleware: Vec<MiddlewareEntry<'a>>,
}

#[derive(Serialize)]
struct MiddlewareEntry<'a> {
    name: &'a str,
    replies: &'a Replies,
}

impl<'a> From<&'a Route> for RouteEntry<'a> {
    fn from(route: &'a Route) -> Self {
        let named = |mw: &'a Middleware| mw.name().map(|name| MiddlewareEntry { name, replies: mw.replies() });
        Self {
            name: route.name(),
            method: route.method().as_str(),
            pathname: route.pathname(),
            compatibility_date: route.compatibility_date(),
            schemas: route.schemas(),
            replies: route.replies(),
            middleware: route.before().iter().chain(route.after()).filter_map(named).collect(),
        }
    }
}

/// Answers a listing request, or returns `None` when `uri` is not one and the
/// request should be dispatched normally.
pub(crate) fn respond(router: &Router, config: &Config, uri: &Uri) -> Result<Option<Response>, Error> {
    if uri.path() != INTROSPECTION_PATHNAME {
        return Ok(None);
    }
    let query: HashMap<String, String> = serde_urlencoded::from_str(uri.query().unwrap_or_default())?;
    let Some(requested) = query.get("date") else {
        return Ok(None);
    };
    if let (Some(entry), Some(expected)) = (query.get("entry"), config.entry.as_ref()) {
        if entry != expected {
            return Ok(None);
        }
    }

    let date = match requested.as_str() {
        "today" => CompatibilityDate::today(),
        raw => match raw.parse() {
            Ok(date) => date,
            Err(_) => {
                let reply = Reply::bad_request().message("Invalid date");
                return reply.to_response(StatusCode::OK).map(Some);
            }
        },
    };

    let routes = router.resolve_all(date).into_iter().map(|r| RouteEntry::from(&**r)).collect();
    let listing = serde_json::to_value(Listing { date, routes })?;
    Reply::ok().json(listing).to_response(StatusCode::OK).map(Some)
}
