//! Request validation hook.
//!
//! The engine does not interpret schema descriptors. A [`Validator`] installed
//! on the server does: after a route is matched and its path parameters are
//! attached, each declared descriptor is checked against the matching part of
//! the request.

use std::collections::HashMap;

use serde_json::Value;

use crate::event::Event;
use crate::reply::Reply;
use crate::router::Schemas;

/// Checks a request part against an opaque schema descriptor.
pub trait Validator: Send + Sync + 'static {
    /// Returns a human-readable reason when `value` does not satisfy `schema`.
    fn validate(&self, schema: &Value, value: &Value) -> Result<(), String>;
}

impl<F> Validator for F
where
    F: Fn(&Value, &Value) -> Result<(), String> + Send + Sync + 'static,
{
    fn validate(&self, schema: &Value, value: &Value) -> Result<(), String> {
        self(schema, value)
    }
}

/// Validates the declared parts of `event`, body first, then params, then
/// query. The first failure becomes a `400` reply.
pub(crate) fn check(validator: &dyn Validator, schemas: &Schemas, event: &Event) -> Option<Reply> {
    let parts = [
        ("body", schemas.body.as_ref(), event.body().cloned().unwrap_or(Value::Null)),
        ("params", schemas.params.as_ref(), object(event.params())),
        ("query", schemas.query.as_ref(), object(event.query())),
    ];

    parts.into_iter().find_map(|(part, schema, value)| {
        let reason = validator.validate(schema?, &value).err()?;
        Some(Reply::bad_request().message(format!("Invalid {part}: {reason}")))
    })
}

fn object(map: &HashMap<String, String>) -> Value {
    Value::Object(map.iter().map(|(k, v)| (k.clone(), Value::String(v.clone()))).collect())
}
