//! Replies and their conversion into transport responses.
//!
//! A [`Reply`] is the logical result of a request: a status, an optional JSON
//! body and any extra headers. Handlers and middleware return one; the
//! dispatcher keeps the latest and serializes it exactly once, at the very end
//! of the pipeline.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::StatusCode;
use http_body_util::Full;
use serde_json::{Value, json};

use crate::error::Error;

/// The transport response the dispatcher produces.
pub type Response = http::Response<Full<Bytes>>;

/// A status + body result.
///
/// # Shortcuts
///
/// ```rust
/// use vesta::Reply;
/// use serde_json::json;
///
/// Reply::ok().json(json!({"id": 1}));
/// Reply::bad_request().message("missing title");
/// Reply::no_content();
/// Reply::created().header("location", "/books/42");
/// ```
#[derive(Clone, Debug)]
pub struct Reply {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Option<Value>,
    sent: bool,
}

impl Reply {
    /// A reply with `status` and no body.
    pub fn new(status: StatusCode) -> Self {
        Self { status, headers: Vec::new(), body: None, sent: true }
    }

    /// The placeholder every request starts with.
    pub(crate) fn pending() -> Self {
        Self { sent: false, ..Self::new(StatusCode::OK) }
    }

    pub fn ok() -> Self { Self::new(StatusCode::OK) }
    pub fn created() -> Self { Self::new(StatusCode::CREATED) }
    pub fn accepted() -> Self { Self::new(StatusCode::ACCEPTED) }
    pub fn no_content() -> Self { Self::new(StatusCode::NO_CONTENT) }
    pub fn bad_request() -> Self { Self::new(StatusCode::BAD_REQUEST) }
    pub fn unauthorized() -> Self { Self::new(StatusCode::UNAUTHORIZED) }
    pub fn forbidden() -> Self { Self::new(StatusCode::FORBIDDEN) }
    pub fn not_found() -> Self { Self::new(StatusCode::NOT_FOUND) }
    pub fn conflict() -> Self { Self::new(StatusCode::CONFLICT) }
    pub fn unprocessable_entity() -> Self { Self::new(StatusCode::UNPROCESSABLE_ENTITY) }
    pub fn too_many_requests() -> Self { Self::new(StatusCode::TOO_MANY_REQUESTS) }
    pub fn internal_server_error() -> Self { Self::new(StatusCode::INTERNAL_SERVER_ERROR) }

    /// Sets a JSON body.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets a `{"message": ...}` body.
    pub fn message(self, message: impl Into<String>) -> Self {
        self.json(json!({ "message": message.into() }))
    }

    /// Appends a response header. Names and values are checked when the reply
    /// is converted, not here.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn body(&self) -> Option<&Value> { self.body.as_ref() }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }

    /// Whether a handler or middleware has produced this reply.
    pub fn is_sent(&self) -> bool { self.sent }

    /// Converts the reply into a transport response.
    ///
    /// An unsent reply becomes an empty response with `default_status`. A body
    /// is serialized as JSON with `content-type: application/json`.
    pub fn to_response(&self, default_status: StatusCode) -> Result<Response, Error> {
        if !self.sent {
            return Ok(http::Response::builder().status(default_status).body(Full::default())?);
        }

        let mut builder = http::Response::builder().status(self.status);
        let body = match &self.body {
            Some(value) => {
                builder = builder.header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                Bytes::from(serde_json::to_vec(value)?)
            }
            None => Bytes::new(),
        };
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::Header(e.to_string()))?;
            let value = HeaderValue::from_str(value).map_err(|e| Error::Header(e.to_string()))?;
            builder = builder.header(name, value);
        }
        Ok(builder.body(Full::new(body))?)
    }
}

// ── IntoReply ─────────────────────────────────────────────────────────────────

/// Conversion into a [`Reply`], used for handler return values.
///
/// Implement on your own types to return them directly from handlers.
pub trait IntoReply {
    fn into_reply(self) -> Result<Reply, Error>;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Result<Reply, Error> { Ok(self) }
}

/// Return a bare status from a handler: `return StatusCode::NO_CONTENT`
impl IntoReply for StatusCode {
    fn into_reply(self) -> Result<Reply, Error> { Ok(Reply::new(self)) }
}

/// No reply: the response falls back to the configured default status unless
/// after-middleware replies.
impl IntoReply for () {
    fn into_reply(self) -> Result<Reply, Error> { Ok(Reply::pending()) }
}

/// `200 OK` with the value as body.
impl IntoReply for Value {
    fn into_reply(self) -> Result<Reply, Error> { Ok(Reply::ok().json(self)) }
}

impl<T, E> IntoReply for Result<T, E>
where
    T: IntoReply,
    E: Into<Error>,
{
    fn into_reply(self) -> Result<Reply, Error> {
        self.map_err(Into::into)?.into_reply()
    }
}
