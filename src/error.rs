//! Unified error type.

/// Boxed error accepted from user handlers and transport bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type returned by vesta's fallible operations.
///
/// Application-level outcomes (404, 400, ...) are expressed as
/// [`Reply`](crate::Reply) values, not as `Error`s. This type surfaces
/// registration mistakes and failures inside the request pipeline; the
/// dispatcher turns every one of the latter into a bare `500`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid pathname `{0}`")]
    InvalidPathname(String),

    #[error("invalid method `{0}`")]
    InvalidMethod(String),

    #[error("invalid compatibility date `{0}`")]
    InvalidCompatibilityDate(String),

    #[error("a middleware received no handler")]
    MissingHandler,

    #[error("middleware `{middleware}` requires `{requires}` to run earlier in the chain")]
    UnmetRequirement { middleware: String, requires: String },

    #[error("failed to read request body: {0}")]
    Body(#[source] BoxError),

    #[error("invalid json body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid form body: {0}")]
    Form(#[from] serde_urlencoded::de::Error),

    #[error("invalid multipart body: {0}")]
    Multipart(#[from] multer::Error),

    #[error("invalid request url: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid response header: {0}")]
    Header(String),

    #[error("failed to build response: {0}")]
    Http(#[from] http::Error),

    #[error("extension `{0}` is missing")]
    MissingExtension(String),

    #[error("extension `{key}` has an unexpected shape: {source}")]
    Extension {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Handler(#[source] BoxError),
}

impl Error {
    /// Wraps any application error so it can be returned from a handler or
    /// middleware with `?`.
    pub fn handler(err: impl Into<BoxError>) -> Self {
        Self::Handler(err.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Handler(Box::new(e))
    }
}
