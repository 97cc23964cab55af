//! Request decoding.
//!
//! [`Data`] is the structured view of an incoming request that every
//! middleware and handler reads: method, pathname, hostname, headers, cookies,
//! query parameters and the decoded body. Path parameters are empty until the
//! dispatcher has matched a route.

use std::collections::HashMap;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HOST};
use http::HeaderMap;
use http_body_util::BodyExt;
use hyper::body::Body;
use mime::Mime;
use serde_json::{Map, Value};
use url::Url;

use crate::cookies::{CookieOptions, Cookies};
use crate::error::{BoxError, Error};

/// Decoded request data.
#[derive(Clone, Debug)]
pub struct Data {
    method: String,
    pathname: String,
    hostname: String,
    headers: HeaderMap,
    cookies: Cookies,
    query: HashMap<String, String>,
    pub(crate) params: HashMap<String, String>,
    body: Option<Value>,
}

impl Data {
    /// Decodes `request`, reading its body to the end.
    ///
    /// The body is interpreted from the `content-type` media type, ignoring
    /// parameters:
    ///
    /// | media type                          | body                              |
    /// |-------------------------------------|-----------------------------------|
    /// | `application/json`                  | the parsed JSON value             |
    /// | `application/x-www-form-urlencoded` | object of percent-decoded strings |
    /// | `multipart/form-data`               | object of field strings           |
    /// | anything else, or none              | `None`                            |
    pub async fn from_request<B>(request: http::Request<B>, cookies: &CookieOptions) -> Result<Self, Error>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = request.into_parts();
        let url = request_url(&parts)?;
        let bytes = body
            .collect()
            .await
            .map_err(|e| Error::Body(e.into()))?
            .to_bytes();

        Ok(Self {
            method: parts.method.as_str().to_ascii_uppercase(),
            pathname: url.path().to_owned(),
            hostname: url.host_str().unwrap_or_default().to_ascii_lowercase(),
            cookies: Cookies::parse(&parts.headers, cookies),
            query: url.query_pairs().into_owned().collect(),
            params: HashMap::new(),
            body: decode_body(&parts.headers, bytes).await?,
            headers: parts.headers,
        })
    }

    pub fn method(&self) -> &str { &self.method }
    pub fn pathname(&self) -> &str { &self.pathname }
    pub fn hostname(&self) -> &str { &self.hostname }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn cookies(&self) -> &Cookies { &self.cookies }
    pub fn query(&self) -> &HashMap<String, String> { &self.query }
    pub fn params(&self) -> &HashMap<String, String> { &self.params }
    pub fn body(&self) -> Option<&Value> { self.body.as_ref() }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/:id`, `param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Returns a query parameter. The last occurrence of a repeated key wins.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }
}

/// Rebuilds an absolute URL from an origin-form request target and its `Host`.
fn request_url(parts: &http::request::Parts) -> Result<Url, Error> {
    if parts.uri.scheme().is_some() {
        return Ok(Url::parse(&parts.uri.to_string())?);
    }
    let host = parts
        .headers
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    let target = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
    Ok(Url::parse(&format!("http://{host}{target}"))?)
}

async fn decode_body(headers: &HeaderMap, bytes: Bytes) -> Result<Option<Value>, Error> {
    let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return Ok(None);
    };
    let Ok(media) = content_type.parse::<Mime>() else {
        return Ok(None);
    };

    let body = match media.essence_str() {
        "application/json" => serde_json::from_slice(&bytes)?,
        "application/x-www-form-urlencoded" => {
            let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(&bytes)?;
            Value::Object(pairs.into_iter().map(|(k, v)| (k, Value::String(v))).collect())
        }
        "multipart/form-data" => decode_multipart(content_type, bytes).await?,
        _ => return Ok(None),
    };
    Ok(Some(body))
}

async fn decode_multipart(content_type: &str, bytes: Bytes) -> Result<Value, Error> {
    let boundary = multer::parse_boundary(content_type)?;
    let stream = futures_util::stream::once(async move { Ok::<_, std::io::Error>(bytes) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut fields = Map::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        let content = field.bytes().await?;
        fields.insert(name, Value::String(String::from_utf8_lossy(&content).into_owned()));
    }
    Ok(Value::Object(fields))
}
