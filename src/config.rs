//! Server configuration.
//!
//! [`Config`] holds the plain-data settings and deserializes from any serde
//! format using camelCase keys:
//!
//! ```rust
//! use vesta::Config;
//!
//! let config: Config = serde_json::from_str(r#"{
//!     "prefix": "/api",
//!     "durableObject": false,
//!     "cookies": { "limit": 32 }
//! }"#).unwrap();
//! assert_eq!(config.cookies.limit, 32);
//! assert_eq!(config.default_status, 200);
//! ```
//!
//! Global middleware and the optional validator are code, so they are attached
//! on the [`Server`](crate::Server) instead.

use serde::Deserialize;

use crate::cookies::CookieOptions;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Prepended to every registered pathname.
    pub prefix: String,
    /// Run in durable-object mode: the host object handed to
    /// [`Server::handle`](crate::Server::handle) is durable-object state
    /// rather than an execution context.
    pub durable_object: bool,
    pub cookies: CookieOptions,
    /// Status of the empty response sent when nothing replied.
    pub default_status: u16,
    /// Serve the route listing at
    /// [`INTROSPECTION_PATHNAME`](crate::INTROSPECTION_PATHNAME).
    pub introspection: bool,
    /// Identifier the introspection endpoint's `entry` parameter must match.
    pub entry: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            durable_object: false,
            cookies: CookieOptions::default(),
            default_status: 200,
            introspection: false,
            entry: None,
        }
    }
}
