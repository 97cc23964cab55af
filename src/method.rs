//! HTTP method as a typed enum.
//!
//! Covers the nine RFC 9110 methods a route can be registered for, plus the
//! [`Method::All`] wildcard that matches any of them. Request methods outside
//! this set never match a route.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A routable HTTP method.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
    Connect,
    /// Matches every method.
    All,
}

impl Method {
    /// The concrete methods, in the order documentation tools list them.
    pub const CONCRETE: [Method; 9] = [
        Self::Get,
        Self::Put,
        Self::Post,
        Self::Delete,
        Self::Options,
        Self::Head,
        Self::Patch,
        Self::Trace,
        Self::Connect,
    ];

    /// Returns the uppercase wire representation (e.g. `"GET"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get     => "GET",
            Self::Put     => "PUT",
            Self::Post    => "POST",
            Self::Delete  => "DELETE",
            Self::Options => "OPTIONS",
            Self::Head    => "HEAD",
            Self::Patch   => "PATCH",
            Self::Trace   => "TRACE",
            Self::Connect => "CONNECT",
            Self::All     => "ALL",
        }
    }

    /// Whether a route registered for `self` accepts a request made with
    /// `requested`.
    pub fn accepts(self, requested: Method) -> bool {
        self == Self::All || self == requested
    }
}

/// Parses an uppercase method string (e.g. `"GET"`). Case-sensitive per RFC 9110 §9.1.
impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET"     => Ok(Self::Get),
            "PUT"     => Ok(Self::Put),
            "POST"    => Ok(Self::Post),
            "DELETE"  => Ok(Self::Delete),
            "OPTIONS" => Ok(Self::Options),
            "HEAD"    => Ok(Self::Head),
            "PATCH"   => Ok(Self::Patch),
            "TRACE"   => Ok(Self::Trace),
            "CONNECT" => Ok(Self::Connect),
            "ALL"     => Ok(Self::All),
            _         => Err(Error::InvalidMethod(s.to_owned())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
