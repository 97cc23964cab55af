//! Pathname patterns.
//!
//! ```text
//! /books/:bookId        one capture, exactly two segments
//! /files/*              "/files" and anything below it
//! /api*                 any path whose first segment starts with "api"
//! *                     everything
//! ```
//!
//! Matching is segment-wise on `/`; empty segments are ignored, so trailing
//! and doubled slashes are insignificant. A `:name` capture matches exactly one
//! segment. A trailing `*` turns the last literal into a prefix match and
//! accepts any number of further segments.

use std::collections::HashMap;

use crate::error::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Capture(String),
}

/// Trailing wildcard. `prefix` is the partial literal written right before the
/// `*`, if any.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Wildcard {
    prefix: Option<String>,
}

/// A validated, compiled pathname pattern.
#[derive(Clone, Debug)]
pub struct Pattern {
    source: String,
    segments: Vec<Segment>,
    wildcard: Option<Wildcard>,
}

impl Pattern {
    /// Compiles `source`, rejecting anything the matcher cannot interpret.
    pub fn parse(source: &str) -> Result<Self, Error> {
        let invalid = || Error::InvalidPathname(source.to_owned());

        if source != "*" && !source.starts_with('/') {
            return Err(invalid());
        }
        let allowed = |c: char| c.is_ascii_alphanumeric() || "-._~%/:*".contains(c);
        if !source.chars().all(allowed) {
            return Err(invalid());
        }

        let (body, has_wildcard) = match source.strip_suffix('*') {
            Some(body) => (body, true),
            None => (source, false),
        };
        if body.contains('*') {
            return Err(invalid());
        }

        let mut parts: Vec<&str> = body.split('/').filter(|p| !p.is_empty()).collect();
        let wildcard = if has_wildcard {
            let prefix = if body.ends_with('/') || body.is_empty() {
                None
            } else {
                parts.pop().map(str::to_owned)
            };
            if prefix.as_deref().is_some_and(|p| p.contains(':')) {
                return Err(invalid());
            }
            Some(Wildcard { prefix })
        } else {
            None
        };

        let mut segments = Vec::with_capacity(parts.len());
        for part in parts {
            let segment = match part.strip_prefix(':') {
                Some(name) => {
                    let valid_name = !name.is_empty()
                        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
                    if !valid_name || segments.contains(&Segment::Capture(name.to_owned())) {
                        return Err(invalid());
                    }
                    Segment::Capture(name.to_owned())
                }
                None if part.contains(':') => return Err(invalid()),
                None => Segment::Literal(part.to_owned()),
            };
            segments.push(segment);
        }

        Ok(Self { source: source.to_owned(), segments, wildcard })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `path` matches. The query string must already be stripped.
    pub fn matches(&self, path: &str) -> bool {
        self.captures(path).is_some()
    }

    /// Matches `path` and returns the named captures.
    pub fn captures(&self, path: &str) -> Option<HashMap<String, String>> {
        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        let fixed = self.segments.len();

        match &self.wildcard {
            None if parts.len() != fixed => return None,
            Some(_) if parts.len() < fixed => return None,
            _ => {}
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(&parts) {
            match segment {
                Segment::Literal(literal) if literal != part => return None,
                Segment::Literal(_) => {}
                Segment::Capture(name) => {
                    params.insert(name.clone(), (*part).to_owned());
                }
            }
        }

        if let Some(Wildcard { prefix: Some(prefix) }) = &self.wildcard {
            if !parts.get(fixed).is_some_and(|p| p.starts_with(prefix.as_str())) {
                return None;
            }
        }
        Some(params)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}
