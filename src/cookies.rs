//! Request cookies.

use std::collections::HashMap;

use http::HeaderMap;
use http::header::COOKIE;
use serde::Deserialize;

/// Cookie parsing options.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CookieOptions {
    /// Maximum number of cookies kept per request. Extra pairs are dropped.
    pub limit: usize,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self { limit: 64 }
    }
}

/// Cookies sent with a request, keyed by name.
#[derive(Clone, Debug, Default)]
pub struct Cookies {
    cookies: HashMap<String, String>,
}

impl Cookies {
    /// Parses every `Cookie` header in `headers`.
    ///
    /// Pairs without `=` are skipped, surrounding quotes are stripped and the
    /// first occurrence of a name wins. Parsing stops after
    /// [`CookieOptions::limit`] cookies.
    pub fn parse(headers: &HeaderMap, options: &CookieOptions) -> Self {
        let mut cookies = HashMap::new();
        let pairs = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.split_once('='));

        for (name, value) in pairs {
            if cookies.len() >= options.limit {
                break;
            }
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let value = value.trim().trim_matches('"');
            cookies.entry(name.to_owned()).or_insert_with(|| value.to_owned());
        }
        Self { cookies }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.cookies.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cookies.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(values: &[&'static str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for value in values {
            headers.append(COOKIE, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn parses_pairs_across_headers() {
        let cookies = Cookies::parse(
            &headers(&["session=abc123; theme=\"dark\"", "lang=en"]),
            &CookieOptions::default(),
        );
        assert_eq!(cookies.len(), 3);
        assert_eq!(cookies.get("session"), Some("abc123"));
        assert_eq!(cookies.get("theme"), Some("dark"));
        assert_eq!(cookies.get("lang"), Some("en"));
    }

    #[test]
    fn skips_malformed_pairs_and_keeps_first_duplicate() {
        let cookies = Cookies::parse(&headers(&["flag; a=1; =x; a=2"]), &CookieOptions::default());
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies.get("a"), Some("1"));
    }

    #[test]
    fn honours_the_limit() {
        let cookies = Cookies::parse(&headers(&["a=1; b=2; c=3"]), &CookieOptions { limit: 2 });
        assert_eq!(cookies.len(), 2);
        assert!(cookies.contains("a"));
        assert!(cookies.contains("b"));
        assert!(!cookies.contains("c"));
    }

    #[test]
    fn missing_header_is_empty() {
        assert!(Cookies::parse(&HeaderMap::new(), &CookieOptions::default()).is_empty());
    }
}
