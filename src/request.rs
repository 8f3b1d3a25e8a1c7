//! Request and response values crossing the interception boundary
//!
//! Bodies are `Bytes`, so a response can be handed to the caller and
//! written to the cache without a second read of the payload.

use crate::error::{StowawayError, StowawayResult};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;

/// The only method the worker treats as a retrieval request
pub const METHOD_GET: &str = "GET";

/// Normalized request identity used as the cache key
///
/// The URL is stored without its fragment, which never reaches the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
}

impl RequestKey {
    /// Build a key from a method and URL
    pub fn new(method: &str, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self {
            method: method.to_ascii_uppercase(),
            url: url.to_string(),
        }
    }

    /// Key for a GET of the given URL
    pub fn get(url: &Url) -> Self {
        Self::new(METHOD_GET, url)
    }

    /// Stable SHA-256 digest of the key, hex encoded
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.method.as_bytes());
        hasher.update(b" ");
        hasher.update(self.url.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// An intercepted outbound request
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Request {
    /// Create a request with no headers and an empty body
    pub fn new(method: &str, url: Url) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            url,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Create a GET request
    pub fn get(url: Url) -> Self {
        Self::new(METHOD_GET, url)
    }

    /// Add a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the body
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Case-insensitive header lookup (first match)
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// The cache identity of this request
    pub fn key(&self) -> RequestKey {
        RequestKey::new(&self.method, &self.url)
    }

    /// Whether this is a safe read the worker may answer from cache
    pub fn is_retrieval(&self) -> bool {
        self.method == METHOD_GET
    }

    /// Whether the client negotiates for an HTML document
    pub fn accepts_html(&self) -> bool {
        self.header("accept")
            .is_some_and(|accept| accept.contains("text/html"))
    }

    /// Whether the request targets the same origin as `origin`
    pub fn is_same_origin(&self, origin: &Url) -> bool {
        self.url.origin() == origin.origin()
    }
}

/// Response snapshot returned to the caller and stored in the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    /// Create a response with no headers and an empty body
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Add a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the body
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup (first match)
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Parse an absolute URL
pub fn parse_url(raw: &str) -> StowawayResult<Url> {
    Url::parse(raw).map_err(|e| StowawayError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Resolve a reference such as `./`, `/offline.html` or `icon.svg`
/// against the worker origin
pub fn resolve(origin: &Url, reference: &str) -> StowawayResult<Url> {
    origin.join(reference).map_err(|e| StowawayError::InvalidUrl {
        url: reference.to_string(),
        reason: e.to_string(),
    })
}
