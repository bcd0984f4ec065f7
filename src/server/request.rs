use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use http::Method;
use may_minihttp::Request as RawRequest;
use smallvec::SmallVec;
use tracing::debug;

use crate::ids::{RequestId, REQUEST_ID_HEADER};
use crate::router::Params;

/// Maximum number of headers before heap allocation.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Header storage (lowercase names, stack-allocated for ≤16 headers).
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// An inbound request as seen by the dispatch chain.
///
/// `params` is overwritten by the dispatcher before each handler runs with the parameters
/// bound by that handler's layer.
#[derive(Debug, Clone)]
pub struct Request {
    /// Unique request ID for tracing and correlation
    pub request_id: RequestId,
    /// HTTP method (GET, POST, etc.)
    pub method: Method,
    /// Request path without the query string
    pub path: String,
    /// Raw query string, without the leading `?`
    pub query: Option<String>,
    /// HTTP headers with lowercase names
    pub headers: HeaderVec,
    /// Request body bytes
    pub body: Vec<u8>,
    /// Path parameters bound by the layer currently running
    pub params: Params,
}

impl Request {
    /// Create a request for `method` and `url`; the query string, if any, is split off.
    #[must_use]
    pub fn new(method: Method, url: &str) -> Self {
        let (path, query) = match url.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (url, None),
        };
        let path = if path.is_empty() { "/" } else { path };
        Self {
            request_id: RequestId::generate(),
            method,
            path: path.to_string(),
            query,
            headers: HeaderVec::new(),
            body: Vec::new(),
            params: Params::new(),
        }
    }

    /// Add a header, lowercasing its name.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers
            .push((Arc::from(name.to_ascii_lowercase()), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Path plus query string, as received.
    #[must_use]
    pub fn url(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{}", self.path, q),
            None => self.path.clone(),
        }
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parse the query string into a map, URL-decoding names and values.
    /// Later duplicates overwrite earlier ones.
    #[must_use]
    pub fn query_params(&self) -> HashMap<String, String> {
        self.query
            .as_deref()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Convert a `may_minihttp::Request` into a [`Request`].
///
/// # Errors
///
/// Returns an error when the request method is not a valid HTTP token.
pub fn parse_request(req: RawRequest) -> Result<Request, http::method::InvalidMethod> {
    let method = Method::from_bytes(req.method().as_bytes())?;
    let mut request = Request::new(method, req.path());

    for h in req.headers() {
        request.headers.push((
            Arc::from(h.name.to_ascii_lowercase()),
            String::from_utf8_lossy(h.value).into_owned(),
        ));
    }
    request.request_id = RequestId::inherit(request.header(REQUEST_ID_HEADER));

    let mut body = Vec::new();
    if let Err(e) = req.body().read_to_end(&mut body) {
        debug!(request_id = %request.request_id, error = %e, "Request body read failed");
    }
    request.body = body;

    debug!(
        request_id = %request.request_id,
        method = %request.method,
        path = %request.path,
        header_count = request.headers.len(),
        body_size_bytes = request.body.len(),
        "HTTP request parsed"
    );

    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_splits_query() {
        let req = Request::new(Method::GET, "/p?x=1&y=hello%20there");
        assert_eq!(req.path, "/p");
        assert_eq!(req.query.as_deref(), Some("x=1&y=hello%20there"));
        assert_eq!(req.url(), "/p?x=1&y=hello%20there");
        let q = req.query_params();
        assert_eq!(q.get("x").map(String::as_str), Some("1"));
        assert_eq!(q.get("y").map(String::as_str), Some("hello there"));
    }

    #[test]
    fn test_empty_url_becomes_root() {
        let req = Request::new(Method::GET, "");
        assert_eq!(req.path, "/");
        assert!(req.query_params().is_empty());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = Request::new(Method::GET, "/").with_header("X-Trace", "abc");
        assert_eq!(req.header("x-trace"), Some("abc"));
        assert_eq!(req.header("X-TRACE"), Some("abc"));
        assert_eq!(req.header("missing"), None);
    }
}
