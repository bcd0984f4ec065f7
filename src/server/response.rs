use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use may_minihttp::Response as RawResponse;
use once_cell::sync::Lazy;
use tracing::{debug, warn};

use super::request::HeaderVec;

/// Outbound response built up by the dispatch chain.
///
/// The dispatcher never inspects it; handlers set the status, headers and body, and the
/// transport flushes it once the chain completes.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    headers: HeaderVec,
    body: Vec<u8>,
    finished: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    /// An empty `200 OK` response.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: HeaderVec::new(),
            body: Vec::new(),
            finished: false,
        }
    }

    /// The generic failure response sent when a chain ends in error.
    #[must_use]
    pub fn internal_server_error() -> Self {
        let mut res = Self::new();
        res.set_status(500)
            .set_header("content-type", "text/plain; charset=utf-8")
            .end("Internal server error");
        res
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn set_status(&mut self, status: u16) -> &mut Self {
        self.status = status;
        self
    }

    /// Get a header by name
    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or update a header
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        // Remove existing header with same name (case-insensitive)
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value.into()));
        self
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_ref(), v.as_str()))
    }

    /// Append to the body. Ignored once the response has been ended.
    pub fn write(&mut self, chunk: impl AsRef<[u8]>) -> &mut Self {
        if self.finished {
            debug!("Write after end ignored");
        } else {
            self.body.extend_from_slice(chunk.as_ref());
        }
        self
    }

    /// Append a final chunk and mark the response finished.
    pub fn end(&mut self, chunk: impl AsRef<[u8]>) {
        self.write(chunk);
        self.finished = true;
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body as text, replacing invalid UTF-8.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Canonical reason phrase for a status code.
pub(crate) fn status_reason(status: u16) -> &'static str {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
}

/// Upper bound on distinct header lines kept for the life of the process.
pub const MAX_INTERNED_HEADER_LINES: usize = 4096;

/// may_minihttp only accepts `'static` header lines. Each distinct line is leaked once and
/// reused, up to `cap` lines; past that, unseen lines are refused instead of leaked.
struct HeaderLineTable {
    lines: HashSet<&'static str>,
    cap: usize,
}

impl HeaderLineTable {
    fn with_cap(cap: usize) -> Self {
        Self {
            lines: HashSet::new(),
            cap,
        }
    }

    fn intern(&mut self, name: &str, value: &str) -> Option<&'static str> {
        let line = format!("{name}: {value}");
        if let Some(existing) = self.lines.get(line.as_str()) {
            return Some(*existing);
        }
        if self.lines.len() >= self.cap {
            return None;
        }
        let leaked: &'static str = Box::leak(line.into_boxed_str());
        self.lines.insert(leaked);
        Some(leaked)
    }

    fn len(&self) -> usize {
        self.lines.len()
    }
}

static HEADER_LINES: Lazy<Mutex<HeaderLineTable>> =
    Lazy::new(|| Mutex::new(HeaderLineTable::with_cap(MAX_INTERNED_HEADER_LINES)));

fn intern_header_line(name: &str, value: &str) -> Option<&'static str> {
    HEADER_LINES
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .intern(name, value)
}

/// Copy a finished [`Response`] onto the wire.
///
/// `content-length` is computed by may_minihttp, so a handler-supplied one is skipped. A
/// non-empty body without a content type is labelled `text/plain`. Once
/// [`MAX_INTERNED_HEADER_LINES`] distinct lines have been sent, a header line never seen
/// before is dropped with a warning; per-request values belong in the body.
pub fn write_response(out: &mut RawResponse, res: Response) {
    out.status_code(res.status as usize, status_reason(res.status));
    for (name, value) in res.headers() {
        if name.eq_ignore_ascii_case("content-length") {
            continue;
        }
        match intern_header_line(name, value) {
            Some(line) => {
                out.header(line);
            }
            None => warn!(header = name, "Header line table full; header not sent"),
        }
    }
    if res.header("content-type").is_none() && !res.body.is_empty() {
        out.header("Content-Type: text/plain; charset=utf-8");
    }
    out.body_vec(res.body);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_reason() {
        assert_eq!(status_reason(200), "OK");
        assert_eq!(status_reason(404), "Not Found");
        assert_eq!(status_reason(500), "Internal Server Error");
        assert_eq!(status_reason(799), "Unknown");
    }

    #[test]
    fn test_set_header_replaces_case_insensitively() {
        let mut res = Response::new();
        res.set_header("X-Test", "a").set_header("x-test", "b");
        assert_eq!(res.header("X-TEST"), Some("b"));
        assert_eq!(res.headers().count(), 1);
    }

    #[test]
    fn test_writes_after_end_are_ignored() {
        let mut res = Response::new();
        res.write("Hello ");
        res.end("world");
        res.write("!");
        assert!(res.is_finished());
        assert_eq!(res.text(), "Hello world");
    }

    #[test]
    fn test_internal_server_error() {
        let res = Response::internal_server_error();
        assert_eq!(res.status(), 500);
        assert_eq!(res.text(), "Internal server error");
    }

    #[test]
    fn test_header_lines_are_interned() {
        let a = intern_header_line("x-a", "1").unwrap();
        let b = intern_header_line("x-a", "1").unwrap();
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn test_header_line_table_stays_bounded() {
        let mut table = HeaderLineTable::with_cap(8);
        for i in 0..100 {
            let _ = table.intern("x-request-id", &i.to_string());
        }
        assert_eq!(table.len(), 8);
        // Lines already in the table keep resolving once it is full.
        assert_eq!(table.intern("x-request-id", "3"), Some("x-request-id: 3"));
        assert_eq!(table.intern("x-request-id", "99"), None);
        assert_eq!(table.len(), 8);
    }
}
