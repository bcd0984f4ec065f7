//! CORS middleware.
//!
//! Adds `access-control-allow-origin` to every response and continues the chain. Preflight
//! `OPTIONS` requests that carry `access-control-request-method` are answered directly with
//! `204 No Content` and the allowed methods, and the chain stops there.

use http::Method;
use tracing::debug;

use super::Middleware;
use crate::dispatcher::Next;
use crate::server::{Request, Response};

const DEFAULT_METHODS: &str = "GET,HEAD,PUT,PATCH,POST,DELETE";

/// Cross-origin resource sharing headers.
#[derive(Debug, Clone)]
pub struct Cors {
    allowed_origin: String,
    allowed_methods: String,
    allowed_headers: Option<String>,
    max_age: Option<u32>,
}

impl Default for Cors {
    fn default() -> Self {
        Self::new()
    }
}

impl Cors {
    /// Allow any origin with the common methods.
    #[must_use]
    pub fn new() -> Self {
        Self {
            allowed_origin: "*".to_string(),
            allowed_methods: DEFAULT_METHODS.to_string(),
            allowed_headers: None,
            max_age: None,
        }
    }

    #[must_use]
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allowed_origin = origin.into();
        self
    }

    #[must_use]
    pub fn allow_methods(mut self, methods: &[Method]) -> Self {
        self.allowed_methods = methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(",");
        self
    }

    /// Headers to allow on preflight. When unset the request's
    /// `access-control-request-headers` is reflected back.
    #[must_use]
    pub fn allow_headers(mut self, headers: impl Into<String>) -> Self {
        self.allowed_headers = Some(headers.into());
        self
    }

    #[must_use]
    pub fn max_age(mut self, seconds: u32) -> Self {
        self.max_age = Some(seconds);
        self
    }

    fn is_preflight(req: &Request) -> bool {
        req.method == Method::OPTIONS && req.header("access-control-request-method").is_some()
    }
}

impl Middleware for Cors {
    fn call(&self, req: &mut Request, res: &mut Response, next: Next) -> anyhow::Result<()> {
        res.set_header("access-control-allow-origin", self.allowed_origin.as_str());
        if self.allowed_origin != "*" {
            res.set_header("vary", "Origin");
        }

        if !Self::is_preflight(req) {
            next.advance();
            return Ok(());
        }

        debug!(request_id = %req.request_id, path = %req.path, "CORS preflight answered");
        res.set_header("access-control-allow-methods", self.allowed_methods.as_str());
        let allowed_headers = self
            .allowed_headers
            .as_deref()
            .or_else(|| req.header("access-control-request-headers"));
        if let Some(headers) = allowed_headers {
            res.set_header("access-control-allow-headers", headers);
        }
        if let Some(max_age) = self.max_age {
            res.set_header("access-control-max-age", max_age.to_string());
        }
        res.set_status(204).end("");
        Ok(())
    }
}
