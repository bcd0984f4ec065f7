//! Layer core - the per-request matching hot path.
//!
//! A [`Layer`] is immutable once registered. Matching returns the extracted parameters by
//! value, so one layer can be matched by any number of in-flight requests at once.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::Method;
use smallvec::SmallVec;
use tracing::trace;

use super::pattern::PathPattern;
use crate::error::RegistrationError;
use crate::middleware::Middleware;

/// Maximum number of path parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage.
///
/// Names are `Arc<str>` shared with the compiled pattern; values are per-request.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Path parameters bound by a successful match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(ParamVec);

impl Params {
    /// Create an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self(ParamVec::new())
    }

    pub(crate) fn push(&mut self, name: Arc<str>, value: String) {
        self.0.push((name, value));
    }

    /// Get a parameter by name.
    ///
    /// Uses "last write wins" semantics should a name ever appear twice.
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(name, value)` pairs in pattern order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_ref(), v.as_str()))
    }

    /// Copy into a `HashMap`.
    /// Note: This allocates - use `get()` on the hot path.
    #[must_use]
    pub fn to_map(&self) -> HashMap<String, String> {
        self.0
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

/// A registered unit of the dispatch chain.
///
/// Pairs an optional method filter and an optional URL pattern with a handler. A layer with
/// neither matches every request.
#[derive(Clone)]
pub struct Layer {
    method: Option<Method>,
    pattern: Option<PathPattern>,
    handler: Arc<dyn Middleware>,
}

impl Layer {
    /// Build a layer, compiling `pattern` immediately.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidPattern`] when the pattern does not compile, so a
    /// malformed route fails at registration rather than on the first request.
    pub fn new(
        method: Option<Method>,
        pattern: Option<&str>,
        handler: Arc<dyn Middleware>,
    ) -> Result<Self, RegistrationError> {
        let pattern = pattern.map(PathPattern::compile).transpose()?;
        Ok(Self {
            method,
            pattern,
            handler,
        })
    }

    /// Build a method-less, path-less layer.
    #[must_use]
    pub fn middleware(handler: Arc<dyn Middleware>) -> Self {
        Self {
            method: None,
            pattern: None,
            handler,
        }
    }

    #[must_use]
    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    #[must_use]
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_ref().map(PathPattern::as_str)
    }

    /// Declared parameter names; empty when the layer has no pattern.
    #[must_use]
    pub fn param_names(&self) -> &[Arc<str>] {
        self.pattern
            .as_ref()
            .map(PathPattern::param_names)
            .unwrap_or_default()
    }

    /// True when the layer has neither a method filter nor a pattern.
    #[must_use]
    pub fn is_middleware(&self) -> bool {
        self.method.is_none() && self.pattern.is_none()
    }

    /// Decide whether this layer applies to `method` + `path`.
    ///
    /// The method filter is checked first so a method mismatch never evaluates the regex.
    /// Returns the decoded parameters on a match (empty for path-less layers).
    #[must_use]
    pub fn matches(&self, method: &Method, path: &str) -> Option<Params> {
        if let Some(filter) = &self.method {
            if filter != method {
                trace!(layer = %self, method = %method, "Method filter rejected request");
                return None;
            }
        }

        match &self.pattern {
            None => Some(Params::new()),
            Some(pattern) => pattern.captures(path),
        }
    }

    pub(crate) fn handler(&self) -> &Arc<dyn Middleware> {
        &self.handler
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.method {
            Some(method) => write!(f, "{method} ")?,
            None => f.write_str("* ")?,
        }
        match &self.pattern {
            Some(pattern) => f.write_str(pattern.as_str()),
            None => f.write_str("*"),
        }
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("method", &self.method)
            .field("pattern", &self.pattern())
            .field("param_names", &self.param_names())
            .finish_non_exhaustive()
    }
}
