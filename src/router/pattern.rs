//! URL pattern compilation.
//!
//! Patterns use the `/literal/:name` dialect; `{name}` is accepted as an alias for `:name`.
//! A parameter always spans a whole path segment. Compilation produces an anchored,
//! case-insensitive regex with one capture group per parameter, and tolerates a single
//! trailing slash on the request path.

use std::sync::Arc;

use regex::Regex;

use super::core::Params;
use crate::error::RegistrationError;

/// A compiled URL pattern plus its ordered parameter names.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
    param_names: Vec<Arc<str>>,
}

fn invalid(pattern: &str, reason: impl Into<String>) -> RegistrationError {
    RegistrationError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.into(),
    }
}

fn is_param_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Extract the parameter name from a `:name` or `{name}` segment.
///
/// Returns `Ok(None)` for literal segments.
fn segment_param<'a>(pattern: &str, segment: &'a str) -> Result<Option<&'a str>, RegistrationError> {
    let name = if let Some(name) = segment.strip_prefix(':') {
        name
    } else if let Some(inner) = segment.strip_prefix('{') {
        inner
            .strip_suffix('}')
            .ok_or_else(|| invalid(pattern, format!("unclosed '{{' in segment '{segment}'")))?
    } else if segment.contains([':', '{', '}']) {
        return Err(invalid(
            pattern,
            format!("parameter must span a whole segment, found '{segment}'"),
        ));
    } else if segment.contains(['*', '(', ')', '?', '+']) {
        return Err(invalid(
            pattern,
            format!("unsupported modifier in segment '{segment}'"),
        ));
    } else {
        return Ok(None);
    };

    if name.is_empty() {
        return Err(invalid(pattern, "empty parameter name"));
    }
    if !name.chars().all(is_param_char) {
        return Err(invalid(pattern, format!("invalid parameter name '{name}'")));
    }
    Ok(Some(name))
}

impl PathPattern {
    /// Compile a pattern such as `/users/:id/posts/{post_id}`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidPattern`] when the pattern does not start with `/`,
    /// names a parameter badly, repeats a parameter name, or uses unsupported modifiers.
    pub fn compile(pattern: &str) -> Result<Self, RegistrationError> {
        let rest = pattern
            .strip_prefix('/')
            .ok_or_else(|| invalid(pattern, "pattern must start with '/'"))?;
        let rest = rest.strip_suffix('/').unwrap_or(rest);

        let mut regex_src = String::with_capacity(pattern.len() + 16);
        regex_src.push_str("(?i)^");
        let mut param_names: Vec<Arc<str>> = Vec::with_capacity(pattern.matches([':', '{']).count());

        if !rest.is_empty() {
            for segment in rest.split('/') {
                regex_src.push('/');
                match segment_param(pattern, segment)? {
                    Some(name) => {
                        if param_names.iter().any(|existing| existing.as_ref() == name) {
                            return Err(invalid(
                                pattern,
                                format!("duplicate parameter name '{name}'"),
                            ));
                        }
                        regex_src.push_str("([^/]+?)");
                        param_names.push(Arc::from(name));
                    }
                    None => regex_src.push_str(&regex::escape(segment)),
                }
            }
        }

        regex_src.push_str("/?$");
        let regex = Regex::new(&regex_src).map_err(|e| invalid(pattern, e.to_string()))?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
            param_names,
        })
    }

    /// The pattern string as registered.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Parameter names in capture-group order.
    #[must_use]
    pub fn param_names(&self) -> &[Arc<str>] {
        &self.param_names
    }

    /// Test whether `path` matches without extracting parameters.
    #[must_use]
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Match `path` and return percent-decoded parameters, or `None` when it does not match.
    ///
    /// A capture that does not decode to valid UTF-8 is kept verbatim.
    #[must_use]
    pub fn captures(&self, path: &str) -> Option<Params> {
        let caps = self.regex.captures(path)?;
        let mut params = Params::new();
        for (name, cap) in self.param_names.iter().zip(caps.iter().skip(1)) {
            let raw = cap.map(|m| m.as_str()).unwrap_or_default();
            let value = match urlencoding::decode(raw) {
                Ok(decoded) => decoded.into_owned(),
                Err(_) => raw.to_string(),
            };
            params.push(Arc::clone(name), value);
        }
        Some(params)
    }
}
