//! Error types surfaced by registration and dispatch.
//!
//! Registration errors are returned synchronously from the registration call that caused
//! them and never affect layers registered earlier. Dispatch errors travel through the
//! chain and reach the completion callback exactly once.

use std::fmt;

/// Error returned by `Dispatcher::route` and the verb shorthands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// The URL pattern could not be compiled into a matcher.
    InvalidPattern {
        /// The pattern as supplied at registration
        pattern: String,
        /// Why compilation failed
        reason: String,
    },
    /// The method filter is not a valid HTTP method token.
    InvalidMethod {
        /// The rejected method string
        method: String,
    },
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationError::InvalidPattern { pattern, reason } => {
                write!(f, "invalid route pattern '{}': {}", pattern, reason)
            }
            RegistrationError::InvalidMethod { method } => {
                write!(f, "invalid HTTP method '{}'", method)
            }
        }
    }
}

impl std::error::Error for RegistrationError {}

/// Error raised by a handler during dispatch.
///
/// Both variants short-circuit the rest of the chain.
#[derive(Debug)]
pub enum HandlerError {
    /// Returned from a handler or passed to `Next::fail`.
    Failed(anyhow::Error),
    /// The handler panicked; the panic was caught at the dispatch boundary.
    Panicked {
        /// Panic payload rendered as text
        message: String,
    },
}

impl HandlerError {
    /// Build a `Panicked` error from a payload returned by `catch_unwind`.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "handler panicked with a non-string payload".to_string()
        };
        HandlerError::Panicked { message }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::Failed(err) => write!(f, "handler failed: {:#}", err),
            HandlerError::Panicked { message } => write!(f, "handler panicked: {}", message),
        }
    }
}

impl std::error::Error for HandlerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HandlerError::Failed(err) => Some(&**err),
            HandlerError::Panicked { .. } => None,
        }
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        HandlerError::Failed(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_error_display() {
        let err = RegistrationError::InvalidPattern {
            pattern: "/a/:".to_string(),
            reason: "empty parameter name".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid route pattern '/a/:': empty parameter name"
        );
        let err = RegistrationError::InvalidMethod {
            method: "GE T".to_string(),
        };
        assert_eq!(err.to_string(), "invalid HTTP method 'GE T'");
    }

    #[test]
    fn test_handler_error_from_panic_payloads() {
        let err = HandlerError::from_panic(Box::new("boom"));
        assert_eq!(err.to_string(), "handler panicked: boom");

        let err = HandlerError::from_panic(Box::new(String::from("kaboom")));
        assert_eq!(err.to_string(), "handler panicked: kaboom");

        let err = HandlerError::from_panic(Box::new(42u32));
        assert!(matches!(err, HandlerError::Panicked { .. }));
    }

    #[test]
    fn test_handler_error_keeps_source() {
        use std::error::Error;
        let err = HandlerError::from(anyhow::anyhow!("database down"));
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "handler failed: database down");
    }
}
