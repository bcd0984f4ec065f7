//! Request identifiers.
//!
//! Every request gets a ULID. An inbound `x-request-id` that is itself a ULID is adopted so
//! a request can be followed across services; anything else is replaced with a fresh id.

use std::fmt;
use std::str::FromStr;

use ulid::Ulid;

/// Header carrying the id between hops.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// ULID identifying one request through the dispatch chain and its log lines.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(Ulid);

impl RequestId {
    /// A fresh id. Ids from different milliseconds sort by creation time.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    /// Adopt the inbound header value when it parses, otherwise generate.
    #[must_use]
    pub fn inherit(header: Option<&str>) -> Self {
        match header.map(str::parse::<Self>) {
            Some(Ok(id)) => id,
            Some(Err(err)) => {
                tracing::debug!(error = %err, "Ignoring malformed {REQUEST_ID_HEADER}");
                Self::generate()
            }
            None => Self::generate(),
        }
    }

    /// Creation time in milliseconds since the Unix epoch.
    #[must_use]
    pub fn timestamp_ms(&self) -> u64 {
        self.0.timestamp_ms()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", self.0)
    }
}

impl FromStr for RequestId {
    type Err = ulid::DecodeError;

    /// Surrounding whitespace is tolerated; header values often carry some.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s.trim()).map(Self)
    }
}
