//! # Router Module
//!
//! Layer matching for minima: the data structure that represents one registered
//! handler, the compiled URL patterns that decide whether it applies to a path, and the
//! path parameters extracted from a match.
//!
//! ## Matching
//!
//! A [`Layer`] is tested with [`Layer::matches`]:
//!
//! 1. A method filter, when present, must equal the request method exactly.
//! 2. A layer without a pattern matches any path.
//! 3. Otherwise the compiled [`PathPattern`] must match; captures are percent-decoded and
//!    returned as [`Params`].
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use http::Method;
//! use minima::router::Layer;
//! use minima::middleware::Middleware;
//! use minima::{Next, Request, Response};
//!
//! let handler: Arc<dyn Middleware> = Arc::new(
//!     |_req: &mut Request, _res: &mut Response, next: Next| -> anyhow::Result<()> {
//!         next.advance();
//!         Ok(())
//!     },
//! );
//! let layer = Layer::new(Some(Method::GET), Some("/hello/:id"), handler).unwrap();
//!
//! let params = layer.matches(&Method::GET, "/hello/world").unwrap();
//! assert_eq!(params.get("id"), Some("world"));
//! assert!(layer.matches(&Method::POST, "/hello/world").is_none());
//! ```
//!
//! ## Performance
//!
//! Matching is a linear walk over registered layers; there is no route-table indexing.
//! Parameters live in a `SmallVec` so routes with up to eight parameters do not allocate
//! for storage.

mod core;
mod pattern;

pub use core::{Layer, ParamVec, Params, MAX_INLINE_PARAMS};
pub use pattern::PathPattern;
