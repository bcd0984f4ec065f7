//! # Server Module
//!
//! The transport boundary: request and response types seen by handlers, conversion from
//! and to `may_minihttp`, and the service that runs every inbound request through a
//! [`Dispatcher`](crate::dispatcher::Dispatcher).

pub mod http_server;
pub mod request;
pub mod response;
pub mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::{parse_request, HeaderVec, Request, MAX_INLINE_HEADERS};
pub use response::{write_response, Response, MAX_INTERNED_HEADER_LINES};
pub use service::{complete_response, AppService};
