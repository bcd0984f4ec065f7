//! # minima
//!
//! **minima** is a small, coroutine-powered HTTP layer dispatcher built on `may` and
//! `may_minihttp`.
//!
//! An application is an ordered list of *layers*. Each layer has an optional HTTP method
//! filter, an optional path pattern (`/users/:id`, `/files/{name}`) and a handler. For every
//! request the dispatcher walks the list in registration order, runs the first layer that
//! matches, and hands that layer a [`Next`] continuation. The handler decides whether the
//! walk goes on (`next.advance()`), fails (`next.fail(err)`, returning `Err`, or panicking)
//! or ends right there (dropping `next`). Middleware and routes are the same thing: a
//! middleware is just a layer with neither a method nor a pattern.
//!
//! ## Architecture
//!
//! - **[`router`]** - Path pattern compilation and per-layer matching
//! - **[`dispatcher`]** - Layer registration and the per-request dispatch chain
//! - **[`middleware`]** - The handler trait plus reusable middleware (CORS)
//! - **[`server`]** - Request/response types and the `may_minihttp` transport
//! - **[`logging`]** - `tracing` subscriber setup
//! - **[`runtime_config`]** - Coroutine runtime settings from the environment
//!
//! ### Request Handling Flow
//!
//! ```text
//! Client -> may_minihttp -> AppService::call
//!        -> Dispatcher::handle ──step──> Layer::matches ──invoke──> handler(req, res, next)
//!                               ^                                       |
//!                               └───────────── next.advance() ──────────┘
//!        -> completion: Ok => flush response, Err => 500 "Internal server error"
//! ```
//!
//! Every step is a separate scheduled task, so a handler never re-enters the chain on its
//! own stack and long chains do not grow the stack.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use minima::{Dispatcher, Next, Request, Response};
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut app = Dispatcher::new();
//!     app.use_fn(|req: &mut Request, _res: &mut Response, next: Next| {
//!         tracing::info!(path = %req.path, "incoming");
//!         next.advance();
//!         Ok(())
//!     });
//!     app.get("/hello/:id", |req, res, _next| {
//!         res.end(format!("Hello {}", req.params.get("id").unwrap_or_default()));
//!         Ok(())
//!     })?;
//!
//!     let server = app.listen("127.0.0.1:8080")?;
//!     server.wait_ready()?;
//!     server.join().map_err(|_| anyhow::anyhow!("server panicked"))?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod router;
pub mod runtime_config;
pub mod server;

pub use dispatcher::{Dispatcher, Next};
pub use error::{HandlerError, RegistrationError};
pub use ids::RequestId;
pub use middleware::Middleware;
pub use router::{Layer, Params};
pub use server::{Request, Response};
