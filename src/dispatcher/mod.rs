//! # Dispatcher Module
//!
//! The dispatcher owns the ordered list of layers and runs each request through it.
//!
//! ## Overview
//!
//! - Registration (`use_fn`, `add_middleware`, `route`, `get`, `post`, ...) appends layers.
//!   Insertion order is matching priority.
//! - [`Dispatcher::handle`] walks the layers for one request. The first layer that matches
//!   runs; its handler receives a [`Next`] continuation and decides whether the walk goes on.
//! - Every step is submitted to a [`Scheduler`]. The default is [`CoroutineScheduler`]
//!   (one `may` coroutine per step); [`EventLoop`] gives a deterministic single-threaded
//!   queue for tests and embedding.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use http::Method;
//! use minima::dispatcher::{Dispatcher, EventLoop};
//! use minima::{Request, Response};
//!
//! let event_loop = Arc::new(EventLoop::new());
//! let mut app = Dispatcher::with_scheduler(event_loop.clone());
//! app.get("/hello/:id", |req, res, _next| {
//!     res.end(format!("Hello {}", req.params.get("id").unwrap_or_default()));
//!     Ok(())
//! })
//! .unwrap();
//! let app = Arc::new(app);
//!
//! let body = Arc::new(Mutex::new(String::new()));
//! let sink = Arc::clone(&body);
//! app.handle(
//!     Request::new(Method::GET, "/hello/world"),
//!     Response::new(),
//!     move |_req, res, result| {
//!         assert!(result.is_ok());
//!         *sink.lock().unwrap() = res.text();
//!     },
//! );
//! event_loop.run_until_idle();
//! assert_eq!(*body.lock().unwrap(), "Hello world");
//! ```
//!
//! ## Error Handling
//!
//! A handler error (returned, passed to [`Next::fail`], or a caught panic) skips every later
//! layer and reaches the completion callback exactly once. Using a continuation twice is
//! logged and ignored.

mod chain;
mod core;
mod scheduler;

pub use chain::{Completion, Next};
pub use core::Dispatcher;
pub use scheduler::{CoroutineScheduler, EventLoop, Scheduler, Task};
