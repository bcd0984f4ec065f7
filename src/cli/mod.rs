//! # CLI Module
//!
//! Command-line entry point for the `minima` binary, which serves a small demo application.
//!
//! ## Demo Application
//!
//! | Layer | Behaviour |
//! |---|---|
//! | `* *` | Logs the request and sets `x-powered-by: minima`, then continues |
//! | `GET /hello/:id` | Responds `Hello <id>` |
//! | `GET /bye/:id` | Responds `Bye <id>` |
//!
//! Requests no layer answers get the untouched default response (`200`, empty body).
//!
//! ## Examples
//!
//! ```bash
//! minima --addr 127.0.0.1:3000 --log-format pretty
//! curl http://127.0.0.1:3000/hello/world   # Hello world
//!
//! # List the demo layers without serving
//! minima --routes
//! ```
//!
//! ## Usage from Code
//!
//! ```rust,ignore
//! use clap::Parser;
//! use minima::cli::{run_cli, Cli};
//!
//! run_cli(Cli::parse())?;
//! ```

mod commands;


pub use commands::{build_demo_app, run_cli, Cli};
