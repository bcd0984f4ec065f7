use std::fmt;
use std::io;
use std::net::ToSocketAddrs;
use std::sync::Arc;

use http::Method;
use tracing::{debug, info};

use super::chain::{Chain, Completion, Next};
use super::scheduler::{CoroutineScheduler, Scheduler};
use crate::error::{HandlerError, RegistrationError};
use crate::middleware::Middleware;
use crate::router::Layer;
use crate::server::{AppService, HttpServer, Request, Response, ServerHandle};

macro_rules! verb_shorthand {
    ($(#[$doc:meta] $name:ident => $method:expr;)*) => {
        $(
            #[$doc]
            ///
            /// # Errors
            ///
            /// Returns [`RegistrationError::InvalidPattern`] if `pattern` does not compile.
            pub fn $name<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, RegistrationError>
            where
                F: Fn(&mut Request, &mut Response, Next) -> anyhow::Result<()> + Send + Sync + 'static,
            {
                self.route_with(Some($method), Some(pattern), Arc::new(handler))
            }
        )*
    };
}

/// Ordered list of layers plus the scheduler that runs their steps.
///
/// Layers are appended during registration (`&mut self`) and never removed. Handling a
/// request requires the dispatcher to be shared behind an `Arc`, after which it is
/// read-only; all per-request state lives in the chain created by [`Dispatcher::handle`].
pub struct Dispatcher {
    layers: Vec<Layer>,
    scheduler: Arc<dyn Scheduler>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("layers", &self.layers)
            .finish_non_exhaustive()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Create an empty dispatcher that runs chain steps as `may` coroutines.
    #[must_use]
    pub fn new() -> Self {
        Self::with_scheduler(Arc::new(CoroutineScheduler::default()))
    }

    /// Create an empty dispatcher that submits chain steps to `scheduler`.
    #[must_use]
    pub fn with_scheduler(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            layers: Vec::new(),
            scheduler,
        }
    }

    /// Registered layers in matching order.
    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub(crate) fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }

    fn push(&mut self, layer: Layer) {
        info!(
            layer = %layer,
            layer_index = self.layers.len(),
            total_layers = self.layers.len() + 1,
            "Layer registered"
        );
        self.layers.push(layer);
    }

    /// Append a closure that runs for every request.
    pub fn use_fn<F>(&mut self, handler: F)
    where
        F: Fn(&mut Request, &mut Response, Next) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.add_middleware(Arc::new(handler));
    }

    /// Append a middleware that runs for every request.
    ///
    /// Middleware is executed in the order it's added, interleaved with routes.
    pub fn add_middleware(&mut self, mw: Arc<dyn Middleware>) {
        self.push(Layer::middleware(mw));
    }

    /// Append a layer for `method` and `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidMethod`] if `method` is not a valid HTTP token and
    /// [`RegistrationError::InvalidPattern`] if `pattern` does not compile. Neither affects
    /// layers registered earlier.
    pub fn route<F>(
        &mut self,
        method: &str,
        pattern: &str,
        handler: F,
    ) -> Result<&mut Self, RegistrationError>
    where
        F: Fn(&mut Request, &mut Response, Next) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let method =
            Method::from_bytes(method.as_bytes()).map_err(|_| RegistrationError::InvalidMethod {
                method: method.to_string(),
            })?;
        self.route_with(Some(method), Some(pattern), Arc::new(handler))
    }

    /// Append a layer with an optional method filter and optional pattern.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidPattern`] if `pattern` does not compile.
    pub fn route_with(
        &mut self,
        method: Option<Method>,
        pattern: Option<&str>,
        handler: Arc<dyn Middleware>,
    ) -> Result<&mut Self, RegistrationError> {
        let layer = Layer::new(method, pattern, handler)?;
        self.push(layer);
        Ok(self)
    }

    /// Append a layer for `pattern` that accepts any method.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidPattern`] if `pattern` does not compile.
    pub fn all<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, RegistrationError>
    where
        F: Fn(&mut Request, &mut Response, Next) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.route_with(None, Some(pattern), Arc::new(handler))
    }

    verb_shorthand! {
        /// Append a `GET` route.
        get => Method::GET;
        /// Append a `POST` route.
        post => Method::POST;
        /// Append a `PUT` route.
        put => Method::PUT;
        /// Append a `PATCH` route.
        patch => Method::PATCH;
        /// Append a `DELETE` route.
        delete => Method::DELETE;
        /// Append a `HEAD` route.
        head => Method::HEAD;
        /// Append an `OPTIONS` route.
        options => Method::OPTIONS;
    }

    /// Run the chain for one request.
    ///
    /// Returns immediately; every step runs on the scheduler. `on_complete` is called exactly
    /// once with the request, the response and the outcome:
    ///
    /// - `Ok(())` when the chain ran out of matching layers or a handler ended it by dropping
    ///   its continuation,
    /// - `Err(_)` when a handler failed, returned an error or panicked; no later layer runs.
    pub fn handle<F>(self: &Arc<Self>, request: Request, response: Response, on_complete: F)
    where
        F: FnOnce(Request, Response, Result<(), HandlerError>) + Send + 'static,
    {
        debug!(
            request_id = %request.request_id,
            method = %request.method,
            path = %request.path,
            layers = self.layers.len(),
            "Dispatch start"
        );
        let on_complete: Completion = Box::new(on_complete);
        Chain::start(Arc::clone(self), request, response, on_complete);
    }

    /// Serve this dispatcher over HTTP on `addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or cannot be bound.
    pub fn listen<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        HttpServer(AppService::new(Arc::new(self))).start(addr)
    }
}
