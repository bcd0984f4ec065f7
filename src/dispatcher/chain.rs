//! The per-request dispatch walk.
//!
//! A [`Chain`] is created for every request and owns all per-request state: the cursor into
//! the dispatcher's layers, the request/response pair and the completion callback. The
//! dispatcher itself stays immutable and shared.
//!
//! The walk is a linear automaton:
//!
//! ```text
//! Scanning --match--> Dispatched --advance()--> Scanning
//!    |                    |
//!    | exhausted          | fail(err) / Err / panic
//!    v                    v
//! Completed(ok)      Completed(err)
//! ```
//!
//! Each transition is a separate task on the dispatcher's scheduler, so stack depth does
//! not grow with chain length and a handler that advances synchronously never re-enters
//! the chain on its own turn.
//!
//! User code never runs under the state lock. The exchange is leased out of the state for
//! the duration of a handler call (or a [`Next::with_exchange`] closure); a step or
//! completion that arrives meanwhile is parked and replayed when the lease comes back.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, trace, warn};

use super::core::Dispatcher;
use crate::error::HandlerError;
use crate::ids::RequestId;
use crate::server::{Request, Response};

/// Terminal callback for one request; receives the request/response pair back together
/// with the outcome of the walk.
pub type Completion = Box<dyn FnOnce(Request, Response, Result<(), HandlerError>) + Send + 'static>;

struct Exchange {
    request: Request,
    response: Response,
}

/// Work that found the exchange leased and waits for it.
#[derive(Debug, Clone, Copy)]
enum Parked {
    Step,
    Invoke(usize),
    Fail,
}

struct ChainState {
    /// Next layer to examine.
    index: usize,
    /// `None` while leased or once the chain has completed.
    exchange: Option<Exchange>,
    leased: bool,
    parked: Option<Parked>,
    /// Error accepted by `resume`, delivered by the fail task or by `Drop`.
    failure: Option<HandlerError>,
    on_complete: Option<Completion>,
}

pub(crate) struct Chain {
    dispatcher: Arc<Dispatcher>,
    request_id: RequestId,
    state: Mutex<ChainState>,
    /// Generation of the outstanding continuation. Resuming bumps it, which turns every
    /// older [`Next`] into a no-op.
    ticket: AtomicUsize,
}

/// Exclusive hold on the request/response pair, taken out of the chain state.
///
/// Returning it (on drop, including during unwinding) replays whatever was parked.
struct Lease {
    chain: Arc<Chain>,
    exchange: Option<Exchange>,
}

impl Lease {
    fn parts(&mut self) -> Option<(&mut Request, &mut Response)> {
        self.exchange
            .as_mut()
            .map(|Exchange { request, response }| (request, response))
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        let parked = {
            let mut state = self.chain.lock();
            state.exchange = self.exchange.take();
            state.leased = false;
            state.parked.take()
        };
        if let Some(parked) = parked {
            trace!(request_id = %self.chain.request_id, parked = ?parked, "Replaying parked work");
            self.chain.run_later(parked);
        }
    }
}

/// Continuation handed to each handler.
///
/// Consuming it with [`Next::advance`] runs the next matching layer; [`Next::fail`] skips
/// the rest of the chain and delivers the error to the completion callback. Dropping it
/// without calling either ends the chain successfully once no other continuation for the
/// request is alive.
pub struct Next {
    chain: Arc<Chain>,
    ticket: usize,
}

impl Next {
    /// Continue with the next matching layer.
    pub fn advance(self) {
        self.chain.resume(self.ticket, None);
    }

    /// Stop the chain and report `err` to the completion callback.
    pub fn fail(self, err: impl Into<anyhow::Error>) {
        self.chain
            .resume(self.ticket, Some(HandlerError::Failed(err.into())));
    }

    /// Advance on `Ok`, fail on `Err`. Handy at the end of deferred work.
    pub fn resume(self, result: anyhow::Result<()>) {
        match result {
            Ok(()) => self.advance(),
            Err(err) => self.fail(err),
        }
    }

    /// Run `f` against the request and response from outside the handler call.
    ///
    /// This is how deferred work writes its result: park the continuation, finish the work,
    /// call `with_exchange` to fill in the response, then advance or drop the continuation.
    ///
    /// Returns `None` while the exchange is already borrowed (inside the handler call that
    /// received this continuation, use the `req`/`res` arguments instead) or when the
    /// chain has already moved past this continuation.
    pub fn with_exchange<R>(&self, f: impl FnOnce(&mut Request, &mut Response) -> R) -> Option<R> {
        if self.chain.ticket.load(Ordering::Acquire) != self.ticket {
            warn!(request_id = %self.chain.request_id, "Stale continuation cannot reach the exchange");
            return None;
        }
        let mut lease = self.chain.lease(None)?;
        let (request, response) = lease.parts()?;
        Some(f(request, response))
    }

    /// ID of the request this continuation belongs to.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.chain.request_id
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("request_id", &self.chain.request_id)
            .field("ticket", &self.ticket)
            .finish()
    }
}

impl Chain {
    /// Create the chain for one request and submit its first step.
    pub(crate) fn start(
        dispatcher: Arc<Dispatcher>,
        request: Request,
        response: Response,
        on_complete: Completion,
    ) {
        let request_id = request.request_id;
        let chain = Arc::new(Chain {
            dispatcher,
            request_id,
            state: Mutex::new(ChainState {
                index: 0,
                exchange: Some(Exchange { request, response }),
                leased: false,
                parked: None,
                failure: None,
                on_complete: Some(on_complete),
            }),
            ticket: AtomicUsize::new(0),
        });
        chain.resume(0, None);
    }

    fn lock(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the exchange out of the state.
    ///
    /// When it is already leased, `park` (if any) is recorded to run once it comes back.
    /// Returns `None` when leased or when the chain has completed.
    fn lease(self: &Arc<Self>, park: Option<Parked>) -> Option<Lease> {
        let mut state = self.lock();
        if state.leased {
            if let Some(work) = park {
                trace!(request_id = %self.request_id, parked = ?work, "Exchange busy; parking");
                state.parked = Some(work);
            }
            return None;
        }
        let exchange = state.exchange.take()?;
        state.leased = true;
        Some(Lease {
            chain: Arc::clone(self),
            exchange: Some(exchange),
        })
    }

    fn run_later(self: &Arc<Self>, work: Parked) {
        let chain = Arc::clone(self);
        let task: Box<dyn FnOnce() + Send> = match work {
            Parked::Step => Box::new(move || chain.step()),
            Parked::Invoke(index) => Box::new(move || chain.invoke(index)),
            Parked::Fail => Box::new(move || chain.fail_pending()),
        };
        self.dispatcher.scheduler().schedule(task);
    }

    /// Redeem continuation `ticket`. Only the first redemption of a ticket has any effect.
    fn resume(self: &Arc<Self>, ticket: usize, error: Option<HandlerError>) {
        if self
            .ticket
            .compare_exchange(ticket, ticket + 1, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            match error {
                Some(err) => warn!(
                    request_id = %self.request_id,
                    error = %err,
                    "Continuation already used; dropping handler error"
                ),
                None => warn!(
                    request_id = %self.request_id,
                    "Continuation already used; ignoring advance"
                ),
            }
            return;
        }

        match error {
            Some(err) => {
                // Stored before scheduling so a lost task still completes with the error.
                self.lock().failure = Some(err);
                self.run_later(Parked::Fail);
            }
            None => self.run_later(Parked::Step),
        }
    }

    /// Scan forward for the next applicable layer and bind its parameters.
    fn step(self: Arc<Self>) {
        let layers = self.dispatcher.layers();
        let selected = {
            let mut guard = self.lock();
            let state = &mut *guard;
            if state.leased {
                trace!(request_id = %self.request_id, "Exchange busy; parking step");
                state.parked = Some(Parked::Step);
                return;
            }
            let Some(exchange) = state.exchange.as_mut() else {
                return;
            };
            let mut selected = None;
            while state.index < layers.len() {
                let index = state.index;
                state.index += 1;
                let request = &mut exchange.request;
                if let Some(params) = layers[index].matches(&request.method, &request.path) {
                    // Bound in the same step as the match; the handler runs on a later turn.
                    request.params = params;
                    selected = Some(index);
                    break;
                }
            }
            selected
        };

        match selected {
            Some(index) => {
                debug!(
                    request_id = %self.request_id,
                    layer_index = index,
                    layer = %layers[index],
                    "Layer matched"
                );
                self.run_later(Parked::Invoke(index));
            }
            None => {
                debug!(request_id = %self.request_id, "Chain exhausted");
                self.finish(Ok(()));
            }
        }
    }

    /// Run the handler of layer `index`, turning a returned error or panic into a failed
    /// continuation.
    fn invoke(self: Arc<Self>, index: usize) {
        let Some(mut lease) = self.lease(Some(Parked::Invoke(index))) else {
            return;
        };
        let layer = &self.dispatcher.layers()[index];
        let ticket = self.ticket.load(Ordering::Acquire);
        let next = Next {
            chain: Arc::clone(&self),
            ticket,
        };

        let outcome = {
            let Some((request, response)) = lease.parts() else {
                return;
            };
            let handler = layer.handler();
            panic::catch_unwind(AssertUnwindSafe(|| handler.call(request, response, next)))
        };
        drop(lease);

        match outcome {
            Ok(Ok(())) => {
                trace!(request_id = %self.request_id, layer_index = index, "Handler returned");
            }
            Ok(Err(err)) => {
                warn!(
                    request_id = %self.request_id,
                    layer_index = index,
                    layer = %layer,
                    error = %format!("{err:#}"),
                    "Handler returned an error"
                );
                self.resume(ticket, Some(HandlerError::Failed(err)));
            }
            Err(payload) => {
                let err = HandlerError::from_panic(payload);
                error!(
                    request_id = %self.request_id,
                    layer_index = index,
                    layer = %layer,
                    error = %err,
                    "Handler panicked - CRITICAL"
                );
                self.resume(ticket, Some(err));
            }
        }
    }

    /// Deliver the stored failure, waiting for the exchange if a lease is out.
    fn fail_pending(self: Arc<Self>) {
        let err = {
            let mut state = self.lock();
            if state.leased {
                state.parked = Some(Parked::Fail);
                return;
            }
            state.failure.take()
        };
        match err {
            Some(err) => self.finish(Err(err)),
            None => warn!(request_id = %self.request_id, "No pending failure to deliver"),
        }
    }

    /// Hand the exchange and outcome to the completion callback.
    fn finish(&self, result: Result<(), HandlerError>) {
        let (exchange, on_complete) = {
            let mut state = self.lock();
            (state.exchange.take(), state.on_complete.take())
        };
        let (Some(Exchange { request, response }), Some(on_complete)) = (exchange, on_complete)
        else {
            warn!(request_id = %self.request_id, "Chain already completed");
            return;
        };

        match &result {
            Ok(()) => debug!(request_id = %self.request_id, "Chain completed"),
            Err(err) => debug!(request_id = %self.request_id, error = %err, "Chain failed"),
        }
        on_complete(request, response, result);
    }
}

impl Drop for Chain {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        let (Some(Exchange { request, response }), Some(on_complete)) =
            (state.exchange.take(), state.on_complete.take())
        else {
            return;
        };

        // A failure whose task never ran still wins over the implicit halt.
        let result = match state.failure.take() {
            Some(err) => {
                warn!(request_id = %self.request_id, error = %err, "Delivering failure from dropped chain");
                Err(err)
            }
            None => {
                debug!(request_id = %self.request_id, "Chain halted by handler");
                Ok(())
            }
        };
        self.dispatcher
            .scheduler()
            .schedule(Box::new(move || on_complete(request, response, result)));
    }
}
