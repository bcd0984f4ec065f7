use crate::dispatcher::Next;
use crate::server::{Request, Response};

/// A handler in the dispatch chain.
///
/// A handler may edit the request and response, then either call `next.advance()` to run
/// the next matching layer, call `next.fail(err)` (or return `Err`) to short-circuit to the
/// completion callback, or drop `next` to end the chain with the response as it stands.
/// `next` is `Send + 'static`, so it can be moved into a coroutine and resumed later.
///
/// `req` and `res` are exclusive to this call: the next layer starts once `call` returns.
/// Work that should keep running after `next.advance()` belongs in a coroutine of its own;
/// deferred work that needs the response uses [`Next::with_exchange`] before advancing.
pub trait Middleware: Send + Sync {
    fn call(&self, req: &mut Request, res: &mut Response, next: Next) -> anyhow::Result<()>;
}

impl<F> Middleware for F
where
    F: Fn(&mut Request, &mut Response, Next) -> anyhow::Result<()> + Send + Sync,
{
    fn call(&self, req: &mut Request, res: &mut Response, next: Next) -> anyhow::Result<()> {
        self(req, res, next)
    }
}
