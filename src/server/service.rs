use std::io;
use std::sync::Arc;

use may::sync::mpsc;
use may_minihttp::{HttpService, Request as RawRequest, Response as RawResponse};
use tracing::{debug, error, warn};

use super::request::parse_request;
use super::response::{write_response, Response};
use crate::dispatcher::Dispatcher;
use crate::error::HandlerError;

/// may_minihttp service that feeds every request through a [`Dispatcher`].
///
/// The dispatcher must use a scheduler that makes progress on its own, such as the default
/// `CoroutineScheduler`; an `EventLoop` nobody drives would stall every request.
#[derive(Clone)]
pub struct AppService {
    dispatcher: Arc<Dispatcher>,
}

impl AppService {
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}

/// Completion policy at the transport boundary.
///
/// A successful chain has already produced its response, which is passed through untouched.
/// A failed chain is replaced by a generic `500 Internal server error`; the error detail is
/// logged and never sent to the client.
#[must_use]
pub fn complete_response(response: Response, result: Result<(), HandlerError>) -> Response {
    match result {
        Ok(()) => response,
        Err(err) => {
            error!(error = %err, "Request failed; sending 500");
            Response::internal_server_error()
        }
    }
}

impl HttpService for AppService {
    fn call(&mut self, req: RawRequest, res: &mut RawResponse) -> io::Result<()> {
        let request = match parse_request(req) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Rejected request with invalid method");
                let mut bad = Response::new();
                bad.set_status(400).end("Bad request");
                write_response(res, bad);
                return Ok(());
            }
        };
        let request_id = request.request_id;

        let (tx, rx) = mpsc::channel::<Response>();
        self.dispatcher
            .handle(request, Response::new(), move |_req, response, result| {
                if tx.send(complete_response(response, result)).is_err() {
                    debug!(request_id = %request_id, "Connection gone before response was ready");
                }
            });

        let response = match rx.recv() {
            Ok(response) => response,
            Err(_) => {
                error!(request_id = %request_id, "Dispatch ended without a completion");
                Response::internal_server_error()
            }
        };
        debug!(
            request_id = %request_id,
            status = response.status(),
            body_size_bytes = response.body().len(),
            "Response ready"
        );
        write_response(res, response);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_response_passes_success_through() {
        let mut res = Response::new();
        res.set_status(201).end("created");
        let out = complete_response(res, Ok(()));
        assert_eq!(out.status(), 201);
        assert_eq!(out.text(), "created");
    }

    #[test]
    fn test_complete_response_hides_error_detail() {
        let mut res = Response::new();
        res.end("partial");
        let out = complete_response(res, Err(anyhow::anyhow!("secret detail").into()));
        assert_eq!(out.status(), 500);
        assert_eq!(out.text(), "Internal server error");
    }
}
