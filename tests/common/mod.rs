#![allow(dead_code)]

pub mod harness {
    use http::Method;
    use minima::dispatcher::{Dispatcher, EventLoop};
    use minima::{HandlerError, Request, Response};
    use std::sync::{Arc, Mutex};

    /// What the completion callback saw for one request.
    pub struct Outcome {
        pub request: Request,
        pub response: Response,
        pub result: Result<(), HandlerError>,
    }

    /// Shared log that handlers append to, so tests can assert execution order.
    #[derive(Clone, Default)]
    pub struct Trace(Arc<Mutex<Vec<String>>>);

    impl Trace {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push(&self, entry: impl Into<String>) {
            self.0.lock().unwrap().push(entry.into());
        }

        pub fn entries(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    /// Dispatcher driven by a deterministic event loop.
    pub fn new_app() -> (Dispatcher, Arc<EventLoop>) {
        let event_loop = Arc::new(EventLoop::new());
        (Dispatcher::with_scheduler(event_loop.clone()), event_loop)
    }

    /// Completion slot plus a counter of how many times the completion ran.
    #[derive(Clone, Default)]
    pub struct Completions {
        outcomes: Arc<Mutex<Vec<Outcome>>>,
    }

    impl Completions {
        pub fn count(&self) -> usize {
            self.outcomes.lock().unwrap().len()
        }

        pub fn take_single(&self) -> Outcome {
            let mut outcomes = self.outcomes.lock().unwrap();
            assert_eq!(outcomes.len(), 1, "expected exactly one completion");
            outcomes.pop().unwrap()
        }
    }

    /// Submit a request without driving the loop.
    pub fn submit(app: &Arc<Dispatcher>, request: Request) -> Completions {
        let completions = Completions::default();
        let sink = Arc::clone(&completions.outcomes);
        app.handle(request, Response::new(), move |request, response, result| {
            sink.lock().unwrap().push(Outcome {
                request,
                response,
                result,
            });
        });
        completions
    }

    /// Submit one request, drain the loop, and return the single outcome.
    pub fn dispatch(
        app: &Arc<Dispatcher>,
        event_loop: &EventLoop,
        method: Method,
        url: &str,
    ) -> Outcome {
        let completions = submit(app, Request::new(method, url));
        event_loop.run_until_idle();
        completions.take_single()
    }
}

pub mod test_server {
    use minima::server::ServerHandle;
    use minima::Dispatcher;
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpListener, TcpStream};
    use std::sync::Once;
    use std::time::Duration;

    /// Ensures May coroutines are configured only once
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x8000);
        });
    }

    /// Serve `app` on a free local port.
    pub fn start(app: Dispatcher) -> (ServerHandle, SocketAddr) {
        setup_may_runtime();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let handle = app.listen(addr).unwrap();
        handle.wait_ready().unwrap();
        (handle, addr)
    }

    pub fn send_request(addr: &SocketAddr, req: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(req.as_bytes()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        let mut buf = Vec::new();
        loop {
            let mut tmp = [0u8; 1024];
            match stream.read(&mut tmp) {
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    break
                }
                Err(e) => panic!("read error: {e:?}"),
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    pub fn get(addr: &SocketAddr, path: &str) -> String {
        send_request(
            addr,
            &format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n"),
        )
    }

    pub struct ParsedResponse {
        pub status: u16,
        pub headers: Vec<(String, String)>,
        pub body: String,
    }

    impl ParsedResponse {
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }
    }

    pub fn parse_response(resp: &str) -> ParsedResponse {
        let (head, body) = resp.split_once("\r\n\r\n").unwrap_or((resp, ""));
        let mut status = 0;
        let mut headers = Vec::new();
        for line in head.lines() {
            if line.starts_with("HTTP/1.1") {
                status = line
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or("0")
                    .parse()
                    .unwrap();
            } else if let Some((name, val)) = line.split_once(':') {
                headers.push((name.trim().to_string(), val.trim().to_string()));
            }
        }
        ParsedResponse {
            status,
            headers,
            body: body.to_string(),
        }
    }
}
