//! End-to-end tests over a real `may_minihttp` server
//!
//! Each test binds a free local port, serves a dispatcher with the default coroutine
//! scheduler and talks to it over a raw `TcpStream`.

mod common;

use std::sync::Arc;

use common::test_server::{get, parse_response, send_request, start};
use minima::middleware::Cors;
use minima::Dispatcher;

#[test]
fn test_hello_world() {
    let mut app = Dispatcher::new();
    app.use_fn(|_req, res, next| {
        res.end("Hello world");
        next.advance();
        Ok(())
    });
    let (handle, addr) = start(app);

    let resp = parse_response(&get(&addr, "/"));
    handle.stop();

    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, "Hello world");
    assert!(resp
        .header("content-type")
        .is_some_and(|ct| ct.starts_with("text/plain")));
}

#[test]
fn test_basic_routing() {
    let mut app = Dispatcher::new();
    app.get("/hello/:id", |req, res, _next| {
        res.end(format!("Hello {}", req.params.get("id").unwrap_or_default()));
        Ok(())
    })
    .unwrap()
    .get("/bye/:id", |req, res, _next| {
        res.end(format!("Bye {}", req.params.get("id").unwrap_or_default()));
        Ok(())
    })
    .unwrap();
    let (handle, addr) = start(app);

    let hello = parse_response(&get(&addr, "/hello/world"));
    let bye = parse_response(&get(&addr, "/bye/world"));
    handle.stop();

    assert_eq!(hello.body, "Hello world");
    assert_eq!(bye.body, "Bye world");
}

#[test]
fn test_cors_header_over_the_wire() {
    let mut app = Dispatcher::new();
    app.add_middleware(Arc::new(Cors::new()));
    app.use_fn(|_req, res, next| {
        res.end("With CORS middleware");
        next.advance();
        Ok(())
    });
    let (handle, addr) = start(app);

    let resp = parse_response(&get(&addr, "/"));
    handle.stop();

    assert_eq!(resp.header("access-control-allow-origin"), Some("*"));
    assert_eq!(resp.body, "With CORS middleware");
}

#[test]
fn test_handler_error_becomes_500() {
    let mut app = Dispatcher::new();
    app.use_fn(|_req, res, _next| {
        res.write("partial output");
        Err(anyhow::anyhow!("database unavailable"))
    });
    let (handle, addr) = start(app);

    let resp = parse_response(&get(&addr, "/"));
    handle.stop();

    assert_eq!(resp.status, 500);
    assert_eq!(resp.body, "Internal server error");
}

#[test]
fn test_custom_status_and_headers() {
    let mut app = Dispatcher::new();
    app.post("/items", |req, res, _next| {
        res.set_status(201)
            .set_header("content-type", "application/json")
            .set_header("x-request-id", req.request_id.to_string());
        res.end(format!("{{\"size\":{}}}", req.body.len()));
        Ok(())
    })
    .unwrap();
    let (handle, addr) = start(app);

    let raw = send_request(
        &addr,
        "POST /items HTTP/1.1\r\nHost: localhost\r\nX-Request-Id: 01ARZ3NDEKTSV4RRFFQ69G5FAV\r\nContent-Length: 5\r\n\r\nhello",
    );
    handle.stop();
    let resp = parse_response(&raw);

    assert_eq!(resp.status, 201);
    assert_eq!(resp.header("content-type"), Some("application/json"));
    assert_eq!(
        resp.header("x-request-id"),
        Some("01ARZ3NDEKTSV4RRFFQ69G5FAV")
    );
    assert_eq!(resp.body, "{\"size\":5}");
}

#[test]
fn test_unmatched_request_gets_default_response() {
    let mut app = Dispatcher::new();
    app.get("/only", |_req, res, _next| {
        res.end("only");
        Ok(())
    })
    .unwrap();
    let (handle, addr) = start(app);

    let resp = parse_response(&get(&addr, "/elsewhere"));
    handle.stop();

    assert_eq!(resp.status, 200);
    assert!(resp.body.is_empty());
}
