use criterion::{criterion_group, criterion_main, Criterion};
use http::Method;
use minima::dispatcher::{Dispatcher, EventLoop};
use minima::router::Layer;
use minima::{Request, Response};
use std::hint::black_box;
use std::sync::Arc;

fn noop() -> Arc<dyn minima::Middleware> {
    Arc::new(
        |_req: &mut Request, _res: &mut Response, next: minima::Next| -> anyhow::Result<()> {
            next.advance();
            Ok(())
        },
    )
}

fn zoo_layers() -> Vec<Layer> {
    let routes = [
        (Method::GET, "/"),
        (Method::GET, "/zoo/animals"),
        (Method::POST, "/zoo/animals"),
        (Method::GET, "/zoo/animals/:id"),
        (Method::PUT, "/zoo/animals/:id"),
        (Method::DELETE, "/zoo/animals/:id"),
        (Method::GET, "/zoo/animals/:id/toys/{toy_id}"),
        (
            Method::GET,
            "/zoo/:category/animals/:id/habitats/:habitat_id/sections/:section_id",
        ),
    ];
    routes
        .into_iter()
        .map(|(method, pattern)| Layer::new(Some(method), Some(pattern), noop()))
        .collect::<Result<_, _>>()
        .unwrap()
}

fn bench_layer_matching(c: &mut Criterion) {
    let layers = zoo_layers();
    let requests = [
        (Method::GET, "/"),
        (Method::GET, "/zoo/animals/42"),
        (Method::GET, "/zoo/animals/42/toys/ball"),
        (Method::GET, "/zoo/mammals/animals/7/habitats/3/sections/north"),
        (Method::PATCH, "/zoo/animals/42"),
        (Method::GET, "/nowhere"),
    ];

    c.bench_function("scan_all_layers", |b| {
        b.iter(|| {
            for (method, path) in &requests {
                for layer in &layers {
                    black_box(layer.matches(black_box(method), black_box(path)));
                }
            }
        })
    });

    let deep = &layers[layers.len() - 1];
    c.bench_function("match_four_params", |b| {
        b.iter(|| {
            black_box(deep.matches(
                &Method::GET,
                black_box("/zoo/mammals/animals/7/habitats/3/sections/north"),
            ))
        })
    });
}

fn bench_dispatch_chain(c: &mut Criterion) {
    let event_loop = Arc::new(EventLoop::new());
    let mut app = Dispatcher::with_scheduler(event_loop.clone());
    for _ in 0..8 {
        app.add_middleware(noop());
    }
    app.get("/zoo/animals/:id", |req, res, _next| {
        res.end(req.params.get("id").unwrap_or_default().to_string());
        Ok(())
    })
    .unwrap();
    let app = Arc::new(app);

    c.bench_function("dispatch_eight_middleware_and_route", |b| {
        b.iter(|| {
            app.handle(
                Request::new(Method::GET, "/zoo/animals/42"),
                Response::new(),
                |_req, res, result| {
                    black_box((res, result));
                },
            );
            event_loop.run_until_idle()
        })
    });
}

criterion_group!(benches, bench_layer_matching, bench_dispatch_chain);
criterion_main!(benches);
