//! Minimal kiroku example — an in-memory item store behind the logging
//! middleware.
//!
//! Run with:
//!   cargo run --example basic
//!
//! Every simulated request prints one JSON log line to stdout. Watch the
//! `log_type`, `status_code`, and `error` fields change across the three
//! calls: a create (access/200), a duplicate create (error/409), and a
//! lookup of a missing id (error/404).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use http::Method;
use kiroku::{Classification, Error, Request, RequestLogger, RequestLoggerConfig, Response};

/// The "database". Real services put a connection pool here; the shape of
/// the instrumentation is the same — time each unit of work and feed the
/// request's DbTimer.
#[derive(Default)]
struct Store {
    items: Mutex<HashMap<String, String>>,
}

impl Store {
    fn insert(&self, req: &Request, name: &str, description: &str) -> Result<(), Error> {
        let started = Instant::now();
        let mut items = self
            .items
            .lock()
            .map_err(|_| Error::unexpected("store lock poisoned"))?;
        let result = if items.contains_key(name) {
            Err(Error::with_reason(
                Classification::AlreadyExists,
                "an item with this name already exists",
            ))
        } else {
            items.insert(name.to_owned(), description.to_owned());
            Ok(())
        };
        req.context().db_timer().add(started.elapsed());
        result
    }

    fn get(&self, req: &Request, name: &str) -> Result<String, Error> {
        let started = Instant::now();
        let items = self
            .items
            .lock()
            .map_err(|_| Error::unexpected("store lock poisoned"))?;
        let result = items
            .get(name)
            .cloned()
            .ok_or_else(|| Error::classified(Classification::NotFound));
        req.context().db_timer().add(started.elapsed());
        result
    }
}

#[tokio::main]
async fn main() {
    // Diagnostics (config warnings, sink failures) go through tracing;
    // the request records themselves go straight to stdout.
    tracing_subscriber::fmt::init();

    let store = Arc::new(Store::default());

    // One handler for the whole demo: POST /items creates, GET /items/{name}
    // reads. A real service would sit a router in front.
    let handler = move |req: Request| {
        let store = Arc::clone(&store);
        async move {
            match (req.method().as_str(), req.path().to_owned()) {
                ("POST", p) if p == "/items" => {
                    let name = String::from_utf8_lossy(req.body()).into_owned();
                    store.insert(&req, &name, "demo item")?;
                    Ok(Response::builder()
                        .status(http::StatusCode::CREATED)
                        .json(format!(r#"{{"name":"{name}"}}"#).into_bytes()))
                }
                ("GET", p) if p.starts_with("/items/") => {
                    let name = p.trim_start_matches("/items/").to_owned();
                    let description = store.get(&req, &name)?;
                    Ok(Response::json(
                        format!(r#"{{"name":"{name}","description":"{description}"}}"#)
                            .into_bytes(),
                    ))
                }
                _ => Err(Error::http(http::StatusCode::NOT_FOUND, "no such route")),
            }
        }
    };

    let logger = RequestLogger::with_config(handler, RequestLoggerConfig::from_env());

    // Simulated traffic. An embedding server would build these from the wire.
    let create = Request::builder()
        .method(Method::POST)
        .path("/items")
        .header("user-agent", "demo/0.1")
        .body("widget")
        .build();
    println!("create: {}", logger.handle(create).await.status_code());

    let duplicate = Request::builder()
        .method(Method::POST)
        .path("/items")
        .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
        .body("widget")
        .build();
    println!("duplicate: {}", logger.handle(duplicate).await.status_code());

    let missing = Request::builder().path("/items/gadget").build();
    println!("missing: {}", logger.handle(missing).await.status_code());

    tokio::time::sleep(Duration::from_millis(10)).await;
}
