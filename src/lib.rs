//! # kiroku
//!
//! Request-scoped JSON logging middleware for async HTTP services.
//! One request, one line. Nothing more. Nothing less.
//!
//! ## The contract
//!
//! Your server parses bytes off the wire and your handlers hold the business
//! logic — kiroku does neither, by design. It sits between them and owns the
//! one concern that is the same in every service: observing each request and
//! emitting exactly one structured record for it.
//!
//! What kiroku does per request:
//!
//! - **Correlates** — takes the client-supplied id from a configured header
//!   or generates a UUID v4
//! - **Times** — wall clock for the whole request, plus whatever your
//!   data-access code feeds the per-request [`DbTimer`]
//! - **Translates** — domain [`Error`]s (and handler panics) become
//!   `{"code":…,"message":…}` responses at exactly one boundary point,
//!   without leaking internals to clients
//! - **Emits** — one JSON line to a [`LogSink`], on every path: success,
//!   error, panic, even cancellation mid-handler
//!
//! What stays downstream of the sink — shipping, storage, aggregation,
//! distributed tracing — is intentionally someone else's problem.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::StatusCode;
//! use kiroku::{Classification, Error, Request, RequestLogger, Response};
//!
//! async fn get_item(req: Request) -> Result<Response, Error> {
//!     if req.path().ends_with("/missing") {
//!         // 404, body {"code":"This","message":"entity not found"},
//!         // log_type "error" — all handled at the boundary.
//!         return Err(Error::classified(Classification::NotFound));
//!     }
//!     Ok(Response::json(br#"{"id":1}"#.to_vec()))
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let logger = RequestLogger::wrap(get_item);
//!
//!     // Your server builds one Request per inbound call and returns the
//!     // Response it gets back. The log line is already on stdout.
//!     let resp = logger.handle(Request::builder().path("/items/1").build()).await;
//!     assert_eq!(resp.status_code(), StatusCode::OK);
//! }
//! ```
//!
//! ## Per-request isolation
//!
//! Everything mutable — the error info attached on failure, the dependency
//! timing accumulator — lives in a [`Context`] owned by one request.
//! Concurrent requests cannot contaminate each other; the only shared
//! resource is the sink, and each emission is one atomic line.

mod config;
mod context;
mod error;
mod handler;
mod middleware;
mod record;
mod request;
mod response;
mod translate;

pub use config::bool_from_env;
pub use context::{Context, DbTimer, ErrorInfo};
pub use error::{Classification, Error, HTTP_ERROR_CODE};
pub use handler::Handler;
pub use middleware::{RequestLogger, RequestLoggerConfig, ENV_JSON_LOGGING, ENV_STACK_TRACE};
pub use record::{CaptureSink, ErrorField, Level, LogRecord, LogSink, LogType, StdoutSink};
pub use request::{Request, RequestBuilder};
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use translate::Translator;
