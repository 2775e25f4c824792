//! The request-logging middleware.
//!
//! [`RequestLogger`] wraps any [`Handler`] and observes it without changing
//! its behavior: it times the request, resolves a correlation id, watches
//! the outcome (normal return, domain error, or panic), translates failures
//! into responses at the boundary, and emits exactly one JSON record per
//! request — on every path, including cancellation mid-flight.
//!
//! Per request the flow is a straight line:
//!
//! ```text
//! START               capture clock, reset db timer, resolve event id / client ip
//! DOWNSTREAM_RUNNING  call the wrapped handler (panics contained)
//! COMPLETED | FAILED  observe status; on failure translate + record error info
//! LOGGED              build the record, emit one line, return the response
//! ```
//!
//! A sink or serialization failure never reaches the caller: the response is
//! already determined by then, so logging problems go to the fallback
//! diagnostic channel and are swallowed.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use http::StatusCode;
use tracing::warn;
use uuid::Uuid;

use crate::config::bool_from_env;
use crate::context::Context;
use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::record::{timestamp_utc, ErrorField, Level, LogRecord, LogSink, LogType, StdoutSink};
use crate::request::Request;
use crate::response::Response;
use crate::translate::Translator;

// ── Configuration ─────────────────────────────────────────────────────────────

/// Environment flag: structured request logging on/off.
pub const ENV_JSON_LOGGING: &str = "IS_JSON_LOGGING";
/// Environment flag: stack-trace capture for classified errors.
pub const ENV_STACK_TRACE: &str = "LOG_STACK_TRACE";

/// Configuration for [`RequestLogger`].
#[derive(Clone, Debug)]
pub struct RequestLoggerConfig {
    /// When false, errors are still translated to responses but no record
    /// is emitted.
    pub enabled: bool,
    /// Stack-trace capture for classified/HTTP errors. Unexpected errors
    /// keep their trace regardless.
    pub include_stack_trace: bool,
    /// Inbound header carrying a client-supplied correlation id. When unset
    /// or absent on a request, a fresh UUID v4 is generated.
    pub event_id_header: Option<String>,
    /// Proxy headers to check for the client ip, in priority order. The
    /// first comma-separated token of the first present header wins;
    /// fallback is the transport peer address, then `"unknown"`.
    pub client_ip_headers: Vec<String>,
}

impl Default for RequestLoggerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            include_stack_trace: false,
            event_id_header: None,
            client_ip_headers: vec!["x-forwarded-for".to_owned(), "x-real-ip".to_owned()],
        }
    }
}

impl RequestLoggerConfig {
    /// Reads the boolean flags from the environment
    /// ([`ENV_JSON_LOGGING`] default true, [`ENV_STACK_TRACE`] default
    /// false); header lists keep their defaults.
    pub fn from_env() -> Self {
        Self {
            enabled: bool_from_env(ENV_JSON_LOGGING, true),
            include_stack_trace: bool_from_env(ENV_STACK_TRACE, false),
            ..Self::default()
        }
    }
}

// ── RequestLogger ─────────────────────────────────────────────────────────────

/// Middleware that wraps a handler and emits one structured log record per
/// request.
///
/// ```rust,no_run
/// use kiroku::{Error, Request, RequestLogger, Response};
///
/// async fn hello(_req: Request) -> Result<Response, Error> {
///     Ok(Response::text("hi"))
/// }
///
/// #[tokio::main]
/// async fn main() {
///     let logger = RequestLogger::wrap(hello);
///     let resp = logger.handle(Request::builder().build()).await;
///     assert_eq!(resp.status_code(), http::StatusCode::OK);
/// }
/// ```
pub struct RequestLogger {
    inner: BoxedHandler,
    config: RequestLoggerConfig,
    translator: Translator,
    sink: Arc<dyn LogSink>,
}

impl RequestLogger {
    /// Wraps `handler` with the default configuration, logging to stdout.
    pub fn wrap(handler: impl Handler) -> Self {
        Self::with_config(handler, RequestLoggerConfig::default())
    }

    /// Wraps `handler` with an explicit configuration.
    pub fn with_config(handler: impl Handler, config: RequestLoggerConfig) -> Self {
        let translator = Translator::new(config.include_stack_trace);
        Self {
            inner: handler.into_boxed_handler(),
            config,
            translator,
            sink: Arc::new(StdoutSink),
        }
    }

    /// Replaces the log sink. Returns `self` for chaining.
    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Runs one request through the pipeline.
    ///
    /// Never errors and never panics outward: domain errors and handler
    /// panics are translated into responses here, at the boundary, and the
    /// record is emitted exactly once — a drop guard covers the case where
    /// this future is cancelled while the handler runs.
    pub async fn handle(&self, req: Request) -> Response {
        if !self.config.enabled {
            return self.run_untracked(req).await;
        }

        // START: one wall-clock read for the timestamp, one monotonic read
        // for the elapsed time.
        let started = Instant::now();
        let ctx = req.context().clone();
        ctx.db_timer().reset();

        let mut guard = EmitGuard {
            base: Some(RecordBase {
                timestamp: timestamp_utc(),
                event_id: self.event_id(&req),
                method: req.method().to_string(),
                path: req.path().to_owned(),
                client_ip: self.client_ip(&req),
                user_agent: req.header("user-agent").map(str::to_owned),
            }),
            sink: Arc::clone(&self.sink),
            ctx: ctx.clone(),
            started,
        };

        // DOWNSTREAM_RUNNING: panics are contained so the record and a
        // response still materialize.
        let outcome = AssertUnwindSafe(self.inner.call(req)).catch_unwind().await;

        let (response, log_type, level) = match outcome {
            // COMPLETED
            Ok(Ok(response)) => {
                let status = response.status_code();
                let (log_type, level) = if status.as_u16() < 400 {
                    (LogType::Access, Level::Info)
                } else {
                    (LogType::Error, Level::Error)
                };
                (response, log_type, level)
            }
            // FAILED: domain error
            Ok(Err(err)) => {
                self.translator.record(&ctx, &err);
                let response = self.translator.response(&err);
                let log_type = failed_log_type(response.status_code());
                (response, log_type, Level::Error)
            }
            // FAILED: panic
            Err(panic) => {
                let err = Error::unexpected(panic_message(panic.as_ref()));
                self.translator.record(&ctx, &err);
                let response = self.translator.response(&err);
                (response, LogType::Error, Level::Error)
            }
        };

        // LOGGED: disarms the guard; exactly one emission per request.
        guard.finish(response.status_code().as_u16(), log_type, level);
        response
    }

    /// The disabled path: translation still happens, no record is emitted.
    async fn run_untracked(&self, req: Request) -> Response {
        match AssertUnwindSafe(self.inner.call(req)).catch_unwind().await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => self.translator.response(&err),
            Err(panic) => self
                .translator
                .response(&Error::unexpected(panic_message(panic.as_ref()))),
        }
    }

    /// Correlation id: the configured header's value when present, else a
    /// fresh UUID v4.
    fn event_id(&self, req: &Request) -> String {
        self.config
            .event_id_header
            .as_deref()
            .and_then(|name| req.header(name))
            .map(str::to_owned)
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }

    /// Client ip: first comma-separated token of the first present proxy
    /// header, else the transport peer address, else `"unknown"`.
    fn client_ip(&self, req: &Request) -> String {
        let from_headers = self.config.client_ip_headers.iter().find_map(|name| {
            let value = req.header(name)?;
            Some(value.split(',').next().unwrap_or(value).trim().to_owned())
        });

        match from_headers {
            Some(ip) if !ip.is_empty() => ip,
            _ => req
                .peer_addr()
                .map(|addr| addr.ip().to_string())
                .unwrap_or_else(|| "unknown".to_owned()),
        }
    }
}

/// Log type for the failure path: access-control rejections are routed as
/// `security`, everything else as `error`.
fn failed_log_type(status: StatusCode) -> LogType {
    match status.as_u16() {
        401 | 403 => LogType::Security,
        _ => LogType::Error,
    }
}

/// Best-effort text from a caught panic payload.
fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_owned()
    }
}

// ── Emission ──────────────────────────────────────────────────────────────────

/// Request-identity fields captured at START.
struct RecordBase {
    timestamp: String,
    event_id: String,
    method: String,
    path: String,
    client_ip: String,
    user_agent: Option<String>,
}

/// Guarantees exactly one emission per request.
///
/// [`finish`](EmitGuard::finish) takes the base on the normal path; if the
/// request future is cancelled mid-handler the guard is dropped still armed
/// and emits a best-effort record (status 500, `log_type` error) instead.
struct EmitGuard {
    base: Option<RecordBase>,
    sink: Arc<dyn LogSink>,
    ctx: Context,
    started: Instant,
}

impl EmitGuard {
    fn finish(&mut self, status_code: u16, log_type: LogType, level: Level) {
        if let Some(base) = self.base.take() {
            emit(
                self.sink.as_ref(),
                base,
                &self.ctx,
                self.started.elapsed(),
                status_code,
                log_type,
                level,
            );
        }
    }
}

impl Drop for EmitGuard {
    fn drop(&mut self) {
        if let Some(base) = self.base.take() {
            emit(
                self.sink.as_ref(),
                base,
                &self.ctx,
                self.started.elapsed(),
                500,
                LogType::Error,
                Level::Error,
            );
        }
    }
}

/// Builds and emits the record. Failures go to the diagnostic channel and
/// stop here — the HTTP response is already determined.
fn emit(
    sink: &dyn LogSink,
    base: RecordBase,
    ctx: &Context,
    elapsed: Duration,
    status_code: u16,
    log_type: LogType,
    level: Level,
) {
    let error = ctx.error_info().map(|info| ErrorField {
        code: info.code,
        message: info.message,
        stack_trace: info.stack_trace,
    });

    let record = LogRecord {
        timestamp: base.timestamp,
        event_id: base.event_id,
        method: base.method,
        path: base.path,
        client_ip: base.client_ip,
        user_agent: base.user_agent,
        error,
        time_taken_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        status_code,
        log_type,
        level,
        db_query_time_ms: ctx.db_timer().total_ms(),
    };

    match serde_json::to_string(&record) {
        Ok(line) => {
            if let Err(e) = sink.emit(level, &line) {
                warn!("request log sink write failed: {e}");
            }
        }
        Err(e) => warn!("request log serialization failed: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ok_handler(_req: Request) -> Result<Response, Error> {
        Ok(Response::text("ok"))
    }

    fn logger_with_headers(headers: Vec<&str>) -> RequestLogger {
        let config = RequestLoggerConfig {
            client_ip_headers: headers.into_iter().map(str::to_owned).collect(),
            ..RequestLoggerConfig::default()
        };
        RequestLogger::with_config(ok_handler, config)
    }

    #[test]
    fn client_ip_takes_first_forwarded_token() {
        let logger = logger_with_headers(vec!["x-forwarded-for", "x-real-ip"]);
        let req = Request::builder()
            .header("x-forwarded-for", "1.2.3.4, 5.6.7.8")
            .build();
        assert_eq!(logger.client_ip(&req), "1.2.3.4");
    }

    #[test]
    fn client_ip_respects_header_priority() {
        let logger = logger_with_headers(vec!["x-forwarded-for", "x-real-ip"]);
        let req = Request::builder()
            .header("x-real-ip", "9.9.9.9")
            .build();
        assert_eq!(logger.client_ip(&req), "9.9.9.9");
    }

    #[test]
    fn client_ip_falls_back_to_peer_then_unknown() {
        let logger = logger_with_headers(vec!["x-forwarded-for"]);

        let req = Request::builder()
            .peer_addr("10.0.0.1:45234".parse().unwrap())
            .build();
        assert_eq!(logger.client_ip(&req), "10.0.0.1");

        let req = Request::builder().build();
        assert_eq!(logger.client_ip(&req), "unknown");
    }

    #[test]
    fn event_id_honors_configured_header() {
        let config = RequestLoggerConfig {
            event_id_header: Some("x-event-id".to_owned()),
            ..RequestLoggerConfig::default()
        };
        let logger = RequestLogger::with_config(ok_handler, config);

        let req = Request::builder().header("x-event-id", "evt-7").build();
        assert_eq!(logger.event_id(&req), "evt-7");

        // Absent header falls back to a generated uuid.
        let req = Request::builder().build();
        let id = logger.event_id(&req);
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn security_log_type_covers_access_control_statuses() {
        assert_eq!(failed_log_type(StatusCode::UNAUTHORIZED), LogType::Security);
        assert_eq!(failed_log_type(StatusCode::FORBIDDEN), LogType::Security);
        assert_eq!(failed_log_type(StatusCode::NOT_FOUND), LogType::Error);
        assert_eq!(
            failed_log_type(StatusCode::INTERNAL_SERVER_ERROR),
            LogType::Error
        );
    }
}
