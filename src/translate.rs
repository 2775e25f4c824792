//! Translation of domain errors into HTTP responses and log-side error info.
//!
//! Errors are translated exactly once, at the pipeline boundary. The
//! translator has two outputs per failure:
//!
//! - the client-facing response — always `{"code":…,"message":…}` with the
//!   error's status, and for unclassified errors a *generic* message:
//!   internal error text never leaks into a response body;
//! - the [`ErrorInfo`] attached to the request context, which the logging
//!   middleware merges into the record. This side carries the real message
//!   and, policy permitting, the stack trace.

use serde::Serialize;

use crate::context::{Context, ErrorInfo};
use crate::error::{capture_trace, Classification, Error};
use crate::response::Response;

/// Client-facing error body.
#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
}

/// Maps [`Error`] values to responses and context error info.
#[derive(Clone, Copy, Debug)]
pub struct Translator {
    include_stack_trace: bool,
}

impl Translator {
    /// `include_stack_trace` gates trace capture for classified and HTTP
    /// errors. Unexpected errors keep their trace regardless — unknown
    /// failures must always be diagnosable.
    pub fn new(include_stack_trace: bool) -> Self {
        Self {
            include_stack_trace,
        }
    }

    /// Builds the client-facing response for `err`.
    ///
    /// Unclassified errors respond with the generic
    /// [`Classification::Unexpected`] reason; the real message stays in the
    /// log record only.
    pub fn response(&self, err: &Error) -> Response {
        let message = match err {
            Error::Unexpected { .. } => Classification::Unexpected.reason(),
            _ => err.reason(),
        };
        let body = ErrorBody {
            code: err.code(),
            message,
        };
        let bytes = serde_json::to_vec(&body).unwrap_or_else(|_| b"{}".to_vec());
        Response::builder().status(err.status()).json(bytes)
    }

    /// Attaches `err` to the request context for the logging middleware.
    ///
    /// At most one error info sticks per request (first failure wins, see
    /// [`Context`]). The stack trace follows the gating policy: captured
    /// here for classified/HTTP errors when enabled, always present for
    /// unexpected errors (taken from the error's own capture site).
    pub fn record(&self, ctx: &Context, err: &Error) {
        let stack_trace = match err.trace() {
            Some(trace) => Some(trace.to_vec()),
            None if self.include_stack_trace => Some(capture_trace()),
            None => None,
        };

        ctx.set_error_info(ErrorInfo {
            code: err.code().to_owned(),
            message: err.reason().to_owned(),
            http_status: err.status().as_u16(),
            stack_trace,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn classified_error_body_is_code_and_message() {
        let t = Translator::new(false);
        let resp = t.response(&Error::classified(Classification::AlreadyExists));
        assert_eq!(resp.status_code(), StatusCode::CONFLICT);
        assert_eq!(resp.body(), br#"{"code":"Is","message":"duplicate entity"}"#);
    }

    #[test]
    fn unexpected_error_never_leaks_internals_to_the_client() {
        let t = Translator::new(true);
        let resp = t.response(&Error::unexpected("password table corrupt at row 17"));
        assert_eq!(resp.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            resp.body(),
            br#"{"code":"Example","message":"unexpected error"}"#
        );
    }

    #[test]
    fn http_error_passes_status_and_message_through() {
        let t = Translator::new(false);
        let resp = t.response(&Error::http(StatusCode::UNPROCESSABLE_ENTITY, "bad payload"));
        assert_eq!(resp.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(resp.body(), br#"{"code":"HTTP","message":"bad payload"}"#);
    }

    #[test]
    fn stack_trace_gating_skips_classified_errors() {
        let ctx = Context::new();
        let t = Translator::new(false);
        t.record(&ctx, &Error::classified(Classification::NotFound));

        let info = ctx.error_info().unwrap();
        assert_eq!(info.code, "This");
        assert_eq!(info.http_status, 404);
        assert!(info.stack_trace.is_none());
    }

    #[test]
    fn stack_trace_gating_can_be_enabled() {
        let ctx = Context::new();
        let t = Translator::new(true);
        t.record(&ctx, &Error::classified(Classification::NotFound));

        let info = ctx.error_info().unwrap();
        assert!(info.stack_trace.is_some_and(|t| !t.is_empty()));
    }

    #[test]
    fn unexpected_keeps_trace_even_when_gated_off() {
        let ctx = Context::new();
        let t = Translator::new(false);
        t.record(&ctx, &Error::unexpected("boom"));

        let info = ctx.error_info().unwrap();
        assert_eq!(info.message, "boom");
        assert!(info.stack_trace.is_some_and(|t| !t.is_empty()));
    }
}
