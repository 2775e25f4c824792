//! Error taxonomy: wire-stable classifications and the domain [`Error`].
//!
//! Business failures are values, not control-flow surprises. A handler that
//! cannot find an entity returns `Err(Error::classified(Classification::NotFound))`
//! and the error travels up to exactly one translation point at the pipeline
//! boundary (see [`Translator`](crate::Translator)). Nothing in between
//! inspects or rewrites it.

use std::backtrace::Backtrace;

use http::StatusCode;

/// Sentinel code for errors that pass a framework-level HTTP status through
/// verbatim rather than mapping to a [`Classification`].
pub const HTTP_ERROR_CODE: &str = "HTTP";

// ── Classification ────────────────────────────────────────────────────────────

/// A named category of business error.
///
/// Each classification carries a fixed `(status, code, reason)` triple. The
/// codes are **wire identifiers**: clients and alerting rules key on them, so
/// they never change across releases even when the human-readable reason does.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Classification {
    /// The requested entity does not exist. 404, code `"This"`.
    NotFound,
    /// A uniqueness constraint was violated. 409, code `"Is"`.
    AlreadyExists,
    /// The catch-all for anything unclassified. 500, code `"Example"`.
    Unexpected,
}

impl Classification {
    /// HTTP status for this classification.
    pub fn status(self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::AlreadyExists => StatusCode::CONFLICT,
            Self::Unexpected => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable wire code for this classification.
    pub fn code(self) -> &'static str {
        match self {
            Self::NotFound => "This",
            Self::AlreadyExists => "Is",
            Self::Unexpected => "Example",
        }
    }

    /// Default human-readable reason, used when no custom reason is given.
    pub fn reason(self) -> &'static str {
        match self {
            Self::NotFound => "entity not found",
            Self::AlreadyExists => "duplicate entity",
            Self::Unexpected => "unexpected error",
        }
    }
}

// ── Error ─────────────────────────────────────────────────────────────────────

/// The domain error raised by handlers and translated once at the boundary.
///
/// Three shapes:
///
/// - [`Classified`](Error::Classified) — a known business error, optionally
///   with a custom reason (falls back to the classification default).
/// - [`Http`](Error::Http) — a framework-level HTTP error passed through
///   verbatim; its wire code is the [`HTTP_ERROR_CODE`] sentinel.
/// - [`Unexpected`](Error::Unexpected) — anything unclassified, including
///   caught handler panics. Always carries the trace captured at
///   construction so unknown failures stay diagnosable.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{reason}")]
    Classified {
        classification: Classification,
        reason: String,
    },

    #[error("{message}")]
    Http { status: StatusCode, message: String },

    #[error("{message}")]
    Unexpected { message: String, trace: Vec<String> },
}

impl Error {
    /// A classified error with the classification's default reason.
    pub fn classified(classification: Classification) -> Self {
        Self::Classified {
            classification,
            reason: classification.reason().to_owned(),
        }
    }

    /// A classified error with a custom reason.
    ///
    /// An empty reason falls back to the classification default — the reason
    /// is never empty by construction.
    pub fn with_reason(classification: Classification, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::Classified {
            classification,
            reason: if reason.is_empty() {
                classification.reason().to_owned()
            } else {
                reason
            },
        }
    }

    /// Wraps a framework-level HTTP error verbatim.
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Http {
            status,
            message: if message.is_empty() {
                Classification::Unexpected.reason().to_owned()
            } else {
                message
            },
        }
    }

    /// The catch-all. Captures a backtrace at the call site.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
            trace: capture_trace(),
        }
    }

    /// HTTP status for this error. Always a valid status by construction:
    /// classifications map to fixed codes and [`Error::http`] takes a parsed
    /// [`StatusCode`].
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Classified { classification, .. } => classification.status(),
            Self::Http { status, .. } => *status,
            Self::Unexpected { .. } => Classification::Unexpected.status(),
        }
    }

    /// Wire code: the classification code, or [`HTTP_ERROR_CODE`].
    pub fn code(&self) -> &'static str {
        match self {
            Self::Classified { classification, .. } => classification.code(),
            Self::Http { .. } => HTTP_ERROR_CODE,
            Self::Unexpected { .. } => Classification::Unexpected.code(),
        }
    }

    /// Human-readable reason. Never empty.
    pub fn reason(&self) -> &str {
        match self {
            Self::Classified { reason, .. } => reason,
            Self::Http { message, .. } => message,
            Self::Unexpected { message, .. } => message,
        }
    }

    /// The trace captured when an [`Unexpected`](Error::Unexpected) error was
    /// constructed. `None` for classified and HTTP errors.
    pub fn trace(&self) -> Option<&[String]> {
        match self {
            Self::Unexpected { trace, .. } => Some(trace),
            _ => None,
        }
    }
}

/// Any unclassified error source becomes [`Error::Unexpected`].
impl From<Box<dyn std::error::Error + Send + Sync>> for Error {
    fn from(e: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::unexpected(e.to_string())
    }
}

/// Captures the current backtrace as one owned line per frame.
pub(crate) fn capture_trace() -> Vec<String> {
    Backtrace::force_capture()
        .to_string()
        .lines()
        .map(str::to_owned)
        .collect()
}
