//! Per-request mutable state.
//!
//! A [`Context`] is created by the middleware when a request enters the
//! pipeline and rides inside the [`Request`](crate::Request) from then on.
//! It carries the two things written deep in the call stack but read at the
//! outer boundary: the error info attached by the translator, and the
//! dependency-timing accumulator fed by instrumented data-access code.
//!
//! The context is request-scoped, never process-wide. Cloning is cheap (one
//! `Arc` bump) and every clone refers to the *same* request's state — two
//! different requests never share an inner. That isolation is what keeps
//! concurrent requests from contaminating each other's timings.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── ErrorInfo ─────────────────────────────────────────────────────────────────

/// Snapshot of a translated error, attached to the context by the
/// [`Translator`](crate::Translator) and merged into the log record at the
/// end of the request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    pub http_status: u16,
    /// One line per frame. `None` when stack-trace capture is gated off.
    pub stack_trace: Option<Vec<String>>,
}

// ── Context ───────────────────────────────────────────────────────────────────

/// Request-scoped state bag shared between the middleware, the translator,
/// and instrumented dependency code.
#[derive(Clone, Default)]
pub struct Context {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    error_info: Mutex<Option<ErrorInfo>>,
    db_timer: DbTimer,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches error info for the logging middleware to pick up.
    ///
    /// First write wins: a request fails once, and the record describes that
    /// first failure even if later stages also error.
    pub(crate) fn set_error_info(&self, info: ErrorInfo) {
        if let Ok(mut slot) = self.inner.error_info.lock() {
            slot.get_or_insert(info);
        }
    }

    /// The error info attached to this request, if any.
    pub fn error_info(&self) -> Option<ErrorInfo> {
        self.inner
            .error_info
            .lock()
            .ok()
            .and_then(|slot| slot.clone())
    }

    /// The dependency-timing accumulator for this request.
    pub fn db_timer(&self) -> &DbTimer {
        &self.inner.db_timer
    }
}

// ── DbTimer ───────────────────────────────────────────────────────────────────

/// Accumulates time spent in downstream data-access calls during one request.
///
/// The middleware resets it at request start and reads it once at request
/// end; instrumented code calls [`add`](DbTimer::add) after each unit of work
/// (e.g. one query). Lives inside the [`Context`], so it is isolated per
/// request by construction.
#[derive(Default)]
pub struct DbTimer {
    micros: AtomicU64,
    samples: AtomicU64,
}

impl DbTimer {
    /// Zeroes the accumulator. Called by the middleware at request start.
    pub fn reset(&self) {
        self.micros.store(0, Ordering::Relaxed);
        self.samples.store(0, Ordering::Relaxed);
    }

    /// Records one unit of dependency work.
    pub fn add(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.micros.fetch_add(micros, Ordering::Relaxed);
        self.samples.fetch_add(1, Ordering::Relaxed);
    }

    /// Total accumulated milliseconds, or `None` if nothing was recorded —
    /// the log record distinguishes "no dependency calls" from "0 ms".
    pub fn total_ms(&self) -> Option<f64> {
        if self.samples.load(Ordering::Relaxed) == 0 {
            return None;
        }
        Some(self.micros.load(Ordering::Relaxed) as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_distinguishes_untracked_from_zero() {
        let ctx = Context::new();
        assert_eq!(ctx.db_timer().total_ms(), None);

        ctx.db_timer().add(Duration::ZERO);
        assert_eq!(ctx.db_timer().total_ms(), Some(0.0));
    }

    #[test]
    fn timer_accumulates_and_resets() {
        let ctx = Context::new();
        ctx.db_timer().add(Duration::from_millis(3));
        ctx.db_timer().add(Duration::from_micros(500));
        assert_eq!(ctx.db_timer().total_ms(), Some(3.5));

        ctx.db_timer().reset();
        assert_eq!(ctx.db_timer().total_ms(), None);
    }

    #[test]
    fn first_error_info_wins() {
        let ctx = Context::new();
        ctx.set_error_info(ErrorInfo {
            code: "This".into(),
            message: "first".into(),
            http_status: 404,
            stack_trace: None,
        });
        ctx.set_error_info(ErrorInfo {
            code: "Example".into(),
            message: "second".into(),
            http_status: 500,
            stack_trace: None,
        });

        let info = ctx.error_info().unwrap();
        assert_eq!(info.message, "first");
    }

    #[test]
    fn clones_share_state_but_contexts_do_not() {
        let a = Context::new();
        let b = Context::new();
        let a2 = a.clone();

        a.db_timer().add(Duration::from_millis(7));
        assert_eq!(a2.db_timer().total_ms(), Some(7.0));
        assert_eq!(b.db_timer().total_ms(), None);
    }
}
