//! The structured log record and its sink.
//!
//! One request, one JSON object, one line. The record is built by the
//! middleware at the end of the request, serialized with serde_json (which
//! writes non-ASCII characters literally, not `\u`-escaped), handed to a
//! [`LogSink`], and discarded.

use std::io::{self, Write};
use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;

/// Timestamp format matching the wire example: `2024-01-01T12:00:00.000000Z`.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Current UTC time in the record's fixed format.
pub(crate) fn timestamp_utc() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

// ── Record types ──────────────────────────────────────────────────────────────

/// Coarse outcome bucket, distinct from the numeric status. Alerting routes
/// on this: `security` marks access-control rejections (401/403 raised as
/// errors), which are not application defects.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    Access,
    Error,
    Security,
}

/// Severity of the emitted record.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum Level {
    #[serde(rename = "INFO")]
    Info,
    #[serde(rename = "ERROR")]
    Error,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Error => "ERROR",
        }
    }
}

/// Error details merged into the record when the request failed.
#[derive(Debug, Serialize)]
pub struct ErrorField {
    pub code: String,
    pub message: String,
    pub stack_trace: Option<Vec<String>>,
}

/// One request's worth of structured log output.
///
/// Field order is the wire order. Created at request end, emitted once,
/// immediately discarded — never persisted by this crate.
#[derive(Debug, Serialize)]
pub struct LogRecord {
    pub timestamp: String,
    pub event_id: String,
    pub method: String,
    pub path: String,
    pub client_ip: String,
    pub user_agent: Option<String>,
    pub error: Option<ErrorField>,
    pub time_taken_ms: u64,
    pub status_code: u16,
    pub log_type: LogType,
    pub level: Level,
    pub db_query_time_ms: Option<f64>,
}

// ── LogSink ───────────────────────────────────────────────────────────────────

/// Destination for emitted records.
///
/// `line` is one complete JSON object without a trailing newline.
/// Implementations must append each line **atomically** — concurrent
/// requests share the sink, and interleaved partial lines corrupt the
/// stream. Failures are reported back to the middleware, which swallows
/// them; a sink error never alters an HTTP response.
pub trait LogSink: Send + Sync {
    fn emit(&self, level: Level, line: &str) -> io::Result<()>;
}

/// Appends records to stdout, one line per record, as a single write on the
/// locked handle.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn emit(&self, _level: Level, line: &str) -> io::Result<()> {
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        let mut out = io::stdout().lock();
        out.write_all(buf.as_bytes())?;
        out.flush()
    }
}

/// Collects records in memory. Meant for tests — both this crate's and
/// those of embedding services.
#[derive(Debug, Default)]
pub struct CaptureSink {
    entries: Mutex<Vec<(Level, String)>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emitted lines, in emission order.
    pub fn lines(&self) -> Vec<String> {
        self.entries
            .lock()
            .map(|e| e.iter().map(|(_, line)| line.clone()).collect())
            .unwrap_or_default()
    }

    /// Emitted `(level, line)` pairs, in emission order.
    pub fn entries(&self) -> Vec<(Level, String)> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl LogSink for CaptureSink {
    fn emit(&self, level: Level, line: &str) -> io::Result<()> {
        self.entries
            .lock()
            .map_err(|_| io::Error::other("capture sink poisoned"))?
            .push((level, line.to_owned()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serializes_in_wire_order() {
        let record = LogRecord {
            timestamp: "2024-01-01T12:00:00.000000Z".into(),
            event_id: "e-1".into(),
            method: "GET".into(),
            path: "/items/1".into(),
            client_ip: "10.0.0.1".into(),
            user_agent: Some("curl/8.0".into()),
            error: None,
            time_taken_ms: 12,
            status_code: 200,
            log_type: LogType::Access,
            level: Level::Info,
            db_query_time_ms: None,
        };

        let line = serde_json::to_string(&record).unwrap();
        assert!(line.starts_with(r#"{"timestamp":"2024-01-01T12:00:00.000000Z","event_id":"e-1""#));
        assert!(line.contains(r#""log_type":"access""#));
        assert!(line.contains(r#""level":"INFO""#));
        assert!(line.contains(r#""error":null"#));
        assert!(line.contains(r#""db_query_time_ms":null"#));
    }

    #[test]
    fn non_ascii_is_preserved_literally() {
        let record = LogRecord {
            timestamp: timestamp_utc(),
            event_id: "e-2".into(),
            method: "POST".into(),
            path: "/items".into(),
            client_ip: "unknown".into(),
            user_agent: None,
            error: Some(ErrorField {
                code: "Is".into(),
                message: "동일한 item 이 이미 존재합니다.".into(),
                stack_trace: None,
            }),
            time_taken_ms: 0,
            status_code: 409,
            log_type: LogType::Error,
            level: Level::Error,
            db_query_time_ms: Some(1.5),
        };

        let line = serde_json::to_string(&record).unwrap();
        assert!(line.contains("동일한 item"));
        assert!(!line.contains("\\u"));
    }

    #[test]
    fn timestamp_has_microsecond_precision() {
        let ts = timestamp_utc();
        // 2024-01-01T12:00:00.000000Z
        assert_eq!(ts.len(), 27);
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.as_bytes()[19], b'.');
    }

    #[test]
    fn capture_sink_records_levels() {
        let sink = CaptureSink::new();
        sink.emit(Level::Info, "{}").unwrap();
        sink.emit(Level::Error, "{}").unwrap();
        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, Level::Info);
        assert_eq!(entries[1].0, Level::Error);
    }
}
