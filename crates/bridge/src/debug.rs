//! Per-call debug traces.
//!
//! When debug mode is on, the bridge times every call and hands a
//! [`DebugTrace`] to a [`DebugSink`] once the call has finished, whether it
//! succeeded or not. Traces never carry credentials or request bodies.
//!
//! A sink failure never changes the outcome of the call; the bridge reports it
//! as a `WARN` event and moves on.

use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::{self, Write as _};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use common::EndpointMode;
use time::format_description::well_known::Rfc2822;
use time::macros::format_description;
use time::OffsetDateTime;

/// Timing and transport diagnostics of a single call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugTrace {
    pub method: String,
    pub endpoint: EndpointMode,
    pub caller: Option<SocketAddr>,
    pub started_at: OffsetDateTime,
    pub finished_at: OffsetDateTime,
    /// Measured on a monotonic clock, independent of the wall-clock stamps.
    pub elapsed: Duration,
    /// Request line, sizes, status line or error; one entry per line.
    pub transport_log: Vec<String>,
}

impl DebugTrace {
    /// Elapsed seconds with four decimals, e.g. `"0.2531"`.
    pub fn elapsed_secs(&self) -> String {
        format!("{:.4}", self.elapsed.as_secs_f64())
    }

    pub fn caller_display(&self) -> String {
        self.caller
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| "unknown".into())
    }

    /// Render the plain-text block written by [`FileDebugSink`].
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Starting request trace");
        let _ = writeln!(out, "{}", rfc2822(self.started_at));
        let _ = writeln!(out, "Request from: {}", self.caller_display());
        let _ = writeln!(out, "####################");
        let _ = writeln!(out, "About to start request at {} UTC", precise(self.started_at));
        for line in &self.transport_log {
            let _ = writeln!(out, "{line}");
        }
        let _ = writeln!(out, "################################");
        let _ = writeln!(out, "Finished at {} UTC", precise(self.finished_at));
        let _ = writeln!(out, "Request took: {} seconds", self.elapsed_secs());
        out.push('\n');
        out
    }
}

fn rfc2822(at: OffsetDateTime) -> String {
    at.format(&Rfc2822)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

fn precise(at: OffsetDateTime) -> String {
    let format =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:6]");
    at.format(&format)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

/// Receives one trace per call. Implementations must be safe to call from
/// concurrent requests.
pub trait DebugSink: Send + Sync {
    /// # Errors
    ///
    /// Returns any I/O error raised while persisting the trace.
    fn record(&self, trace: &DebugTrace) -> io::Result<()>;
}

// ---------------------------------------------------------------------------
// File sink
// ---------------------------------------------------------------------------

/// Appends rendered traces to a file, creating it if necessary.
///
/// The file is opened per trace and each trace is written with a single
/// `write_all` while holding the sink's lock, so blocks from concurrent calls
/// never interleave.
#[derive(Debug)]
pub struct FileDebugSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileDebugSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DebugSink for FileDebugSink {
    fn record(&self, trace: &DebugTrace) -> io::Result<()> {
        let block = trace.render();
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(block.as_bytes())?;
        file.flush()
    }
}

// ---------------------------------------------------------------------------
// Tracing sink
// ---------------------------------------------------------------------------

/// Emits each trace as one structured `DEBUG` event.
///
/// Used when debug mode is on but no log file is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDebugSink;

impl DebugSink for TracingDebugSink {
    fn record(&self, trace: &DebugTrace) -> io::Result<()> {
        tracing::debug!(
            method = %trace.method,
            endpoint = %trace.endpoint,
            caller = %trace.caller_display(),
            started_at = %precise(trace.started_at),
            finished_at = %precise(trace.finished_at),
            elapsed_secs = %trace.elapsed_secs(),
            transport_log = ?trace.transport_log,
            "request trace"
        );
        Ok(())
    }
}
