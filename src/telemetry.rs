/*!
 * Logging and run counters.
 *
 * `Telemetry` is created explicitly by the binary (or a test), handed to the
 * orchestrators that report into it, and shut down at exit. Creating it with
 * `init` installs the colourised stderr logger; `disabled` only keeps the
 * counters, which is what library users and tests normally want.
 */

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Logger writing coloured, timestamped lines to stderr
struct ConsoleLogger {
    level: LevelFilter,
}

impl ConsoleLogger {
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }

    fn tag_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "ERROR",
            Level::Warn => "WARN ",
            Level::Info => "INFO ",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                Self::tag_for_level(record.level()),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Counters at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TelemetrySnapshot {
    pub workflows_started: u64,
    pub workflows_completed: u64,
    pub workflows_failed: u64,
    pub workflows_cancelled: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
}

/// Logging and workflow counters shared by every orchestrator of a process
#[derive(Debug, Default)]
pub struct Telemetry {
    logger_installed: bool,
    started: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    tokens: AtomicU64,
    cost: Mutex<f64>,
}

impl Telemetry {
    /// Install the console logger at `level` and start counting
    pub fn init(level: LevelFilter) -> Result<Self, SetLoggerError> {
        log::set_boxed_logger(Box::new(ConsoleLogger { level: LevelFilter::Trace }))?;
        log::set_max_level(level);
        Ok(Self {
            logger_installed: true,
            ..Default::default()
        })
    }

    /// Counters only; leaves the global logger alone
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Change the maximum log level
    pub fn set_level(&self, level: LevelFilter) {
        log::set_max_level(level);
    }

    pub fn workflow_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn workflow_completed(&self, tokens: u64, cost: f64) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.tokens.fetch_add(tokens, Ordering::Relaxed);
        *self.cost.lock() += cost;
    }

    pub fn workflow_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn workflow_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            workflows_started: self.started.load(Ordering::Relaxed),
            workflows_completed: self.completed.load(Ordering::Relaxed),
            workflows_failed: self.failed.load(Ordering::Relaxed),
            workflows_cancelled: self.cancelled.load(Ordering::Relaxed),
            total_tokens: self.tokens.load(Ordering::Relaxed),
            total_cost: *self.cost.lock(),
        }
    }

    /// Log a summary of the counters and flush the logger
    pub fn shutdown(&self) -> TelemetrySnapshot {
        let snapshot = self.snapshot();
        if snapshot.workflows_started > 0 {
            info!(
                "Workflows: {} started, {} completed, {} failed, {} cancelled | {} tokens | ${:.6}",
                snapshot.workflows_started,
                snapshot.workflows_completed,
                snapshot.workflows_failed,
                snapshot.workflows_cancelled,
                snapshot.total_tokens,
                snapshot.total_cost
            );
        }
        if self.logger_installed {
            log::logger().flush();
        }
        snapshot
    }
}
