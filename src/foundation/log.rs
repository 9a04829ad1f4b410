//! Level-tagged diagnostics.
//!
//! Components never write to a global directly: they receive a [`Logger`] at construction time.
//! For hosts that prefer to configure logging once, [`install`] registers a process-wide logger
//! that [`installed`] hands out; [`uninstall`] restores the silent default.

use std::sync::{Arc, RwLock};

/// Severity of a log line, ordered from least to most verbose.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Emit nothing.
    Quiet,
    /// Unrecoverable, process-level failure.
    Panic,
    /// Unrecoverable failure of one component.
    Fatal,
    /// Recoverable error.
    Error,
    /// Something unexpected that was worked around (e.g. a metadata fallback).
    Warning,
    /// Standard informational output.
    Info,
    /// Detailed informational output.
    Verbose,
    /// Debugging output.
    Debug,
    /// Extremely verbose debugging output.
    Trace,
}

impl From<LogLevel> for ffmpeg_next::util::log::Level {
    fn from(value: LogLevel) -> Self {
        use ffmpeg_next::util::log::Level;
        match value {
            LogLevel::Quiet => Level::Quiet,
            LogLevel::Panic => Level::Panic,
            LogLevel::Fatal => Level::Fatal,
            LogLevel::Error => Level::Error,
            LogLevel::Warning => Level::Warning,
            LogLevel::Info => Level::Info,
            LogLevel::Verbose => Level::Verbose,
            LogLevel::Debug => Level::Debug,
            LogLevel::Trace => Level::Trace,
        }
    }
}

/// Receiver of log lines.
pub trait LogSink: Send + Sync {
    /// Deliver one message. Never used for error propagation.
    fn emit(&self, level: LogLevel, message: &str);
}

impl<F> LogSink for F
where
    F: Fn(LogLevel, &str) + Send + Sync,
{
    fn emit(&self, level: LogLevel, message: &str) {
        self(level, message);
    }
}

/// Sink that drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    fn emit(&self, _level: LogLevel, _message: &str) {}
}

/// Sink that forwards into `tracing` events under the `frameseek` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Quiet => {}
            LogLevel::Panic | LogLevel::Fatal | LogLevel::Error => {
                tracing::error!(target: "frameseek", "{message}");
            }
            LogLevel::Warning => tracing::warn!(target: "frameseek", "{message}"),
            LogLevel::Info => tracing::info!(target: "frameseek", "{message}"),
            LogLevel::Verbose | LogLevel::Debug => {
                tracing::debug!(target: "frameseek", "{message}");
            }
            LogLevel::Trace => tracing::trace!(target: "frameseek", "{message}"),
        }
    }
}

/// Cloneable handle pairing a sink with a maximum level.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn LogSink>,
    level: LogLevel,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("sink_ptr", &Arc::as_ptr(&self.sink))
            .field("level", &self.level)
            .finish()
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::null()
    }
}

impl Logger {
    /// Wrap `sink`, forwarding messages at `level` or less verbose.
    pub fn new(sink: impl LogSink + 'static, level: LogLevel) -> Self {
        Self {
            sink: Arc::new(sink),
            level,
        }
    }

    /// Logger that emits nothing.
    pub fn null() -> Self {
        Self {
            sink: Arc::new(NullSink),
            level: LogLevel::Quiet,
        }
    }

    /// Logger forwarding into `tracing`.
    pub fn tracing(level: LogLevel) -> Self {
        Self::new(TracingSink, level)
    }

    /// Maximum level this logger forwards.
    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// `true` when a message at `level` would reach the sink.
    pub fn enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::Quiet && level <= self.level
    }

    /// Forward `message` when `level` is enabled.
    pub fn emit(&self, level: LogLevel, message: impl AsRef<str>) {
        if self.enabled(level) {
            self.sink.emit(level, message.as_ref());
        }
    }

    /// Emit at [`LogLevel::Error`].
    pub fn error(&self, message: impl AsRef<str>) {
        self.emit(LogLevel::Error, message);
    }

    /// Emit at [`LogLevel::Warning`].
    pub fn warning(&self, message: impl AsRef<str>) {
        self.emit(LogLevel::Warning, message);
    }

    /// Emit at [`LogLevel::Info`].
    pub fn info(&self, message: impl AsRef<str>) {
        self.emit(LogLevel::Info, message);
    }

    /// Emit at [`LogLevel::Debug`].
    pub fn debug(&self, message: impl AsRef<str>) {
        self.emit(LogLevel::Debug, message);
    }
}

static INSTALLED: RwLock<Option<Logger>> = RwLock::new(None);

/// Register `logger` process-wide and align FFmpeg's own log level with it.
///
/// Replaces any previously installed logger.
pub fn install(logger: Logger) {
    ffmpeg_next::util::log::set_level(logger.level().into());
    let mut slot = INSTALLED.write().unwrap_or_else(|e| e.into_inner());
    *slot = Some(logger);
}

/// The installed logger, or a silent one when nothing is installed.
pub fn installed() -> Logger {
    INSTALLED
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
        .unwrap_or_default()
}

/// Remove the installed logger and silence FFmpeg.
pub fn uninstall() {
    ffmpeg_next::util::log::set_level(LogLevel::Quiet.into());
    let mut slot = INSTALLED.write().unwrap_or_else(|e| e.into_inner());
    *slot = None;
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/log.rs"]
mod tests;
