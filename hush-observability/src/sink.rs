//! Destinations for rendered exchange records.

use crate::log_record::LogRecord;
use hush_core::{HushError, LogLevel};
use std::sync::Mutex;

/// Target used for every exchange record emitted through `tracing`.
pub const EXCHANGE_TARGET: &str = "hush::exchange";

/// A logging backend. Implementations must tolerate concurrent calls.
pub trait LogSink: Send + Sync {
    /// Emit one record. `line` is the record already rendered in the
    /// configured format.
    fn emit(&self, record: &LogRecord, line: &str) -> Result<(), HushError>;
}

/// Emits records as `tracing` events at the record's level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, record: &LogRecord, line: &str) -> Result<(), HushError> {
        let direction = record.direction.as_str();
        let id = record.id.as_deref().unwrap_or("-");
        match record.level {
            LogLevel::Off => {}
            LogLevel::Error => {
                tracing::error!(target: EXCHANGE_TARGET, direction, id, "{line}")
            }
            LogLevel::Warn => {
                tracing::warn!(target: EXCHANGE_TARGET, direction, id, "{line}")
            }
            LogLevel::Info => {
                tracing::info!(target: EXCHANGE_TARGET, direction, id, "{line}")
            }
            LogLevel::Debug => {
                tracing::debug!(target: EXCHANGE_TARGET, direction, id, "{line}")
            }
            LogLevel::Trace => {
                tracing::trace!(target: EXCHANGE_TARGET, direction, id, "{line}")
            }
        }
        Ok(())
    }
}

/// Keeps every record in memory. Used by tests and by embedders that ship
/// records somewhere themselves.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<(LogRecord, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.lock().iter().map(|(r, _)| r.clone()).collect()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lock().iter().map(|(_, l)| l.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(LogRecord, String)>> {
        // a panic while holding the lock cannot leave the Vec half-written
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LogSink for MemorySink {
    fn emit(&self, record: &LogRecord, line: &str) -> Result<(), HushError> {
        self.lock().push((record.clone(), line.to_string()));
        Ok(())
    }
}

/// A sink that always fails. Useful for exercising fallback paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingSink;

impl LogSink for FailingSink {
    fn emit(&self, _record: &LogRecord, _line: &str) -> Result<(), HushError> {
        Err(HushError::Sink("sink unavailable".to_string()))
    }
}
