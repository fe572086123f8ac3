//! Concrete loggers produced by the configured factory.

use crate::proxy::Logger;
use crate::record::{Level, LogRecord};
use crate::sink::Handler;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Which logging backend the configuration builds.
///
/// `Standard` ships full records through the pipeline. `Compact` is the
/// reduced-capability variant for hot paths: records are rendered before
/// they enter the queue and per-call extra fields are not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    #[default]
    Standard,
    Compact,
}

/// Logger dispatching records to a fixed set of handlers.
///
/// The level is adjustable at runtime; the handler set is fixed at
/// configuration time. Each handler's own minimum level is honored before
/// dispatch, and a failing handler is reported to stderr without affecting
/// the others.
pub struct BackendLogger {
    name: String,
    level_bits: AtomicU8,
    handlers: Vec<Arc<dyn Handler>>,
    /// Compact backend: drop per-call extras, the reduced pipeline cannot
    /// carry them.
    strip_extra: bool,
}

impl BackendLogger {
    pub fn new(name: impl Into<String>, level: Level, handlers: Vec<Arc<dyn Handler>>) -> Self {
        BackendLogger {
            name: name.into(),
            level_bits: AtomicU8::new(level.to_bits()),
            handlers,
            strip_extra: false,
        }
    }

    pub fn with_stripped_extra(mut self) -> Self {
        self.strip_extra = true;
        self
    }
}

impl Logger for BackendLogger {
    fn name(&self) -> &str {
        &self.name
    }

    fn level(&self) -> Level {
        Level::from_bits(self.level_bits.load(Ordering::Relaxed))
    }

    fn set_level(&self, level: Level) {
        self.level_bits.store(level.to_bits(), Ordering::Relaxed);
    }

    fn log_record(&self, record: LogRecord) {
        if record.level < self.level() {
            return;
        }
        let record = if self.strip_extra && !record.extra.is_empty() {
            let mut stripped = record;
            stripped.extra.clear();
            stripped
        } else {
            record
        };
        for handler in &self.handlers {
            if let Some(min) = handler.level() {
                if record.level < min {
                    continue;
                }
            }
            if let Err(err) = handler.handle(&record) {
                eprintln!("quelog: log handler failed: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::MemoryHandler;
    use serde_json::json;

    #[test]
    fn records_below_the_logger_level_are_dropped() {
        let capture = MemoryHandler::raw();
        let logger = BackendLogger::new("t", Level::Warning, vec![capture.clone()]);
        logger.info("too quiet");
        logger.error("loud enough");
        assert_eq!(capture.lines().len(), 1);
    }

    #[test]
    fn set_level_takes_effect_immediately() {
        let capture = MemoryHandler::raw();
        let logger = BackendLogger::new("t", Level::Error, vec![capture.clone()]);
        logger.info("dropped");
        logger.set_level(Level::Debug);
        logger.info("kept");
        assert_eq!(capture.lines(), vec!["kept"]);
    }

    #[test]
    fn handler_minimum_level_is_honored() {
        let fmt: Arc<dyn crate::sink::Formatter> =
            Arc::new(crate::console_formatter::ConsoleFormatter);
        let picky = MemoryHandler::with_level(fmt, Level::Critical);
        let logger = BackendLogger::new("t", Level::Debug, vec![picky.clone()]);
        logger.error("not critical");
        logger.critical("critical");
        assert_eq!(picky.lines().len(), 1);
    }

    #[test]
    fn compact_backend_strips_per_call_extras() {
        let capture = MemoryHandler::raw();
        let logger =
            BackendLogger::new("t", Level::Debug, vec![capture.clone()]).with_stripped_extra();
        logger.log_with_extra(
            Level::Info,
            "msg",
            [("k".to_string(), json!("v"))].into_iter().collect(),
        );
        assert_eq!(capture.lines(), vec!["msg"]);
    }

    #[test]
    fn exception_attaches_error_details() {
        struct RecordingHandler(std::sync::Mutex<Vec<LogRecord>>);
        impl Handler for RecordingHandler {
            fn handle(&self, record: &LogRecord) -> Result<(), crate::sink::SinkError> {
                self.0.lock().unwrap().push(record.clone());
                Ok(())
            }
            fn handle_rendered(
                &self,
                _level: Level,
                _line: &str,
            ) -> Result<(), crate::sink::SinkError> {
                Ok(())
            }
        }

        let recorder = Arc::new(RecordingHandler(std::sync::Mutex::new(Vec::new())));
        let logger = BackendLogger::new("t", Level::Debug, vec![recorder.clone()]);
        let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        logger.exception("request failed", &err);

        let records = recorder.0.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, Level::Error);
        let info = records[0].error.as_ref().unwrap();
        assert!(info.message.contains("boom"));
    }
}
