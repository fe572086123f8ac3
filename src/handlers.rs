//! Built-in record destinations: console, in-memory capture and no-op.

use crate::record::{Level, LogRecord};
use crate::sink::{Formatter, Handler, SinkError};
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

/// Stream a console handler writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleStream {
    #[default]
    Stdout,
    Stderr,
}

/// Writes formatted records to stdout or stderr, one line per record.
pub struct ConsoleHandler {
    formatter: Arc<dyn Formatter>,
    stream: ConsoleStream,
    level: Option<Level>,
}

impl ConsoleHandler {
    pub fn new(formatter: Arc<dyn Formatter>, stream: ConsoleStream, level: Option<Level>) -> Self {
        ConsoleHandler {
            formatter,
            stream,
            level,
        }
    }

    fn write_line(&self, line: &str) -> std::io::Result<()> {
        match self.stream {
            ConsoleStream::Stdout => {
                let stdout = std::io::stdout();
                let mut lock = stdout.lock();
                writeln!(lock, "{line}")
            }
            ConsoleStream::Stderr => {
                let stderr = std::io::stderr();
                let mut lock = stderr.lock();
                writeln!(lock, "{line}")
            }
        }
    }
}

impl Handler for ConsoleHandler {
    fn level(&self) -> Option<Level> {
        self.level
    }

    fn handle(&self, record: &LogRecord) -> Result<(), SinkError> {
        let line = self.formatter.format(record);
        self.write_line(&line).map_err(SinkError::from)
    }

    fn handle_rendered(&self, _level: Level, line: &str) -> Result<(), SinkError> {
        self.write_line(line).map_err(SinkError::from)
    }
}

/// Collects formatted lines in memory.
///
/// The capture destination for tests and diagnostics: keep a clone of the
/// `Arc`, mount it via `LoggingConfig::configure_with` or as a queue
/// downstream, then inspect [`MemoryHandler::lines`].
#[derive(Default)]
pub struct MemoryHandler {
    formatter: Option<Arc<dyn Formatter>>,
    lines: Mutex<Vec<String>>,
    level: Option<Level>,
}

impl MemoryHandler {
    /// Capture records formatted with `formatter`.
    pub fn new(formatter: Arc<dyn Formatter>) -> Arc<Self> {
        Arc::new(MemoryHandler {
            formatter: Some(formatter),
            lines: Mutex::new(Vec::new()),
            level: None,
        })
    }

    /// Capture rendered messages only, without any formatter.
    pub fn raw() -> Arc<Self> {
        Arc::new(MemoryHandler::default())
    }

    pub fn with_level(formatter: Arc<dyn Formatter>, level: Level) -> Arc<Self> {
        Arc::new(MemoryHandler {
            formatter: Some(formatter),
            lines: Mutex::new(Vec::new()),
            level: Some(level),
        })
    }

    /// Snapshot of everything captured so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn push(&self, line: String) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
    }
}

impl Handler for MemoryHandler {
    fn level(&self) -> Option<Level> {
        self.level
    }

    fn handle(&self, record: &LogRecord) -> Result<(), SinkError> {
        let line = match &self.formatter {
            Some(formatter) => formatter.format(record),
            None => record.rendered_message(),
        };
        self.push(line);
        Ok(())
    }

    fn handle_rendered(&self, _level: Level, line: &str) -> Result<(), SinkError> {
        self.push(line.to_string());
        Ok(())
    }
}

/// A handler that simply drops all records.
///
/// Useful for measuring the overhead of the pipeline itself without any
/// I/O, and for unit tests that don't care about output.
#[derive(Clone, Default)]
pub struct NullHandler;

impl Handler for NullHandler {
    fn handle(&self, _record: &LogRecord) -> Result<(), SinkError> {
        Ok(())
    }

    fn handle_rendered(&self, _level: Level, _line: &str) -> Result<(), SinkError> {
        Ok(())
    }
}
