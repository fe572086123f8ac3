use crate::record::{Level, LogRecord};
use std::error::Error;

/// Turns a [`LogRecord`] into its final textual representation.
///
/// Formatters are shared between handlers (the console handler and the queue
/// pipeline may reference the same instance), so implementations must be
/// cheap to call and free of interior mutability visible to callers.
pub trait Formatter: Send + Sync {
    /// Render a single record. Each record is formatted exactly once per
    /// handler that consumes it.
    fn format(&self, record: &LogRecord) -> String;
}

/// Destination for log records produced by a logger.
///
/// Implementations transport records to a concrete target (stdout, an
/// in-memory buffer, the background queue). `handle` is called either from
/// the application thread that logged, or from the queue listener's
/// dispatch thread; it must be safe for both.
///
/// Failures are returned, never panicked: the dispatching side reports the
/// error and continues, so one bad sink cannot halt delivery to other sinks
/// or to future records.
pub trait Handler: Send + Sync {
    /// Minimum level this handler wants, if it filters at all.
    ///
    /// The dispatching side performs the comparison; `handle` itself should
    /// not re-filter.
    fn level(&self) -> Option<Level> {
        None
    }

    /// Deliver a single record to the underlying destination.
    fn handle(&self, record: &LogRecord) -> Result<(), SinkError>;

    /// Deliver a line that was already rendered upstream.
    ///
    /// Used by the queue pipeline when the configuration pre-renders entries
    /// on the producer side; `level` is the originating record's level so
    /// that per-handler filtering still works.
    fn handle_rendered(&self, level: Level, line: &str) -> Result<(), SinkError>;
}

/// Failure while delivering a record to a sink.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("i/o error writing log entry: {0}")]
    Io(#[from] std::io::Error),

    #[error("log queue is closed")]
    QueueClosed,

    #[error("{0}")]
    Other(Box<dyn Error + Send + Sync>),
}
