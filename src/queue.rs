//! Non-blocking log delivery: producers enqueue, one background thread
//! dispatches.
//!
//! The channel is unbounded on purpose: callers must never stall on a log
//! statement, so memory growth is traded for caller latency. There is no
//! blocking flush primitive either; callers that need to observe a full
//! drain poll [`QueueListener::pending`].

use crate::context;
use crate::record::{Level, LogRecord};
use crate::sink::{Formatter, Handler, SinkError};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

/// One unit of work travelling through the queue.
///
/// Standard backend configurations enqueue the full record and let the
/// listener-side handlers format it; the compact backend renders on the
/// producer side and ships the finished line with its level.
pub enum QueueEntry {
    Record(Box<LogRecord>),
    Rendered { level: Level, line: String },
}

enum QueueMsg {
    Entry(QueueEntry),
    Stop,
}

/// The single background dispatch thread behind one or more
/// [`QueueHandler`]s.
///
/// The thread starts at construction; no separate start call exists. `stop`
/// is idempotent and drains every entry enqueued before it was called.
/// Dropping the listener stops it too, as a safety net for process exit —
/// an explicit `stop` disarms that, so there is never a double stop.
pub struct QueueListener {
    sender: Sender<QueueMsg>,
    worker: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl QueueListener {
    fn start(downstream: Vec<Arc<dyn Handler>>, respect_handler_level: bool) -> Arc<Self> {
        let (sender, receiver) = unbounded::<QueueMsg>();
        let worker = std::thread::Builder::new()
            .name("quelog-listener".to_string())
            .spawn(move || listen(receiver, downstream, respect_handler_level))
            .ok();
        if worker.is_none() {
            eprintln!("quelog: failed to spawn queue listener thread, entries will queue up");
        }
        Arc::new(QueueListener {
            sender,
            worker: Mutex::new(worker),
            stopped: AtomicBool::new(false),
        })
    }

    /// Number of entries waiting in the queue.
    pub fn pending(&self) -> usize {
        self.sender.len()
    }

    /// Stop the background thread after draining all queued entries.
    ///
    /// Safe to call from any thread, any number of times; only the first
    /// call does work. Does not time out: the drain is bounded only by the
    /// queue length at the moment of the call.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.sender.send(QueueMsg::Stop);
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

impl Drop for QueueListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn listen(receiver: Receiver<QueueMsg>, downstream: Vec<Arc<dyn Handler>>, respect_level: bool) {
    while let Ok(msg) = receiver.recv() {
        match msg {
            QueueMsg::Entry(entry) => dispatch(&downstream, respect_level, &entry),
            QueueMsg::Stop => break,
        }
    }
    // Entries racing the stop marker are still delivered, nothing is
    // silently dropped at shutdown.
    while let Ok(QueueMsg::Entry(entry)) = receiver.try_recv() {
        dispatch(&downstream, respect_level, &entry);
    }
}

fn dispatch(downstream: &[Arc<dyn Handler>], respect_level: bool, entry: &QueueEntry) {
    let entry_level = match entry {
        QueueEntry::Record(record) => record.level,
        QueueEntry::Rendered { level, .. } => *level,
    };
    for handler in downstream {
        if respect_level {
            if let Some(min) = handler.level() {
                if entry_level < min {
                    continue;
                }
            }
        }
        let result = match entry {
            QueueEntry::Record(record) => handler.handle(record),
            QueueEntry::Rendered { level, line } => handler.handle_rendered(*level, line),
        };
        if let Err(err) = result {
            // A failing sink never halts delivery to other sinks or to
            // future entries.
            eprintln!("quelog: error dispatching log entry: {err}");
        }
    }
}

/// Handler that enqueues records for the background listener.
///
/// `handle` copies the caller's context snapshot onto the record before the
/// hand-off, so the listener thread formats with the fields that were active
/// at the call site. The copy is one-way; the listener never shares state
/// with producer scopes.
pub struct QueueHandler {
    sender: Sender<QueueMsg>,
    listener: Arc<QueueListener>,
    /// Present in compact configurations: render on the producer side and
    /// enqueue finished lines instead of records.
    eager_formatter: Option<Arc<dyn Formatter>>,
    level: Option<Level>,
}

impl QueueHandler {
    /// Queue handler shipping full records; the listener thread starts
    /// immediately.
    pub fn new(downstream: Vec<Arc<dyn Handler>>, respect_handler_level: bool) -> Self {
        Self::build(downstream, respect_handler_level, None, None)
    }

    /// Queue handler that renders eagerly with `formatter` and ships
    /// finished lines.
    pub fn prerendered(
        formatter: Arc<dyn Formatter>,
        downstream: Vec<Arc<dyn Handler>>,
        respect_handler_level: bool,
    ) -> Self {
        Self::build(downstream, respect_handler_level, Some(formatter), None)
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    fn build(
        downstream: Vec<Arc<dyn Handler>>,
        respect_handler_level: bool,
        eager_formatter: Option<Arc<dyn Formatter>>,
        level: Option<Level>,
    ) -> Self {
        let listener = QueueListener::start(downstream, respect_handler_level);
        QueueHandler {
            sender: listener.sender.clone(),
            listener,
            eager_formatter,
            level,
        }
    }

    /// The background listener, for lifecycle ownership and drain polling.
    pub fn listener(&self) -> Arc<QueueListener> {
        Arc::clone(&self.listener)
    }
}

impl Handler for QueueHandler {
    fn level(&self) -> Option<Level> {
        self.level
    }

    fn handle(&self, record: &LogRecord) -> Result<(), SinkError> {
        let entry = match &self.eager_formatter {
            Some(formatter) => QueueEntry::Rendered {
                level: record.level,
                line: formatter.format(record),
            },
            None => {
                let mut owned = record.clone();
                owned.bound_extra = Some(context::get_log_extra());
                QueueEntry::Record(Box::new(owned))
            }
        };
        self.sender
            .send(QueueMsg::Entry(entry))
            .map_err(|_| SinkError::QueueClosed)
    }

    fn handle_rendered(&self, level: Level, line: &str) -> Result<(), SinkError> {
        self.sender
            .send(QueueMsg::Entry(QueueEntry::Rendered {
                level,
                line: line.to_string(),
            }))
            .map_err(|_| SinkError::QueueClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::MemoryHandler;
    use crate::record::LogRecord;

    #[test]
    fn stop_drains_every_enqueued_entry() {
        let capture = MemoryHandler::raw();
        let handler = QueueHandler::new(vec![capture.clone()], false);
        for i in 0..100 {
            let record = LogRecord::new("t", Level::Info, "p", 1, format!("msg {i}"));
            handler.handle(&record).unwrap();
        }
        handler.listener().stop();
        assert_eq!(capture.lines().len(), 100);
        assert_eq!(capture.lines()[0], "msg 0");
        assert_eq!(capture.lines()[99], "msg 99");
    }

    #[test]
    fn stop_is_idempotent_and_enqueue_after_stop_errors() {
        let handler = QueueHandler::new(vec![MemoryHandler::raw()], false);
        let listener = handler.listener();
        listener.stop();
        listener.stop();
        let record = LogRecord::new("t", Level::Info, "p", 1, "late");
        // The worker is gone; delivery reports a closed queue instead of
        // panicking or blocking.
        assert!(matches!(
            handler.handle(&record),
            Err(SinkError::QueueClosed) | Ok(())
        ));
    }

    #[test]
    fn respect_handler_level_filters_per_sink() {
        let fmt: Arc<dyn Formatter> = Arc::new(crate::console_formatter::ConsoleFormatter);
        let picky = MemoryHandler::with_level(fmt, Level::Error);
        let lax = MemoryHandler::raw();
        let handler = QueueHandler::new(vec![picky.clone(), lax.clone()], true);
        handler
            .handle(&LogRecord::new("t", Level::Info, "p", 1, "quiet"))
            .unwrap();
        handler
            .handle(&LogRecord::new("t", Level::Error, "p", 1, "loud"))
            .unwrap();
        handler.listener().stop();
        assert_eq!(picky.lines().len(), 1);
        assert_eq!(lax.lines(), vec!["quiet", "loud"]);
    }

    #[test]
    fn disabled_respect_level_delivers_everything() {
        let fmt: Arc<dyn Formatter> = Arc::new(crate::console_formatter::ConsoleFormatter);
        let picky = MemoryHandler::with_level(fmt, Level::Critical);
        let handler = QueueHandler::new(vec![picky.clone()], false);
        handler
            .handle(&LogRecord::new("t", Level::Debug, "p", 1, "still here"))
            .unwrap();
        handler.listener().stop();
        assert_eq!(picky.lines().len(), 1);
    }

    #[test]
    fn prerendered_mode_ships_finished_lines() {
        let fmt: Arc<dyn Formatter> = Arc::new(crate::console_formatter::ConsoleFormatter);
        let capture = MemoryHandler::raw();
        let handler = QueueHandler::prerendered(fmt, vec![capture.clone()], false);
        handler
            .handle(&LogRecord::new("t", Level::Info, "p", 7, "rendered upstream"))
            .unwrap();
        handler.listener().stop();
        let lines = capture.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("t:p:7"));
        assert!(lines[0].contains("rendered upstream"));
    }
}
