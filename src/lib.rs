//! Structured JSON logging with a non-blocking queue pipeline.
//!
//! The crate is built around five pieces:
//!
//! - **Context extras** ([`context`]): task-scoped extra fields that child
//!   tasks inherit as a copy, never as shared state.
//! - **Nested field merging** ([`merge`]): dotted keys like `http.status`
//!   expand into nested JSON objects.
//! - **Formatters** ([`json_formatter`], [`console_formatter`]): structured
//!   JSON output and a human-readable console line.
//! - **Queue delivery** ([`queue`]): producers enqueue and return, a single
//!   background thread formats and writes; stopping drains everything.
//! - **Lazy logger proxies** ([`proxy`]): `get_logger` works before
//!   configuration and resolves to the real logger on first use after it.
//!
//! # Quick start
//!
//! ```no_run
//! use quelog::{get_logger, update_log_extra, Logger, LoggingConfig};
//! use serde_json::json;
//!
//! let guard = LoggingConfig::default().configure().unwrap();
//!
//! let log = get_logger("api");
//! update_log_extra([("request_id".to_string(), json!("r-17"))].into_iter().collect());
//! log.info("handling request");
//!
//! guard.stop(); // drain on shutdown
//! ```

pub mod backend;
pub mod config;
pub mod console_formatter;
pub mod context;
pub mod env;
pub mod handlers;
pub mod json_formatter;
pub mod layer;
pub mod merge;
pub mod proxy;
pub mod queue;
pub mod record;
pub mod sink;

pub use backend::{Backend, BackendLogger};
pub use config::{
    ConfigError, FormatterConfig, HandlerConfig, LoggerConfig, LoggingConfig, LoggingGuard,
};
pub use console_formatter::ConsoleFormatter;
pub use context::{get_log_extra, set_log_extra, update_log_extra, LogExtraExt, WithLogExtra};
pub use env::{get_env, get_logging_level, logging_defaults};
pub use handlers::{ConsoleHandler, ConsoleStream, MemoryHandler, NullHandler};
pub use json_formatter::{JsonBackend, JsonFormatter};
pub use layer::{init_tracing_bridge, BridgeLayer};
pub use merge::merge_nested_fields;
pub use proxy::{
    get_logger, reset_proxy_loggers, setup_proxy_loggers, Logger, LoggerFactory, LoggerProxy,
};
pub use queue::{QueueHandler, QueueListener};
pub use record::{ErrorInfo, ExtraFields, Level, LogRecord};
pub use sink::{Formatter, Handler, SinkError};
