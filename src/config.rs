//! Declarative logging configuration.
//!
//! [`LoggingConfig`] fills in built-in formatters (`standard`, `json_fmt`)
//! and handlers (`console`, `queue_handler`), validates everything up
//! front, builds the handler graph and binds a logger factory into the
//! proxy registry. Configuration failures are loud and synchronous;
//! anything that goes wrong later, during delivery, is contained by the
//! pipeline instead.

use crate::backend::{Backend, BackendLogger};
use crate::console_formatter::ConsoleFormatter;
use crate::env::get_logging_level;
use crate::handlers::{ConsoleHandler, ConsoleStream};
use crate::json_formatter::{JsonBackend, JsonFormatter};
use crate::proxy::{install_factory, Logger, LoggerFactory};
use crate::queue::{QueueHandler, QueueListener};
use crate::record::Level;
use crate::sink::{Formatter, Handler};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Once};

pub const FORMATTER_STANDARD: &str = "standard";
pub const FORMATTER_JSON: &str = "json_fmt";
pub const HANDLER_CONSOLE: &str = "console";
pub const HANDLER_QUEUE: &str = "queue_handler";

/// Error raised while validating or applying a [`LoggingConfig`].
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("unsupported logging config version {0}, the only supported value is 1")]
    UnsupportedVersion(u32),

    #[error(
        "the `simd_json` serialization backend is not compiled in; \
         rebuild with `--features simd` or select `serde_json`"
    )]
    MissingJsonBackend,

    #[error("handler {handler:?} references unknown formatter {formatter:?}")]
    UnknownFormatter { handler: String, formatter: String },

    #[error("{referrer:?} references unknown handler {handler:?}")]
    UnknownHandler { referrer: String, handler: String },
}

/// A named formatter definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FormatterConfig {
    /// Human-readable text with a `{k = v}` extras trailer.
    Standard,
    /// Structured JSON output.
    Json,
}

fn default_queue_downstream() -> Vec<String> {
    vec![HANDLER_CONSOLE.to_string()]
}

fn default_formatter_name() -> String {
    FORMATTER_JSON.to_string()
}

fn default_true() -> bool {
    true
}

/// A named handler definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HandlerConfig {
    Console {
        #[serde(default = "default_formatter_name")]
        formatter: String,
        #[serde(default)]
        stream: ConsoleStream,
        #[serde(default)]
        level: Option<Level>,
    },
    Queue {
        /// Used when the compact backend pre-renders entries; the standard
        /// backend formats downstream instead.
        #[serde(default = "default_formatter_name")]
        formatter: String,
        /// Names of the handlers the background listener dispatches to.
        #[serde(default = "default_queue_downstream")]
        handlers: Vec<String>,
        #[serde(default = "default_true")]
        respect_handler_level: bool,
        #[serde(default)]
        level: Option<Level>,
    },
}

impl HandlerConfig {
    fn formatter_name(&self) -> &str {
        match self {
            HandlerConfig::Console { formatter, .. } | HandlerConfig::Queue { formatter, .. } => {
                formatter
            }
        }
    }

    fn set_formatter(&mut self, name: &str) {
        match self {
            HandlerConfig::Console { formatter, .. } | HandlerConfig::Queue { formatter, .. } => {
                *formatter = name.to_string();
            }
        }
    }
}

/// Per-logger overrides; also the shape of the root logger config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub level: Option<Level>,
    pub handlers: Vec<String>,
}

/// Declarative configuration for the whole logging system.
///
/// A `Default` instance is fully usable: JSON output through the queue
/// handler onto the console, level from `LOGGING_LEVEL`. Every field can
/// also be deserialized from a config file; missing fields fall back to the
/// same defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Standard or compact (reduced-capability) backend.
    pub backend: Backend,
    /// JSON serialization backend for the `json_fmt` formatter.
    pub json_backend: JsonBackend,
    /// Config schema version; only `1` is supported.
    pub version: u32,
    /// Re-resolve already-resolved logger proxies on configure.
    pub disable_existing_loggers: bool,
    /// Accepted for schema parity; no built-in filter kinds exist.
    pub filters: HashMap<String, Value>,
    pub formatters: HashMap<String, FormatterConfig>,
    pub handlers: HashMap<String, HandlerConfig>,
    pub loggers: HashMap<String, LoggerConfig>,
    pub root: LoggerConfig,
    /// Final patch of handler-name → formatter-name, applied over whatever
    /// the handlers already reference.
    pub override_formatters: HashMap<String, String>,
    /// Global level for the root logger and any logger without an override.
    pub level: Level,
    /// Merge per-call extra fields into JSON output. Not supported by the
    /// compact backend; forced off there, with a one-time warning.
    pub capture_extra_fields: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            backend: Backend::default(),
            json_backend: JsonBackend::preferred(),
            version: 1,
            disable_existing_loggers: false,
            filters: HashMap::new(),
            formatters: HashMap::new(),
            handlers: HashMap::new(),
            loggers: HashMap::new(),
            root: LoggerConfig::default(),
            override_formatters: HashMap::new(),
            level: get_logging_level(),
            capture_extra_fields: false,
        }
    }
}

/// Validated configuration with every built-in filled in.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedConfig {
    pub formatters: HashMap<String, FormatterConfig>,
    pub handlers: HashMap<String, HandlerConfig>,
    pub loggers: HashMap<String, LoggerConfig>,
    pub root: LoggerConfig,
    pub level: Level,
    pub capture_extra_fields: bool,
    pub backend: Backend,
    pub json_backend: JsonBackend,
}

impl LoggingConfig {
    /// Validate and fill defaults without building anything.
    pub(crate) fn prepare(&self) -> Result<ResolvedConfig, ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::UnsupportedVersion(self.version));
        }
        if !self.json_backend.is_available() {
            return Err(ConfigError::MissingJsonBackend);
        }

        let mut formatters = self.formatters.clone();
        formatters
            .entry(FORMATTER_STANDARD.to_string())
            .or_insert(FormatterConfig::Standard);
        formatters
            .entry(FORMATTER_JSON.to_string())
            .or_insert(FormatterConfig::Json);

        let mut handlers = self.handlers.clone();
        handlers
            .entry(HANDLER_CONSOLE.to_string())
            .or_insert(HandlerConfig::Console {
                formatter: default_formatter_name(),
                stream: ConsoleStream::Stdout,
                level: None,
            });
        handlers
            .entry(HANDLER_QUEUE.to_string())
            .or_insert(HandlerConfig::Queue {
                formatter: default_formatter_name(),
                handlers: default_queue_downstream(),
                respect_handler_level: true,
                level: None,
            });

        for (handler_name, formatter_name) in &self.override_formatters {
            match handlers.get_mut(handler_name) {
                Some(handler) => handler.set_formatter(formatter_name),
                None => {
                    return Err(ConfigError::UnknownHandler {
                        referrer: "override_formatters".to_string(),
                        handler: handler_name.clone(),
                    })
                }
            }
        }

        let mut capture_extra_fields = self.capture_extra_fields;
        if capture_extra_fields && self.backend == Backend::Compact {
            warn_capture_unsupported();
            capture_extra_fields = false;
        }

        let mut root = self.root.clone();
        if root.handlers.is_empty() {
            root.handlers = vec![HANDLER_QUEUE.to_string()];
        }

        Ok(ResolvedConfig {
            formatters,
            handlers,
            loggers: self.loggers.clone(),
            root,
            level: self.level,
            capture_extra_fields,
            backend: self.backend,
            json_backend: self.json_backend,
        })
    }

    /// Build the handler graph and bind the logger factory.
    ///
    /// The returned [`LoggingGuard`] owns every background listener; hold
    /// it for the process lifetime and drop (or `stop`) it on the way out
    /// so queued entries are drained.
    pub fn configure(&self) -> Result<LoggingGuard, ConfigError> {
        self.configure_with(HashMap::new())
    }

    /// Like [`configure`](Self::configure), additionally mounting pre-built
    /// handler instances under config-referenced names.
    ///
    /// A pre-built handler shadows a config-declared handler with the same
    /// name, which is the hook for custom sinks and for test capture.
    pub fn configure_with(
        &self,
        prebuilt: HashMap<String, Arc<dyn Handler>>,
    ) -> Result<LoggingGuard, ConfigError> {
        let resolved = self.prepare()?;

        let mut formatter_instances: HashMap<String, Arc<dyn Formatter>> = HashMap::new();
        for (name, formatter) in &resolved.formatters {
            let instance: Arc<dyn Formatter> = match formatter {
                FormatterConfig::Standard => Arc::new(ConsoleFormatter),
                FormatterConfig::Json => Arc::new(JsonFormatter::new(
                    resolved.json_backend,
                    resolved.capture_extra_fields,
                )),
            };
            formatter_instances.insert(name.clone(), instance);
        }

        let formatter_for = |handler_name: &str, formatter_name: &str| {
            formatter_instances
                .get(formatter_name)
                .cloned()
                .ok_or_else(|| ConfigError::UnknownFormatter {
                    handler: handler_name.to_string(),
                    formatter: formatter_name.to_string(),
                })
        };

        // Leaf handlers first, then queue handlers referencing them.
        let mut handler_instances: HashMap<String, Arc<dyn Handler>> = prebuilt;
        for (name, handler) in &resolved.handlers {
            if handler_instances.contains_key(name) {
                continue;
            }
            if let HandlerConfig::Console {
                formatter,
                stream,
                level,
            } = handler
            {
                let instance = ConsoleHandler::new(formatter_for(name, formatter)?, *stream, *level);
                handler_instances.insert(name.clone(), Arc::new(instance));
            }
        }

        let mut listeners = Vec::new();
        for (name, handler) in &resolved.handlers {
            if handler_instances.contains_key(name) {
                continue;
            }
            if let HandlerConfig::Queue {
                formatter,
                handlers: downstream_names,
                respect_handler_level,
                level,
            } = handler
            {
                let mut downstream = Vec::with_capacity(downstream_names.len());
                for downstream_name in downstream_names {
                    let instance = handler_instances.get(downstream_name).cloned().ok_or_else(
                        || ConfigError::UnknownHandler {
                            referrer: name.clone(),
                            handler: downstream_name.clone(),
                        },
                    )?;
                    downstream.push(instance);
                }
                let queue = match resolved.backend {
                    Backend::Standard => QueueHandler::new(downstream, *respect_handler_level),
                    Backend::Compact => QueueHandler::prerendered(
                        formatter_for(name, formatter)?,
                        downstream,
                        *respect_handler_level,
                    ),
                };
                let queue = match level {
                    Some(level) => queue.with_level(*level),
                    None => queue,
                };
                listeners.push(queue.listener());
                handler_instances.insert(name.clone(), Arc::new(queue));
            }
        }

        let resolve_handlers = |referrer: &str,
                                names: &[String]|
         -> Result<Vec<Arc<dyn Handler>>, ConfigError> {
            names
                .iter()
                .map(|handler_name| {
                    handler_instances.get(handler_name).cloned().ok_or_else(|| {
                        ConfigError::UnknownHandler {
                            referrer: referrer.to_string(),
                            handler: handler_name.clone(),
                        }
                    })
                })
                .collect()
        };

        let root_level = resolved.root.level.unwrap_or(resolved.level);
        let root_handlers = resolve_handlers("root", &resolved.root.handlers)?;

        let mut named: HashMap<String, (Level, Vec<Arc<dyn Handler>>)> = HashMap::new();
        for (logger_name, logger) in &resolved.loggers {
            let handlers = if logger.handlers.is_empty() {
                root_handlers.clone()
            } else {
                resolve_handlers(logger_name, &logger.handlers)?
            };
            named.insert(
                logger_name.clone(),
                (logger.level.unwrap_or(resolved.level), handlers),
            );
        }

        let strip_extra = resolved.backend == Backend::Compact;
        let factory: LoggerFactory = Arc::new(move |name: &str| {
            let (level, handlers) = named
                .get(name)
                .cloned()
                .unwrap_or_else(|| (root_level, root_handlers.clone()));
            let logger = BackendLogger::new(name, level, handlers);
            let logger = if strip_extra {
                logger.with_stripped_extra()
            } else {
                logger
            };
            Arc::new(logger) as Arc<dyn Logger>
        });

        install_factory(factory, self.disable_existing_loggers);

        Ok(LoggingGuard { listeners })
    }
}

fn warn_capture_unsupported() {
    static WARNED: Once = Once::new();
    WARNED.call_once(|| {
        eprintln!(
            "quelog: `capture_extra_fields` is not supported by the compact \
             backend and has been disabled"
        );
    });
}

/// Owns the background listeners created by a configuration.
///
/// Explicit lifecycle ownership: whoever configures logging holds the guard
/// and stops it on shutdown; dropping the guard is the safety net that runs
/// the same drain-and-stop exactly once.
#[must_use = "dropping the guard stops the background log listeners"]
pub struct LoggingGuard {
    listeners: Vec<Arc<QueueListener>>,
}

impl LoggingGuard {
    /// Entries still waiting across all listeners. Poll this to observe a
    /// full drain; there is no blocking flush.
    pub fn pending(&self) -> usize {
        self.listeners.iter().map(|l| l.pending()).sum()
    }

    /// Drain and stop every listener. Idempotent; also run on drop.
    pub fn stop(&self) {
        for listener in &self.listeners {
            listener.stop();
        }
    }
}

impl Drop for LoggingGuard {
    fn drop(&mut self) {
        self.stop();
    }
}
