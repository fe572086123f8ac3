use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Structured extra fields attached to log records and context scopes.
///
/// Keys may contain dots (`request.id`), which the formatters expand into
/// nested JSON objects.
pub type ExtraFields = serde_json::Map<String, Value>;

/// Severity of a log record.
///
/// Numeric values match the conventional 10..=50 scale so that levels can be
/// configured either by name or by number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Level {
    Debug = 10,
    Info = 20,
    Warning = 30,
    Error = 40,
    Critical = 50,
}

impl Level {
    /// Upper-case level name as it appears in formatted output.
    pub fn name(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }

    /// Map a numeric severity onto the nearest level, rounding down.
    pub fn from_number(value: i64) -> Level {
        match value {
            v if v >= 50 => Level::Critical,
            v if v >= 40 => Level::Error,
            v if v >= 30 => Level::Warning,
            v if v >= 20 => Level::Info,
            _ => Level::Debug,
        }
    }

    /// Parse a level from a name (case-insensitive) or a decimal number.
    pub fn parse(value: &str) -> Result<Level, ParseLevelError> {
        if let Ok(num) = value.parse::<i64>() {
            return Ok(Level::from_number(num));
        }
        match value.to_ascii_uppercase().as_str() {
            "DEBUG" | "TRACE" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "WARN" | "WARNING" => Ok(Level::Warning),
            "ERROR" => Ok(Level::Error),
            "CRITICAL" | "FATAL" => Ok(Level::Critical),
            _ => Err(ParseLevelError(value.to_string())),
        }
    }

    pub(crate) fn to_bits(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_bits(bits: u8) -> Level {
        Level::from_number(i64::from(bits))
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::parse(s)
    }
}

#[derive(thiserror::Error, Debug)]
#[error("unknown log level: {0:?}")]
pub struct ParseLevelError(pub String);

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LevelVisitor;

        impl<'de> Visitor<'de> for LevelVisitor {
            type Value = Level;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a level name or a numeric severity")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Level, E> {
                Level::parse(value).map_err(de::Error::custom)
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Level, E> {
                Ok(Level::from_number(value))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Level, E> {
                Ok(Level::from_number(value.min(i64::MAX as u64) as i64))
            }
        }

        deserializer.deserialize_any(LevelVisitor)
    }
}

/// Error details attached to a record by an `exception` call.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    /// Type-ish name of the error value.
    pub kind: String,
    /// Debug rendering of the error value.
    pub message: String,
    /// The error source chain, outermost cause first.
    pub stack: Vec<String>,
    /// Reserved slot for future error parameters; always empty today.
    pub params: ExtraFields,
}

impl ErrorInfo {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        ErrorInfo {
            kind: kind.into(),
            message: message.into(),
            stack: Vec::new(),
            params: ExtraFields::new(),
        }
    }

    /// Build error info from any `std::error::Error`.
    ///
    /// The kind is derived from the leading token of the `Debug`
    /// representation (`Io(..)` becomes `Io`), and the source chain is
    /// flattened into the stack.
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let debug_repr = format!("{error:?}");
        let kind: String = debug_repr
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
            .collect();
        let kind = if kind.is_empty() { "Error".to_string() } else { kind };

        let mut stack = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            stack.push(cause.to_string());
            source = cause.source();
        }

        ErrorInfo {
            kind,
            message: debug_repr,
            stack,
            params: ExtraFields::new(),
        }
    }
}

/// A single log call, produced by a logger and consumed by one formatter.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub logger_name: String,
    /// Source file of the call site.
    pub file: String,
    /// Source line of the call site.
    pub line: u32,
    /// Message template; `%s` placeholders are filled from `args`.
    pub msg: String,
    pub args: Vec<Value>,
    pub error: Option<ErrorInfo>,
    /// Per-call extra fields supplied by the caller.
    pub extra: ExtraFields,
    /// Context snapshot copied onto the record when it crosses into the
    /// background dispatch thread.
    pub bound_extra: Option<ExtraFields>,
}

impl LogRecord {
    pub fn new(
        logger_name: impl Into<String>,
        level: Level,
        file: impl Into<String>,
        line: u32,
        msg: impl Into<String>,
    ) -> Self {
        LogRecord {
            timestamp: Utc::now(),
            level,
            logger_name: logger_name.into(),
            file: file.into(),
            line,
            msg: msg.into(),
            args: Vec::new(),
            error: None,
            extra: ExtraFields::new(),
            bound_extra: None,
        }
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_extra(mut self, extra: ExtraFields) -> Self {
        self.extra = extra;
        self
    }

    pub fn with_error(mut self, error: ErrorInfo) -> Self {
        self.error = Some(error);
        self
    }

    /// Render the message template, substituting `%s` placeholders with the
    /// record args in order. Surplus placeholders are kept verbatim.
    pub fn rendered_message(&self) -> String {
        if self.args.is_empty() || !self.msg.contains("%s") {
            return self.msg.clone();
        }
        let mut out = String::with_capacity(self.msg.len());
        let mut args = self.args.iter();
        let mut parts = self.msg.split("%s");
        if let Some(first) = parts.next() {
            out.push_str(first);
        }
        for part in parts {
            match args.next() {
                Some(value) => out.push_str(&value_to_display(value)),
                None => out.push_str("%s"),
            }
            out.push_str(part);
        }
        out
    }

    /// Extra fields this record should be formatted with: the live context
    /// snapshot when one is present, otherwise the transport-bound snapshot.
    /// The two sources are never merged together.
    pub fn effective_extra(&self) -> ExtraFields {
        let ctx = crate::context::get_log_extra();
        if !ctx.is_empty() {
            return ctx;
        }
        self.bound_extra.clone().unwrap_or_default()
    }
}

/// Human rendering of a JSON value: strings lose their quotes, everything
/// else keeps its JSON form.
pub(crate) fn value_to_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
