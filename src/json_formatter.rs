//! Structured JSON formatter.

use crate::env::logging_defaults;
use crate::merge::merge_nested_fields;
use crate::record::{ExtraFields, LogRecord};
use crate::sink::Formatter;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// JSON serialization backend used to render the final record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonBackend {
    SerdeJson,
    SimdJson,
}

impl JsonBackend {
    /// Preferred backend for this build: `simd-json` when compiled in,
    /// `serde_json` otherwise.
    pub fn preferred() -> JsonBackend {
        if cfg!(feature = "simd") {
            JsonBackend::SimdJson
        } else {
            JsonBackend::SerdeJson
        }
    }

    /// Whether this backend was compiled into the crate.
    pub fn is_available(self) -> bool {
        match self {
            JsonBackend::SerdeJson => true,
            JsonBackend::SimdJson => cfg!(feature = "simd"),
        }
    }

    fn dump(self, map: &Map<String, Value>) -> Result<String, String> {
        match self {
            JsonBackend::SerdeJson => serde_json::to_string(map).map_err(|e| e.to_string()),
            JsonBackend::SimdJson => {
                #[cfg(feature = "simd")]
                {
                    simd_json::to_string(map).map_err(|e| e.to_string())
                }
                #[cfg(not(feature = "simd"))]
                {
                    // Configuration validates availability up front; keep a
                    // working fallback rather than dropping the record.
                    serde_json::to_string(map).map_err(|e| e.to_string())
                }
            }
        }
    }
}

impl Default for JsonBackend {
    fn default() -> Self {
        JsonBackend::preferred()
    }
}

/// Formatter producing one JSON object per record.
///
/// The object always carries `timestamp`, `level`, `message` and `params`
/// (call site and logger name), plus `error` details when present. On top of
/// that it merges, in order: the cached process defaults, the record's
/// effective extra fields (context snapshot or transport-bound snapshot,
/// never both) and, when `capture_extra_fields` is enabled, the per-call
/// extras — so raw per-call fields win over everything else.
pub struct JsonFormatter {
    backend: JsonBackend,
    capture_extra_fields: bool,
    defaults: ExtraFields,
}

impl JsonFormatter {
    pub fn new(backend: JsonBackend, capture_extra_fields: bool) -> Self {
        JsonFormatter {
            backend,
            capture_extra_fields,
            defaults: logging_defaults().clone(),
        }
    }

    /// Formatter with explicit static defaults instead of the cached
    /// process-wide ones. Intended for tests and embedding scenarios.
    pub fn with_defaults(
        backend: JsonBackend,
        capture_extra_fields: bool,
        defaults: ExtraFields,
    ) -> Self {
        JsonFormatter {
            backend,
            capture_extra_fields,
            defaults,
        }
    }

    fn prepare_log_map(&self, record: &LogRecord) -> Map<String, Value> {
        let mut out = Map::new();
        out.insert(
            "timestamp".to_string(),
            Value::String(timestamp_to_iso(record.timestamp)),
        );
        out.insert(
            "level".to_string(),
            Value::String(record.level.name().to_string()),
        );
        out.insert(
            "message".to_string(),
            Value::String(record.rendered_message()),
        );
        out.insert(
            "params".to_string(),
            json!({
                "call_filepath": format!("{}:{}", record.file, record.line),
                "logger_name": record.logger_name,
            }),
        );
        if let Some(error) = &record.error {
            out.insert(
                "error".to_string(),
                json!({
                    "code": error.kind,
                    "message": error.message,
                    "stack": error.stack,
                    "params": error.params,
                }),
            );
        }

        merge_nested_fields(&mut out, &self.defaults);
        merge_nested_fields(&mut out, &record.effective_extra());

        if self.capture_extra_fields {
            let captured: ExtraFields = record
                .extra
                .iter()
                .filter(|(key, _)| !key.starts_with('_') && !self.defaults.contains_key(*key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            merge_nested_fields(&mut out, &captured);
        }
        out
    }
}

impl Formatter for JsonFormatter {
    fn format(&self, record: &LogRecord) -> String {
        let map = self.prepare_log_map(record);
        self.backend.dump(&map).unwrap_or_else(|err| {
            format!(
                "{{\"level\":\"ERROR\",\"message\":\"failed to serialize log record: {err}\"}}"
            )
        })
    }
}

/// ISO-8601 timestamp with millisecond precision and a `Z` suffix
/// (`2024-05-01T12:30:45.123Z`, never `+00:00`).
pub fn timestamp_to_iso(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
