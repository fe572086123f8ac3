//! Bridge from `tracing` instrumentation into the logging pipeline.
//!
//! Code instrumented with `tracing` macros keeps working unchanged: the
//! layer converts each event into a [`LogRecord`], using the event target
//! as the logger name, and routes it through the proxy registry so it goes
//! wherever the configuration says.

use crate::proxy::{get_logger, Logger};
use crate::record::{ExtraFields, Level, LogRecord};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Registry;

/// `tracing_subscriber` layer feeding events into the configured pipeline.
pub struct BridgeLayer;

fn map_level(level: &tracing::Level) -> Level {
    match *level {
        tracing::Level::ERROR => Level::Error,
        tracing::Level::WARN => Level::Warning,
        tracing::Level::INFO => Level::Info,
        // There is no separate trace severity in the pipeline.
        tracing::Level::DEBUG | tracing::Level::TRACE => Level::Debug,
    }
}

impl<S> Layer<S> for BridgeLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let level = map_level(meta.level());

        let logger = get_logger(meta.target());
        if level < logger.level() {
            return;
        }

        let mut fields = ExtraFields::new();
        let mut message: Option<String> = None;
        let mut visitor = FieldVisitor {
            fields: &mut fields,
            message: &mut message,
        };
        event.record(&mut visitor);

        let mut record = LogRecord::new(
            meta.target(),
            level,
            meta.file().unwrap_or("<unknown>"),
            meta.line().unwrap_or(0),
            message.unwrap_or_default(),
        );
        if !fields.is_empty() {
            record = record.with_extra(fields);
        }
        logger.log_record(record);
    }
}

struct FieldVisitor<'a> {
    fields: &'a mut ExtraFields,
    message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(
                field.name().to_string(),
                serde_json::Value::String(value.to_string()),
            );
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{value:?}"));
        } else {
            self.fields.insert(
                field.name().to_string(),
                serde_json::Value::String(format!("{value:?}")),
            );
        }
    }
}

/// Install [`BridgeLayer`] as the global `tracing` subscriber.
///
/// Call once at startup, after (or before) `LoggingConfig::configure`;
/// events emitted before configuration go through the proxy fallback like
/// any other unconfigured logging.
pub fn init_tracing_bridge() {
    use tracing_subscriber::layer::SubscriberExt;

    let subscriber = Registry::default().with(BridgeLayer);
    tracing::subscriber::set_global_default(subscriber).expect("set global subscriber");
}
