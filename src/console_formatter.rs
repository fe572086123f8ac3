//! Human-readable text formatter, the `standard` built-in.

use crate::record::{value_to_display, LogRecord};
use crate::sink::Formatter;

/// One-line development-friendly layout:
///
/// `2024-05-01 12:30:45 | INFO | name:src/main.rs:10 | message | {k = v}`
///
/// The trailer lists the record's effective extra fields (context snapshot
/// or transport-bound snapshot) as `{k = v, ...}` and is omitted entirely
/// when there are none.
pub struct ConsoleFormatter;

impl Formatter for ConsoleFormatter {
    fn format(&self, record: &LogRecord) -> String {
        let extra = record.effective_extra();
        let trailer = if extra.is_empty() {
            String::new()
        } else {
            let pairs: Vec<String> = extra
                .iter()
                .map(|(key, value)| format!("{key} = {}", value_to_display(value)))
                .collect();
            format!(" | {{{}}}", pairs.join(", "))
        };

        format!(
            "{} | {} | {}:{}:{} | {}{}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.level.name(),
            record.logger_name,
            record.file,
            record.line,
            record.rendered_message(),
            trailer,
        )
    }
}
