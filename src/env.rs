//! Environment variable helpers and cached process-wide log defaults.
//!
//! These are purely helpers; the formatters receive the resolved defaults
//! and remain decoupled from environment access.

use crate::record::{ExtraFields, Level};
use serde_json::Value;
use std::sync::OnceLock;

/// Deployment environment name, e.g. `dev` / `stage` / `prod`.
pub const ENV_VARS: &[&str] = &["ENV", "LOGGING_ENV"];

/// Logical system or application name.
pub const SYSTEM_VARS: &[&str] = &["LOGGING_SYSTEM", "APP_NAME"];

/// Instance identifier, typically the pod or host name.
pub const INST_VARS: &[&str] = &["POD_NAME", "LOGGING_INST", "HOSTNAME"];

/// Global log level override.
pub const LEVEL_VAR: &str = "LOGGING_LEVEL";

/// Read the first set variable from `names`, falling back to `default`.
pub fn get_env(names: &[&str], default: &str) -> String {
    names
        .iter()
        .find_map(|name| std::env::var(name).ok())
        .unwrap_or_else(|| default.to_string())
}

/// Global log level from `LOGGING_LEVEL` (name or number), `INFO` otherwise.
pub fn get_logging_level() -> Level {
    match std::env::var(LEVEL_VAR) {
        Ok(raw) => Level::parse(&raw).unwrap_or(Level::Info),
        Err(_) => Level::Info,
    }
}

/// Static identifying fields merged into every structured record.
///
/// Computed once and cached for the process lifetime; these values do not
/// change between restarts.
pub fn logging_defaults() -> &'static ExtraFields {
    static DEFAULTS: OnceLock<ExtraFields> = OnceLock::new();
    DEFAULTS.get_or_init(compute_logging_defaults)
}

/// Uncached variant of [`logging_defaults`], reading the environment anew.
pub fn compute_logging_defaults() -> ExtraFields {
    let cwd_name = std::env::current_dir()
        .ok()
        .and_then(|dir| dir.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "unknown".to_string());

    let mut defaults = ExtraFields::new();
    defaults.insert("env".to_string(), Value::String(get_env(ENV_VARS, "dev")));
    defaults.insert(
        "system".to_string(),
        Value::String(get_env(SYSTEM_VARS, &cwd_name)),
    );
    defaults.insert(
        "inst".to_string(),
        Value::String(get_env(INST_VARS, &cwd_name)),
    );
    defaults
}
