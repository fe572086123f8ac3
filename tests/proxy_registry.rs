//! Registry lifecycle: fallback before configuration, resolution after,
//! reconfiguration semantics.

use quelog::{
    get_logger, reset_proxy_loggers, Handler, Level, Logger, LoggingConfig, MemoryHandler,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

static SETUP: Mutex<()> = Mutex::new(());

fn serialized() -> std::sync::MutexGuard<'static, ()> {
    let guard = SETUP.lock().unwrap_or_else(PoisonError::into_inner);
    reset_proxy_loggers();
    guard
}

fn capture_config(capture: &Arc<MemoryHandler>) -> HashMap<String, Arc<dyn Handler>> {
    let mut prebuilt: HashMap<String, Arc<dyn Handler>> = HashMap::new();
    prebuilt.insert("console".to_string(), Arc::clone(capture) as Arc<dyn Handler>);
    prebuilt
}

#[test]
fn same_name_yields_the_same_handle() {
    let _guard = serialized();
    let a = get_logger("db.pool");
    let b = get_logger("db.pool");
    assert!(Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &get_logger("db.other")));
}

#[test]
fn unconfigured_use_degrades_then_configuration_takes_over() {
    let _guard = serialized();

    let log = get_logger("early.bird");
    // Logging before configure must not panic; it goes to the stderr
    // fallback and leaves the proxy unresolved.
    log.info("before configure");
    assert!(!log.is_resolved());
    assert!(log.fallback_engaged());

    let capture = MemoryHandler::raw();
    let config = LoggingConfig {
        level: Level::Debug,
        ..LoggingConfig::default()
    };
    let guard = config.configure_with(capture_config(&capture)).unwrap();

    log.info("after configure");
    assert!(log.is_resolved());

    guard.stop();
    assert_eq!(capture.lines(), vec!["after configure"]);
}

#[test]
fn reconfigure_with_disable_existing_loggers_rebinds_resolved_proxies() {
    let _guard = serialized();

    let first = MemoryHandler::raw();
    let guard_one = LoggingConfig {
        level: Level::Debug,
        ..LoggingConfig::default()
    }
    .configure_with(capture_config(&first))
    .unwrap();

    let log = get_logger("svc");
    log.info("round one");
    assert!(log.is_resolved());
    guard_one.stop();

    let second = MemoryHandler::raw();
    let guard_two = LoggingConfig {
        level: Level::Debug,
        disable_existing_loggers: true,
        ..LoggingConfig::default()
    }
    .configure_with(capture_config(&second))
    .unwrap();

    // the cached logger was invalidated, the next use resolves against the
    // new configuration
    assert!(!log.is_resolved());
    log.info("round two");
    guard_two.stop();

    assert_eq!(first.lines(), vec!["round one"]);
    assert_eq!(second.lines(), vec!["round two"]);
}

#[test]
fn reconfigure_without_disabling_keeps_resolved_loggers() {
    let _guard = serialized();

    let first = MemoryHandler::raw();
    let guard_one = LoggingConfig {
        level: Level::Debug,
        ..LoggingConfig::default()
    }
    .configure_with(capture_config(&first))
    .unwrap();

    let log = get_logger("sticky");
    log.info("one");

    let second = MemoryHandler::raw();
    let guard_two = LoggingConfig {
        level: Level::Debug,
        ..LoggingConfig::default()
    }
    .configure_with(capture_config(&second))
    .unwrap();

    log.info("two");
    guard_one.stop();
    guard_two.stop();

    assert_eq!(first.lines(), vec!["one", "two"]);
    assert!(second.lines().is_empty());
}
