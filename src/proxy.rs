//! Lazy logger proxies and the process-wide logger registry.
//!
//! Sometimes you don't know your logging settings at startup, but modules
//! still want `static`-friendly logger handles. [`get_logger`] hands out a
//! [`LoggerProxy`] that is safe to use immediately: before configuration it
//! routes to a degraded stderr fallback (and says so once), and once
//! [`setup_proxy_loggers`] runs, every handle resolves to a real logger on
//! its next use.

use crate::record::{ErrorInfo, ExtraFields, Level, LogRecord};
use std::collections::HashMap;
use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

/// Creates a real logger for a name once configuration is known.
pub type LoggerFactory = Arc<dyn Fn(&str) -> Arc<dyn Logger> + Send + Sync>;

/// The capability surface every logger handle exposes.
///
/// Concrete loggers implement `name`, `level`, `set_level` and
/// `log_record`; the severity helpers are provided on top of those and
/// capture the caller's file and line.
pub trait Logger: Send + Sync {
    fn name(&self) -> &str;

    /// Minimum severity this logger currently emits.
    fn level(&self) -> Level;

    fn set_level(&self, level: Level);

    /// Deliver an already-built record to this logger's handlers.
    ///
    /// Level filtering is the implementation's responsibility; the provided
    /// helpers pre-check to avoid building records that would be dropped.
    fn log_record(&self, record: LogRecord);

    #[track_caller]
    fn log(&self, level: Level, message: &str) {
        if level < self.level() {
            return;
        }
        let caller = Location::caller();
        self.log_record(LogRecord::new(
            self.name(),
            level,
            caller.file(),
            caller.line(),
            message,
        ));
    }

    #[track_caller]
    fn log_with_extra(&self, level: Level, message: &str, extra: ExtraFields) {
        if level < self.level() {
            return;
        }
        let caller = Location::caller();
        self.log_record(
            LogRecord::new(self.name(), level, caller.file(), caller.line(), message)
                .with_extra(extra),
        );
    }

    #[track_caller]
    fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }

    #[track_caller]
    fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    #[track_caller]
    fn warn(&self, message: &str) {
        self.log(Level::Warning, message);
    }

    #[track_caller]
    fn warning(&self, message: &str) {
        self.log(Level::Warning, message);
    }

    #[track_caller]
    fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }

    #[track_caller]
    fn critical(&self, message: &str) {
        self.log(Level::Critical, message);
    }

    #[track_caller]
    fn fatal(&self, message: &str) {
        self.log(Level::Critical, message);
    }

    /// Log at `ERROR` with the error's details attached to the record.
    #[track_caller]
    fn exception(&self, message: &str, error: &(dyn std::error::Error + 'static)) {
        if Level::Error < self.level() {
            return;
        }
        let caller = Location::caller();
        self.log_record(
            LogRecord::new(
                self.name(),
                Level::Error,
                caller.file(),
                caller.line(),
                message,
            )
            .with_error(ErrorInfo::from_error(error)),
        );
    }
}

/// Degraded sink used before configuration: warning-and-above to stderr.
struct FallbackLogger;

impl Logger for FallbackLogger {
    fn name(&self) -> &str {
        "quelog.fallback"
    }

    fn level(&self) -> Level {
        Level::Warning
    }

    fn set_level(&self, _level: Level) {}

    fn log_record(&self, record: LogRecord) {
        if record.level < Level::Warning {
            return;
        }
        eprintln!(
            "{} | {} | {}",
            record.level.name(),
            record.logger_name,
            record.rendered_message()
        );
    }
}

fn fallback_logger() -> Arc<dyn Logger> {
    static FALLBACK: OnceLock<Arc<FallbackLogger>> = OnceLock::new();
    FALLBACK.get_or_init(|| Arc::new(FallbackLogger)).clone() as Arc<dyn Logger>
}

/// Lazy logger handle.
///
/// Lifecycle: unbound (no factory known) → bound (factory stored, real
/// logger not built yet) → resolved (real logger cached). Resolution
/// happens on first real use, not at bind time, and is race-safe: the
/// first caller through the write lock builds the logger, everyone after
/// takes the read fast path.
pub struct LoggerProxy {
    name: String,
    factory: Mutex<Option<LoggerFactory>>,
    resolved: RwLock<Option<Arc<dyn Logger>>>,
    fallback_warned: AtomicBool,
}

impl LoggerProxy {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        LoggerProxy {
            name: name.into(),
            factory: Mutex::new(None),
            resolved: RwLock::new(None),
            fallback_warned: AtomicBool::new(false),
        }
    }

    pub(crate) fn bind(&self, factory: LoggerFactory) {
        *self.factory.lock().unwrap_or_else(PoisonError::into_inner) = Some(factory);
    }

    /// Forget a cached real logger so the next use re-resolves.
    pub(crate) fn invalidate(&self) {
        *self.resolved.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Whether a real logger has been created and cached.
    pub fn is_resolved(&self) -> bool {
        self.resolved
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Whether this proxy was ever used while unconfigured.
    pub fn fallback_engaged(&self) -> bool {
        self.fallback_warned.load(Ordering::Relaxed)
    }

    fn real_logger(&self) -> Arc<dyn Logger> {
        if let Some(logger) = self
            .resolved
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Arc::clone(logger);
        }

        let mut slot = self.resolved.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(logger) = slot.as_ref() {
            return Arc::clone(logger);
        }

        let factory = self
            .factory
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match factory {
            Some(factory) => {
                let logger = factory(&self.name);
                *slot = Some(Arc::clone(&logger));
                logger
            }
            None => {
                // The fallback is handed out per call and never cached, so
                // a later configuration can still resolve this proxy.
                drop(slot);
                let fallback = fallback_logger();
                if !self.fallback_warned.swap(true, Ordering::SeqCst) {
                    fallback.error(&format!(
                        "logging is not set up yet, create a LoggingConfig and call \
                         configure() first (logger: {})",
                        self.name
                    ));
                }
                fallback
            }
        }
    }
}

impl Logger for LoggerProxy {
    fn name(&self) -> &str {
        &self.name
    }

    fn level(&self) -> Level {
        self.real_logger().level()
    }

    fn set_level(&self, level: Level) {
        self.real_logger().set_level(level);
    }

    fn log_record(&self, record: LogRecord) {
        self.real_logger().log_record(record);
    }
}

struct RegistryInner {
    proxies: HashMap<String, Arc<LoggerProxy>>,
    factory: Option<LoggerFactory>,
}

/// Process-wide registry: starts empty with no factory bound.
fn registry() -> &'static Mutex<RegistryInner> {
    static REGISTRY: OnceLock<Mutex<RegistryInner>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        Mutex::new(RegistryInner {
            proxies: HashMap::new(),
            factory: None,
        })
    })
}

/// Get (or create) the proxy registered under `name`.
///
/// Two calls with the same name return the same handle. Proxies created
/// after configuration are bound immediately; earlier ones were bound in
/// bulk by [`setup_proxy_loggers`].
pub fn get_logger(name: &str) -> Arc<LoggerProxy> {
    let mut inner = registry().lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(proxy) = inner.proxies.get(name) {
        return Arc::clone(proxy);
    }
    let proxy = Arc::new(LoggerProxy::new(name));
    if let Some(factory) = &inner.factory {
        proxy.bind(Arc::clone(factory));
    }
    inner.proxies.insert(name.to_string(), Arc::clone(&proxy));
    proxy
}

/// Store `factory` globally and bind every registered proxy to it.
///
/// Runs under the registry lock, so a concurrent [`get_logger`] either sees
/// the factory at creation time or is bound by this bulk pass — a proxy can
/// never stay unbound across a completed setup.
pub fn setup_proxy_loggers(factory: LoggerFactory) {
    install_factory(factory, false);
}

pub(crate) fn install_factory(factory: LoggerFactory, invalidate_resolved: bool) {
    let mut inner = registry().lock().unwrap_or_else(PoisonError::into_inner);
    inner.factory = Some(Arc::clone(&factory));
    for proxy in inner.proxies.values() {
        proxy.bind(Arc::clone(&factory));
        if invalidate_resolved {
            proxy.invalidate();
        }
    }
}

/// Drop every registered proxy and the bound factory.
///
/// Test-suite teardown: the registry is process-wide state, and suites that
/// configure logging repeatedly must reset it explicitly between cases.
pub fn reset_proxy_loggers() {
    let mut inner = registry().lock().unwrap_or_else(PoisonError::into_inner);
    inner.proxies.clear();
    inner.factory = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingLogger {
        name: String,
        records: AtomicUsize,
    }

    impl Logger for CountingLogger {
        fn name(&self) -> &str {
            &self.name
        }

        fn level(&self) -> Level {
            Level::Debug
        }

        fn set_level(&self, _level: Level) {}

        fn log_record(&self, _record: LogRecord) {
            self.records.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting_factory() -> (LoggerFactory, Arc<AtomicUsize>) {
        let created = Arc::new(AtomicUsize::new(0));
        let created_in = Arc::clone(&created);
        let factory: LoggerFactory = Arc::new(move |name: &str| {
            created_in.fetch_add(1, Ordering::SeqCst);
            Arc::new(CountingLogger {
                name: name.to_string(),
                records: AtomicUsize::new(0),
            }) as Arc<dyn Logger>
        });
        (factory, created)
    }

    #[test]
    fn unbound_proxy_routes_to_fallback_without_caching() {
        let proxy = LoggerProxy::new("unbound");
        proxy.info("goes to the fallback");
        assert!(!proxy.is_resolved());
        assert!(proxy.fallback_engaged());

        // a later bind must still win
        let (factory, created) = counting_factory();
        proxy.bind(factory);
        proxy.info("now resolves");
        assert!(proxy.is_resolved());
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn resolution_happens_once_and_is_cached() {
        let proxy = LoggerProxy::new("cached");
        let (factory, created) = counting_factory();
        proxy.bind(factory);
        proxy.debug("first use resolves");
        proxy.debug("second use reuses the cache");
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn bind_alone_does_not_resolve() {
        let proxy = LoggerProxy::new("lazy");
        let (factory, created) = counting_factory();
        proxy.bind(factory);
        assert!(!proxy.is_resolved());
        assert_eq!(created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn concurrent_first_use_creates_exactly_one_logger() {
        let proxy = Arc::new(LoggerProxy::new("racy"));
        let (factory, created) = counting_factory();
        proxy.bind(factory);

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let proxy = Arc::clone(&proxy);
                std::thread::spawn(move || proxy.info("race"))
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invalidate_forces_re_resolution() {
        let proxy = LoggerProxy::new("stale");
        let (factory, created) = counting_factory();
        proxy.bind(factory);
        proxy.info("resolve once");
        proxy.invalidate();
        assert!(!proxy.is_resolved());
        proxy.info("resolve again");
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }
}
