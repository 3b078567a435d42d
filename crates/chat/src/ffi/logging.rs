//! Forwards the tracker's `log` output to the host app
//!
//! Mobile hosts have no stderr worth reading, so records go to a Swift/Kotlin
//! callback that writes them to the platform's unified log. The host picks the
//! verbosity for the chat crate itself; SQLite migrations and the binding
//! layer only get through at `Warn` and above, since their debug chatter says
//! nothing about unread state.

use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use log::{Level, Log, Metadata, Record, SetLoggerError};

use super::types::{FfiLogLevel, LogCallback};

/// Level at which records from other crates are forwarded
const DEPENDENCY_LEVEL: Level = Level::Warn;

static HOST_LOG: OnceLock<HostLogBridge> = OnceLock::new();

/// `true` if `target` names this crate or one of its modules
fn is_chat_target(target: &str) -> bool {
    let crate_name = module_path!().split("::").next().unwrap_or_default();
    target == crate_name
        || target
            .strip_prefix(crate_name)
            .is_some_and(|rest| rest.starts_with("::"))
}

/// Whether a record with `target` and `level` reaches the host
fn forwards(target: &str, level: Level, chat_level: Level) -> bool {
    if is_chat_target(target) {
        level <= chat_level
    } else {
        level <= DEPENDENCY_LEVEL.min(chat_level)
    }
}

struct HostLogBridge {
    callback: RwLock<Option<Arc<dyn LogCallback>>>,
    chat_level: RwLock<Level>,
}

impl HostLogBridge {
    fn new(chat_level: Level) -> Self {
        Self {
            callback: RwLock::new(None),
            chat_level: RwLock::new(chat_level),
        }
    }

    fn callback(&self) -> Option<Arc<dyn LogCallback>> {
        self.callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_callback(&self, callback: Option<Arc<dyn LogCallback>>) {
        *self.callback.write().unwrap_or_else(PoisonError::into_inner) = callback;
    }

    fn chat_level(&self) -> Level {
        *self.chat_level.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_chat_level(&self, level: Level) {
        *self.chat_level.write().unwrap_or_else(PoisonError::into_inner) = level;
    }
}

impl Log for HostLogBridge {
    fn enabled(&self, metadata: &Metadata) -> bool {
        forwards(metadata.target(), metadata.level(), self.chat_level())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // Clone out of the lock so a callback that logs cannot deadlock
        if let Some(callback) = self.callback() {
            callback.on_log(
                FfiLogLevel::from(record.level()),
                record.target().to_string(),
                record.args().to_string(),
            );
        }
    }

    fn flush(&self) {}
}

/// Install the host bridge as the global `log` backend
///
/// Fails if another logger (such as env_logger in chat-replay) was installed
/// first.
pub fn install_host_logger(chat_level: Level) -> Result<(), SetLoggerError> {
    let bridge = HOST_LOG.get_or_init(|| HostLogBridge::new(chat_level));
    log::set_logger(bridge)?;
    log::set_max_level(chat_level.to_level_filter());
    Ok(())
}

/// Replace the callback receiving records; `None` drops them
pub fn set_host_log_callback(callback: Option<Arc<dyn LogCallback>>) {
    if let Some(bridge) = HOST_LOG.get() {
        bridge.set_callback(callback);
    }
}

/// Change how verbose the chat crate is towards the host
pub fn set_host_log_level(chat_level: Level) {
    if let Some(bridge) = HOST_LOG.get() {
        bridge.set_chat_level(chat_level);
        log::set_max_level(chat_level.to_level_filter());
    }
}

/// Start forwarding unread-tracker logs to `callback`
///
/// Safe to call more than once; later calls swap the callback and level.
#[uniffi::export]
pub fn start_chat_logging(callback: Box<dyn LogCallback>, max_level: FfiLogLevel) {
    let level = Level::from(max_level);
    if install_host_logger(level).is_err() {
        log::debug!("Logger already installed, swapping host callback");
    }
    set_host_log_callback(Some(Arc::from(callback)));
    set_host_log_level(level);
}

/// Change the chat log level after `start_chat_logging`
#[uniffi::export]
pub fn set_chat_log_level(max_level: FfiLogLevel) {
    set_host_log_level(Level::from(max_level));
}
