//! Process-wide log sink with an installable message callback.
//!
//! Internal messages always flow to the `tracing` ecosystem; additionally
//! an embedder may install a callback that receives every message at or
//! below a chosen verbosity level. Verbosity follows the client-facade
//! convention: 0 is fatal (the process aborts right after the callback
//! returns), 1 errors, 2 warnings, 3 info, 4 and above debug.

// Layer 1: Standard library
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::sync::OnceLock;

// Layer 2: Third-party
use parking_lot::RwLock;
use tracing_subscriber::EnvFilter;

/// Callback invoked for every message at or below the installed
/// `max_level`.
pub type LogMessageCallback = Arc<dyn Fn(i32, &str) + Send + Sync>;

struct Sink {
    max_level: i32,
    callback: LogMessageCallback,
}

static SINK: RwLock<Option<Sink>> = RwLock::new(None);
static VERBOSITY: AtomicI32 = AtomicI32::new(2);
static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Install (or replace, or with `None` remove) the process-wide log
/// message callback.
///
/// Installing a new callback replaces the previous one; messages in
/// flight on other threads may still reach the old callback.
pub fn set_log_message_callback(max_level: i32, callback: Option<LogMessageCallback>) {
    let mut sink = SINK.write();
    *sink = callback.map(|callback| Sink {
        max_level,
        callback,
    });
}

/// Set the internal verbosity level used by [`log_message`] filtering on
/// the `tracing` side. Levels outside 0..=1024 are rejected.
pub fn set_verbosity_level(level: i32) -> bool {
    if !(0..=1024).contains(&level) {
        return false;
    }
    VERBOSITY.store(level, Ordering::Relaxed);
    true
}

/// Current internal verbosity level.
pub fn verbosity_level() -> i32 {
    VERBOSITY.load(Ordering::Relaxed)
}

/// Emit a message to the process-wide sink.
///
/// A message at level 0 is fatal: the process aborts after the installed
/// callback (if any) returns.
pub fn log_message(level: i32, message: &str) {
    match level {
        i32::MIN..=1 => tracing::error!(target: "tgsys", level, "{message}"),
        2 => tracing::warn!(target: "tgsys", "{message}"),
        3 => tracing::info!(target: "tgsys", "{message}"),
        _ => tracing::debug!(target: "tgsys", level, "{message}"),
    }

    {
        let sink = SINK.read();
        if let Some(sink) = sink.as_ref() {
            if level <= sink.max_level {
                (sink.callback)(level, message);
            }
        }
    }

    if level == 0 {
        std::process::abort();
    }
}

/// Initialize a default `tracing` subscriber once per process.
///
/// Safe to call from multiple places; later calls are no-ops. Tests and
/// embedders that install their own subscriber simply skip this.
pub fn init_tracing() {
    TRACING_INIT.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    });
}
