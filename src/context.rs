//! Shared logging/priority handle passed to writers, readers, and the trie.
//!
//! Mirrors `loc_ctx` from the C original: a single place that knows how
//! loud to be, read once from the environment, cheaply shared by every
//! object that wants to log. Backed by `tracing` instead of a hand-rolled
//! callback table.

use std::env;
use std::sync::Arc;

/// Runtime-checked log priority, ordered the way syslog orders them:
/// lower numbers are more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogPriority {
    /// Only hard errors.
    Error = 3,
    /// Errors and informational notices.
    Info = 6,
    /// Everything, including verbose tracing of internal algorithms.
    Debug = 7,
}

impl LogPriority {
    fn from_env_value(value: &str) -> Option<Self> {
        match value.trim() {
            "err" | "error" => Some(LogPriority::Error),
            "info" => Some(LogPriority::Info),
            "debug" => Some(LogPriority::Debug),
            decimal => decimal.parse::<u8>().ok().and_then(Self::from_syslog_level),
        }
    }

    fn from_syslog_level(level: u8) -> Option<Self> {
        match level {
            0..=3 => Some(LogPriority::Error),
            4..=6 => Some(LogPriority::Info),
            _ => Some(LogPriority::Debug),
        }
    }
}

struct ContextInner {
    priority: LogPriority,
}

/// A cheaply-cloned handle shared by every `Writer`/`Reader`/`NetworkTrie`
/// that needs to log. Reads `LOC_LOG` exactly once, at construction.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    /// Build a context, reading `LOC_LOG` from the environment. Defaults to
    /// [`LogPriority::Error`] when the variable is unset or unparsable.
    pub fn new() -> Self {
        let priority = env::var("LOC_LOG")
            .ok()
            .and_then(|v| LogPriority::from_env_value(&v))
            .unwrap_or(LogPriority::Error);
        Self::with_priority(priority)
    }

    /// Build a context with an explicit priority, bypassing the
    /// environment. Useful for tests and for callers that already know
    /// how loud they want to be.
    pub fn with_priority(priority: LogPriority) -> Self {
        Context {
            inner: Arc::new(ContextInner { priority }),
        }
    }

    /// Current priority threshold.
    pub fn priority(&self) -> LogPriority {
        self.inner.priority
    }

    /// Whether a message at `level` would actually be emitted. Used by the
    /// logging macros to skip formatting work entirely when it wouldn't be.
    pub fn enabled(&self, level: LogPriority) -> bool {
        level <= self.inner.priority
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// Emits a debug-level event if the context's priority allows it.
macro_rules! debug {
    ($ctx:expr, $($arg:tt)+) => {
        if $ctx.enabled($crate::context::LogPriority::Debug) {
            tracing::debug!($($arg)+);
        }
    };
}

/// Emits an info-level event if the context's priority allows it.
macro_rules! info {
    ($ctx:expr, $($arg:tt)+) => {
        if $ctx.enabled($crate::context::LogPriority::Info) {
            tracing::info!($($arg)+);
        }
    };
}

/// Emits an error-level event if the context's priority allows it.
macro_rules! error {
    ($ctx:expr, $($arg:tt)+) => {
        if $ctx.enabled($crate::context::LogPriority::Error) {
            tracing::error!($($arg)+);
        }
    };
}

pub(crate) use debug;
pub(crate) use error;
pub(crate) use info;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_priority_is_error_when_unset() {
        let ctx = Context::with_priority(LogPriority::Error);
        assert!(ctx.enabled(LogPriority::Error));
        assert!(!ctx.enabled(LogPriority::Info));
        assert!(!ctx.enabled(LogPriority::Debug));
    }

    #[test]
    fn debug_priority_enables_everything() {
        let ctx = Context::with_priority(LogPriority::Debug);
        assert!(ctx.enabled(LogPriority::Error));
        assert!(ctx.enabled(LogPriority::Info));
        assert!(ctx.enabled(LogPriority::Debug));
    }

    #[test]
    fn parses_named_and_decimal_priorities() {
        assert_eq!(LogPriority::from_env_value("debug"), Some(LogPriority::Debug));
        assert_eq!(LogPriority::from_env_value("info"), Some(LogPriority::Info));
        assert_eq!(LogPriority::from_env_value("err"), Some(LogPriority::Error));
        assert_eq!(LogPriority::from_env_value("7"), Some(LogPriority::Debug));
        assert_eq!(LogPriority::from_env_value("3"), Some(LogPriority::Error));
        assert_eq!(LogPriority::from_env_value("nonsense"), None);
    }
}
