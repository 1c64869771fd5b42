//! Logging capability passed explicitly into every airlock component.
//!
//! Components never reach for a global logger. Callers hand in a `&dyn Logger`;
//! library users that do not care pass [`NoopLogger`], the binary passes a
//! [`TracingLogger`] backed by whatever subscriber it installed.

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        };
        f.write_str(name)
    }
}

impl Level {
    /// Directive understood by `tracing` filters.
    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error => "error",
        }
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Minimal logging capability.
///
/// Only `log` is required; the level shorthands route through it.
pub trait Logger: Send + Sync {
    fn log(&self, level: Level, message: &str);

    fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    fn warning(&self, message: &str) {
        self.log(Level::Warning, message);
    }

    fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _level: Level, _message: &str) {}
}

/// Forwards to the `tracing` macros under the `airlock` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::Debug => tracing::debug!(target: "airlock", "{message}"),
            Level::Info => tracing::info!(target: "airlock", "{message}"),
            Level::Warning => tracing::warn!(target: "airlock", "{message}"),
            Level::Error => tracing::error!(target: "airlock", "{message}"),
        }
    }
}

/// Keeps every record in memory, for assertions in tests.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    records: Mutex<Vec<(Level, String)>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(Level, String)> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Messages logged at exactly `level`, in order.
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }
}

impl Logger for RecordingLogger {
    fn log(&self, level: Level, message: &str) {
        let mut records = match self.records.lock() {
            Ok(records) => records,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.push((level, message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_logger_keeps_order_and_level() {
        let log = RecordingLogger::new();
        log.info("first");
        log.warning("second");
        log.info("third");

        assert_eq!(log.messages(Level::Info), vec!["first", "third"]);
        assert_eq!(log.messages(Level::Warning), vec!["second"]);
        assert_eq!(log.records().len(), 3);
    }

    #[test]
    fn noop_logger_is_usable_as_trait_object() {
        let log: &dyn Logger = &NoopLogger;
        log.error("ignored");
    }

    #[test]
    fn level_display_matches_record_format() {
        assert_eq!(Level::Warning.to_string(), "WARNING");
        assert_eq!(Level::Debug.to_string(), "DEBUG");
    }

    #[test]
    fn levels_parse_case_insensitively() {
        assert_eq!("WARNING".parse::<Level>().unwrap(), Level::Warning);
        assert_eq!("warn".parse::<Level>().unwrap().as_filter(), "warn");
        assert!("trace".parse::<Level>().is_err());
    }
}
