use crate::domain::settings::LogSettings;
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub struct LoggingGuard {
    // We need to keep this guard alive for logs to be flushed
    _guards: Vec<WorkerGuard>,
}

pub fn init_logger(settings: &LogSettings) -> anyhow::Result<LoggingGuard> {
    let mut guards = Vec::new();

    // RUST_LOG overrides the configured level
    let level_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::from_str(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = if settings.console_logging_enabled {
        Some(
            fmt::layer()
                .with_writer(std::io::stdout)
                .with_target(settings.show_target)
                .with_ansi(settings.ansi_colors),
        )
    } else {
        None
    };

    let file_layer = if settings.file_logging_enabled {
        let rotation = match settings.rotation.to_lowercase().as_str() {
            "hourly" => tracing_appender::rolling::Rotation::HOURLY,
            "minutely" => tracing_appender::rolling::Rotation::MINUTELY,
            "never" => tracing_appender::rolling::Rotation::NEVER,
            _ => tracing_appender::rolling::Rotation::DAILY,
        };

        let file_appender = tracing_appender::rolling::RollingFileAppender::new(
            rotation,
            &settings.log_dir,
            &settings.file_name_prefix,
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        guards.push(guard);
        Some(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false) // File logs shouldn't have ANSI colors
                .with_target(settings.show_target),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(level_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!("Logging initialized successfully");

    Ok(LoggingGuard { _guards: guards })
}

/// Oldest entries are dropped once the journal is full.
const DIAGNOSTIC_CAPACITY: usize = 200;

/// Bounded in-memory journal of transport failures.
///
/// Every failed send appends one human-readable line here, tagged with the
/// transport that produced it. The journal is what a UI or the CLI shows the
/// user when a send returns `false`; the same line is mirrored to `tracing`
/// for the persistent log. Clones share the same journal.
#[derive(Clone, Default)]
pub struct DiagnosticLog {
    entries: Arc<Mutex<VecDeque<String>>>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, tag: &str, message: impl AsRef<str>) {
        let line = format!("[{tag}] {}", message.as_ref());
        tracing::warn!("{line}");
        let mut entries = self.entries.lock().unwrap();
        if entries.len() == DIAGNOSTIC_CAPACITY {
            entries.pop_front();
        }
        entries.push_back(line);
    }

    /// Entries in append order, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.entries.lock().unwrap().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_tagged_lines_in_order() {
        let log = DiagnosticLog::new();
        log.append("udp", "connection refused");
        log.append("ble-linear", "no event within 25 s");
        assert_eq!(
            log.snapshot(),
            vec![
                "[udp] connection refused".to_string(),
                "[ble-linear] no event within 25 s".to_string(),
            ]
        );
    }

    #[test]
    fn clones_share_the_journal() {
        let log = DiagnosticLog::new();
        let clone = log.clone();
        clone.append("tcp", "broken pipe");
        assert_eq!(log.snapshot().len(), 1);
    }

    #[test]
    fn capacity_drops_oldest_entries() {
        let log = DiagnosticLog::new();
        for i in 0..DIAGNOSTIC_CAPACITY + 5 {
            log.append("serial", format!("failure {i}"));
        }
        let snapshot = log.snapshot();
        assert_eq!(snapshot.len(), DIAGNOSTIC_CAPACITY);
        assert_eq!(snapshot[0], "[serial] failure 5");
    }

    #[test]
    fn clear_empties_the_journal() {
        let log = DiagnosticLog::new();
        log.append("udp", "x");
        assert!(!log.is_empty());
        log.clear();
        assert!(log.is_empty());
    }
}
