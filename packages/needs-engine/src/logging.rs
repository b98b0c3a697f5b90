use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_DIR: &str = "./logs";
const LOG_FILE_PREFIX: &str = "needs-engine.log";

/// Keeps the non-blocking file writer flushing until dropped.
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub file_enabled: bool,
    pub log_dir: PathBuf,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            file_enabled: false,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var("ENABLE_FILE_LOGS").ok().as_deref(),
            std::env::var("LOG_DIR").ok().as_deref(),
        )
    }

    fn from_values(enable_file_logs: Option<&str>, log_dir: Option<&str>) -> Self {
        Self {
            file_enabled: matches!(enable_file_logs.map(str::trim), Some("true" | "1")),
            log_dir: log_dir
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
        }
    }
}

/// Installs the global subscriber: stdout always, plus a daily-rolling file when enabled.
/// Falls back to stdout only if the log directory cannot be created.
pub fn init_tracing(log_level: &str, settings: &LogSettings) -> Option<FileLogGuard> {
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(true);

    if settings.file_enabled {
        match std::fs::create_dir_all(&settings.log_dir) {
            Ok(()) => {
                let appender =
                    RollingFileAppender::new(Rotation::DAILY, &settings.log_dir, LOG_FILE_PREFIX);
                let (file_writer, guard) = tracing_appender::non_blocking(appender);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(stdout_layer)
                    .with(
                        fmt::layer()
                            .with_writer(file_writer)
                            .with_ansi(false)
                            .with_target(true),
                    )
                    .init();

                return Some(FileLogGuard { _guard: guard });
            }
            Err(err) => {
                eprintln!(
                    "failed to create log directory {}: {err}",
                    settings.log_dir.display()
                );
            }
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .init();

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_logging_flag() {
        assert!(LogSettings::from_values(Some("true"), None).file_enabled);
        assert!(LogSettings::from_values(Some("1"), None).file_enabled);
        assert!(!LogSettings::from_values(Some("yes"), None).file_enabled);
        assert!(!LogSettings::from_values(None, None).file_enabled);
    }

    #[test]
    fn test_log_dir_falls_back_when_blank() {
        assert_eq!(LogSettings::from_values(None, Some("  ")).log_dir, PathBuf::from("./logs"));
        assert_eq!(
            LogSettings::from_values(None, Some("/var/log/needs")).log_dir,
            PathBuf::from("/var/log/needs")
        );
    }
}
