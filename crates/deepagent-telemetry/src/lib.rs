//! Logging bootstrap for deepagent.
//!
//! Installs a `tracing` subscriber with:
//!
//! - an `EnvFilter`: `RUST_LOG` when set, otherwise [`LoggingConfig::level`]
//! - a human-readable layer on stderr
//! - an optional daily-rolling file layer (no ANSI) when
//!   [`LoggingConfig::file_path`] is set
//!
//! ```no_run
//! let config = deepagent_telemetry::LoggingConfig::default();
//! let _guard = deepagent_telemetry::init_logging(&config).unwrap();
//! tracing::info!("ready");
//! ```
//!
//! Hold the returned [`LoggingGuard`] for the life of the process; dropping it
//! flushes buffered file output.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Logging section of the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset (e.g. `"info"`,
    /// `"deepagent_kernel=debug,warn"`).
    pub level: String,
    /// Also write logs here, rotated daily. Parent directory is created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    /// Colorize stderr output.
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: None,
            ansi: true,
        }
    }
}

/// Keeps the non-blocking file writer alive.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

impl std::fmt::Debug for LoggingGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingGuard")
            .field("file", &self._file.is_some())
            .finish()
    }
}

/// Build the filter: `RUST_LOG` wins over the configured level.
pub fn build_filter(level: &str) -> anyhow::Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).with_context(|| format!("invalid log level directive: {level:?}"))
}

/// Install the global subscriber.
///
/// Fails if the level directive is malformed, the log directory cannot be
/// created, or a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<LoggingGuard> {
    let filter = build_filter(&config.level)?;
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(config.ansi);

    let registry = tracing_subscriber::registry().with(filter).with(stderr_layer);

    let Some(path) = config.file_path.as_deref() else {
        registry
            .try_init()
            .context("a global tracing subscriber is already installed")?;
        return Ok(LoggingGuard { _file: None });
    };

    let (dir, file_name) = split_log_path(path)?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::daily(&dir, &file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    registry
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    tracing::info!(path = %path.display(), "file logging enabled");
    Ok(LoggingGuard { _file: Some(guard) })
}

fn split_log_path(path: &Path) -> anyhow::Result<(PathBuf, String)> {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        bail!("log file path has no file name: {}", path.display());
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, file_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.file_path.is_none());
        assert!(config.ansi);
    }

    #[test]
    fn split_log_path_variants() {
        let (dir, name) = split_log_path(Path::new("/var/log/deepagent/agent.log")).unwrap();
        assert_eq!(dir, PathBuf::from("/var/log/deepagent"));
        assert_eq!(name, "agent.log");

        let (dir, name) = split_log_path(Path::new("agent.log")).unwrap();
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(name, "agent.log");

        assert!(split_log_path(Path::new("/")).is_err());
    }

    #[test]
    fn init_with_file_then_reinit_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            level: "debug".to_string(),
            file_path: Some(dir.path().join("logs").join("agent.log")),
            ansi: false,
        };
        let guard = init_logging(&config).unwrap();
        assert!(dir.path().join("logs").is_dir());

        // Second install must report, not panic
        assert!(init_logging(&LoggingConfig::default()).is_err());
        drop(guard);
    }
}
