//! Tracing subscriber setup.
//!
//! Console output carries uptime, target and thread name, so lines from the
//! `patch-prepare` worker are easy to tell apart from the render thread.
//! Debug builds can also write JSON lines to a file. `RUST_LOG` wins over the
//! configured filter.

use std::fs::File;
use std::path::Path;

use sphaera_config::Config;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const DEFAULT_FILTER: &str = "info,wgpu=warn";
pub const LOG_FILE_NAME: &str = "sphaera.log";

/// Filter directives from `config`, or [`DEFAULT_FILTER`].
pub fn filter_directives(config: Option<&Config>) -> String {
    match config {
        Some(config) if !config.debug.log_level.trim().is_empty() => {
            config.debug.log_level.clone()
        }
        _ => DEFAULT_FILTER.to_string(),
    }
}

/// Create `log_dir` and a fresh log file inside it.
pub fn open_log_file(log_dir: &Path) -> std::io::Result<File> {
    std::fs::create_dir_all(log_dir)?;
    File::create(log_dir.join(LOG_FILE_NAME))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(
    log_dir: Option<&Path>,
    debug_build: bool,
    config: Option<&Config>,
) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(config)));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if debug_build && let Some(log_dir) = log_dir {
        match open_log_file(log_dir) {
            Ok(log_file) => {
                let file_layer = fmt::layer()
                    .with_writer(log_file)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_names(true)
                    .with_timer(fmt::time::uptime())
                    .json();
                subscriber.with(file_layer).try_init()?;
                tracing::debug!("Writing JSON log to {}", log_dir.join(LOG_FILE_NAME).display());
                return Ok(());
            }
            Err(err) => {
                subscriber.try_init()?;
                tracing::warn!("Cannot open log file in {}: {err}", log_dir.display());
                return Ok(());
            }
        }
    }

    subscriber.try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_without_config() {
        assert_eq!(filter_directives(None), DEFAULT_FILTER);
        let filter = EnvFilter::new(filter_directives(None));
        assert!(format!("{filter}").contains("wgpu=warn"));
    }

    #[test]
    fn test_config_level_is_used() {
        let mut config = Config::default();
        config.debug.log_level = "debug,sphaera_lod=trace".into();
        assert_eq!(filter_directives(Some(&config)), "debug,sphaera_lod=trace");
        let filter = EnvFilter::new(filter_directives(Some(&config)));
        assert!(format!("{filter}").contains("sphaera_lod=trace"));
    }

    #[test]
    fn test_blank_config_level_falls_back() {
        let mut config = Config::default();
        config.debug.log_level = "  ".into();
        assert_eq!(filter_directives(Some(&config)), DEFAULT_FILTER);
    }

    #[test]
    fn test_log_file_created_in_nested_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs/run");
        open_log_file(&nested).unwrap();
        assert!(nested.join(LOG_FILE_NAME).exists());
    }

    #[test]
    fn test_second_init_fails_instead_of_panicking() {
        // Only one global subscriber can exist per process.
        let _ = init_logging(None, false, None);
        assert!(init_logging(None, false, None).is_err());
    }
}
