//! Engine configuration.
//!
//! All tunables that were process-wide globals in older designs (watchdog
//! timeout, monitored stream, tail length) live here and are passed into the
//! executor and transcoder at construction. Every section defaults sensibly
//! so an empty `{}` config file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

/// Which standard stream the watchdog monitors for per-line activity.
///
/// Media tools conventionally write progress to stderr, so that is the
/// default. The unmonitored stream is still captured in full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitoredStream {
    Stdout,
    Stderr,
}

/// Root engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscoderConfig {
    pub executor: ExecutorConfig,
    pub integrity: IntegrityConfig,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            executor: ExecutorConfig::default(),
            integrity: IntegrityConfig::default(),
        }
    }
}

impl TranscoderConfig {
    /// Deserialize a config from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::parameter(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }
}

/// Subprocess supervision settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Seconds the watchdog waits for the next line on the monitored stream
    /// before killing the process group.
    #[serde(rename = "line_timeout_secs")]
    pub line_timeout_secs: f64,
    /// Stream the watchdog reads line-by-line.
    pub monitored: MonitoredStream,
    /// How many trailing stderr lines [`execute_tailing_stderr`] keeps.
    ///
    /// [`execute_tailing_stderr`]: crate::exec::CommandExecutor::execute_tailing_stderr
    pub tail_lines: usize,
    /// Shell used to run stage command strings.
    pub shell: PathBuf,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            line_timeout_secs: 200.0,
            monitored: MonitoredStream::Stderr,
            tail_lines: 500,
            shell: PathBuf::from("/bin/sh"),
        }
    }
}

impl ExecutorConfig {
    /// The watchdog timeout as a [`Duration`].
    pub fn line_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.line_timeout_secs)
    }
}

/// Post-run integrity check settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrityConfig {
    /// Tolerance factor for the duration comparison. The processed duration
    /// must satisfy `original / tolerance < processed < original * tolerance`.
    pub duration_tolerance: f64,
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self {
            duration_tolerance: 1.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = TranscoderConfig::default();
        assert_eq!(cfg.executor.line_timeout_secs, 200.0);
        assert_eq!(cfg.executor.monitored, MonitoredStream::Stderr);
        assert_eq!(cfg.executor.tail_lines, 500);
        assert_eq!(cfg.executor.shell, PathBuf::from("/bin/sh"));
        assert_eq!(cfg.integrity.duration_tolerance, 1.1);
    }

    #[test]
    fn parse_empty_json_uses_defaults() {
        let cfg = TranscoderConfig::from_json("{}").unwrap();
        assert_eq!(cfg.executor.line_timeout_secs, 200.0);
    }

    #[test]
    fn parse_json_overrides() {
        let json = r#"{"executor": {"line_timeout_secs": 1.5, "monitored": "stdout"}}"#;
        let cfg = TranscoderConfig::from_json(json).unwrap();
        assert_eq!(cfg.executor.line_timeout_secs, 1.5);
        assert_eq!(cfg.executor.monitored, MonitoredStream::Stdout);
        // untouched sections keep their defaults
        assert_eq!(cfg.executor.tail_lines, 500);
        assert_eq!(cfg.integrity.duration_tolerance, 1.1);
    }

    #[test]
    fn load_or_default_with_missing_file() {
        let cfg = TranscoderConfig::load_or_default(Some(Path::new("/nonexistent/rf.json")));
        assert_eq!(cfg.executor.tail_lines, 500);
    }

    #[test]
    fn line_timeout_duration() {
        let mut cfg = ExecutorConfig::default();
        cfg.line_timeout_secs = 0.25;
        assert_eq!(cfg.line_timeout(), Duration::from_millis(250));
    }
}
