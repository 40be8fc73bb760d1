//! Configuration for new traces.
//!
//! Settings can live in a standalone TOML file or in a `[trace]` table of a
//! host application's config:
//!
//! ```toml
//! [trace]
//! log_time = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TraceError};

/// Name of the table read from a shared config file.
pub const CONFIG_SECTION: &str = "trace";

/// Defaults applied to root traces built from a config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Record lap timings. Children inherit this from their parent.
    pub log_time: bool,
}

impl TraceConfig {
    /// Parse configuration from TOML text.
    ///
    /// Reads the `[trace]` table when present, otherwise the top level.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut table: toml::Table = content.parse()?;

        let section = match table.remove(CONFIG_SECTION) {
            Some(toml::Value::Table(section)) => section,
            Some(other) => {
                return Err(TraceError::Config(format!(
                    "`{}` must be a table, found {}",
                    CONFIG_SECTION,
                    other.type_str()
                )));
            }
            None => table,
        };

        Ok(toml::Value::Table(section).try_into()?)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load configuration, falling back to defaults if the file is missing
    /// or unusable.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => {
                tracing::debug!("Loaded trace config from {}", path.display());
                config
            }
            Err(TraceError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("No trace config at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to load trace config from {}: {}, using defaults",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    /// Log sink shared between a test and its subscriber.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    fn load_with_logs(path: &Path) -> (TraceConfig, String) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();

        let config =
            tracing::subscriber::with_default(subscriber, || TraceConfig::load_or_default(path));
        (config, logs.contents())
    }

    #[test]
    fn test_default_config() {
        let config = TraceConfig::default();
        assert!(!config.log_time);
    }

    #[test]
    fn test_parse_top_level() {
        let config = TraceConfig::from_toml_str("log_time = true").unwrap();
        assert!(config.log_time);
    }

    #[test]
    fn test_parse_section() {
        let toml = r#"
[server]
port = 8080

[trace]
log_time = true
"#;
        let config = TraceConfig::from_toml_str(toml).unwrap();
        assert!(config.log_time);
    }

    #[test]
    fn test_parse_empty_uses_defaults() {
        let config = TraceConfig::from_toml_str("").unwrap();
        assert_eq!(config, TraceConfig::default());
    }

    #[test]
    fn test_parse_wrong_type() {
        let err = TraceConfig::from_toml_str("log_time = \"yes\"").unwrap_err();
        assert!(matches!(err, TraceError::Toml(_)));
    }

    #[test]
    fn test_section_must_be_table() {
        let err = TraceConfig::from_toml_str("trace = 3").unwrap_err();
        assert!(matches!(err, TraceError::Config(_)));
        assert!(err.to_string().contains("must be a table"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[trace]\nlog_time = true\n").unwrap();

        let config = TraceConfig::load(&path).unwrap();
        assert!(config.log_time);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = TraceConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, TraceError::Io(_)));
    }

    #[test]
    fn test_load_or_default_falls_back() {
        let dir = tempdir().unwrap();
        let missing = TraceConfig::load_or_default(dir.path().join("absent.toml"));
        assert_eq!(missing, TraceConfig::default());

        let broken = dir.path().join("broken.toml");
        fs::write(&broken, "log_time = [").unwrap();
        assert_eq!(TraceConfig::load_or_default(&broken), TraceConfig::default());
    }

    #[test]
    fn test_load_or_default_warns_on_missing_file() {
        let dir = tempdir().unwrap();
        let (config, logs) = load_with_logs(&dir.path().join("absent.toml"));

        assert_eq!(config, TraceConfig::default());
        assert!(logs.contains("WARN"));
        assert!(logs.contains("No trace config"));
    }

    #[test]
    fn test_load_or_default_warns_on_invalid_file() {
        let dir = tempdir().unwrap();
        let broken = dir.path().join("broken.toml");
        fs::write(&broken, "log_time = 1").unwrap();
        let (config, logs) = load_with_logs(&broken);

        assert_eq!(config, TraceConfig::default());
        assert!(logs.contains("WARN"));
        assert!(logs.contains("Failed to load trace config"));
    }
}
