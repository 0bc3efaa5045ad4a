//! Host Configuration
//!
//! Optional TOML file read at startup (`blockscript.toml`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use blockscript_runtime::{InterpreterConfig, DEFAULT_LOOP_BUDGET, DEFAULT_LOOP_DELAY};
use serde::{Deserialize, Serialize};

/// Errors loading the host config
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Host config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub interpreter: InterpreterSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// `[interpreter]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpreterSection {
    /// Pause after each loop iteration, in milliseconds
    #[serde(default = "default_loop_delay_ms")]
    pub loop_delay_ms: u64,
    /// Cap for loops without their own; 0 disables the cap
    #[serde(default = "default_max_loop_iterations")]
    pub max_loop_iterations: u32,
}

fn default_loop_delay_ms() -> u64 {
    DEFAULT_LOOP_DELAY.as_millis() as u64
}

fn default_max_loop_iterations() -> u32 {
    DEFAULT_LOOP_BUDGET
}

impl Default for InterpreterSection {
    fn default() -> Self {
        Self {
            loop_delay_ms: default_loop_delay_ms(),
            max_loop_iterations: default_max_loop_iterations(),
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Filter directives; `RUST_LOG` takes precedence
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Emit JSON log lines
    #[serde(default)]
    pub json: bool,
}

fn default_filter() -> String {
    "blockscript=info,blockscript_runtime=info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

impl HostConfig {
    /// Load a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Settings for the interpreter
    pub fn interpreter_config(&self) -> InterpreterConfig {
        let budget = match self.interpreter.max_loop_iterations {
            0 => None,
            n => Some(n),
        };
        InterpreterConfig::default()
            .with_loop_delay(Duration::from_millis(self.interpreter.loop_delay_ms))
            .with_loop_budget(budget)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HostConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, HostConfig::default());
        assert_eq!(config.interpreter_config(), InterpreterConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[interpreter]\nloop_delay_ms = 0\nmax_loop_iterations = 0").unwrap();

        let config = HostConfig::load(file.path()).unwrap();
        assert_eq!(config.logging, LoggingSection::default());

        let interpreter = config.interpreter_config();
        assert!(interpreter.loop_delay.is_zero());
        assert_eq!(interpreter.default_loop_budget, None);
    }

    #[test]
    fn test_logging_section() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nfilter = \"debug\"\njson = true").unwrap();

        let config = HostConfig::load(file.path()).unwrap();
        assert_eq!(config.logging.filter, "debug");
        assert!(config.logging.json);
        assert_eq!(config.interpreter, InterpreterSection::default());
    }

    #[test]
    fn test_malformed_file_names_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[interpreter]\nloop_delay_ms = \"soon\"").unwrap();

        let err = HostConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }
}
