//! Engine configuration, optionally loaded from `presubmit.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// File name looked up at the repository root by [`EngineConfig::load_from_root`].
pub const CONFIG_FILE_NAME: &str = "presubmit.toml";

/// Script file name recognized at every directory level.
pub const DEFAULT_SCRIPT_NAME: &str = "PRESUBMIT.rhai";

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for a verification run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Case-sensitive script file name probed in every ancestor directory.
    pub script_name: String,
    /// Script run when discovery finds nothing, relative to the repository root.
    pub default_script: Option<PathBuf>,
    /// Operation budget per script invocation (0 = unlimited).
    pub max_operations: u64,
    /// Treat a script runtime fault as a fatal result instead of an advisory one.
    pub script_faults_are_fatal: bool,
    /// Print progress lines ("Running ...") to the output stream.
    pub verbose: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            script_name: DEFAULT_SCRIPT_NAME.to_string(),
            default_script: None,
            max_operations: 0,
            script_faults_are_fatal: false,
            verbose: false,
        }
    }
}

impl EngineConfig {
    /// Parse configuration from TOML text. `origin` is only used in errors.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    /// Load `presubmit.toml` from the repository root, falling back to defaults
    /// when the file does not exist.
    pub fn load_from_root(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE_NAME);
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.script_name.is_empty() {
            return Err(ConfigError::Invalid("script_name must not be empty".into()));
        }
        if self.script_name.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(format!(
                "script_name must be a bare file name, got {:?}",
                self.script_name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.script_name, "PRESUBMIT.rhai");
        assert_eq!(cfg.default_script, None);
        assert_eq!(cfg.max_operations, 0);
        assert!(!cfg.script_faults_are_fatal);
        assert!(!cfg.verbose);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg = EngineConfig::from_toml_str(
            "default_script = \"tools/default.rhai\"\nmax_operations = 5000\n",
            Path::new("presubmit.toml"),
        )
        .unwrap();
        assert_eq!(cfg.script_name, DEFAULT_SCRIPT_NAME);
        assert_eq!(cfg.default_script, Some(PathBuf::from("tools/default.rhai")));
        assert_eq!(cfg.max_operations, 5000);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = EngineConfig::from_toml_str("colour = true\n", Path::new("presubmit.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_script_name_with_separator_rejected() {
        let err = EngineConfig::from_toml_str(
            "script_name = \"dir/PRESUBMIT.rhai\"\n",
            Path::new("presubmit.toml"),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_from_root_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = EngineConfig::load_from_root(dir.path()).unwrap();
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn test_load_from_root_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "script_name = \"CHECKS.rhai\"\nverbose = true\n",
        )
        .unwrap();
        let cfg = EngineConfig::load_from_root(dir.path()).unwrap();
        assert_eq!(cfg.script_name, "CHECKS.rhai");
        assert!(cfg.verbose);
    }
}
