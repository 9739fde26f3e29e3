//! Configuration loading and root folder resolution
//!
//! Each setting resolves in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing config file is not an error; Flipfix starts on defaults and
//! says so in the log.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{Error, Result};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "FLIPFIX_ROOT_FOLDER";

/// Environment variable naming the TOML config file
pub const CONFIG_FILE_ENV: &str = "FLIPFIX_CONFIG";

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5780";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "flipfix.db";

/// Optional feature areas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub wiki_enabled: bool,
    pub parts_enabled: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            wiki_enabled: true,
            parts_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Contents of `config.toml`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub bind_address: String,
    /// Skip maintainer authentication (development only)
    pub auth_disabled: bool,
    pub features: FeatureFlags,
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            auth_disabled: false,
            features: FeatureFlags::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TomlConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Load a config file, falling back to defaults if it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

/// Locate and load the TOML config
///
/// `cli_path` wins over `FLIPFIX_CONFIG`, which wins over the platform
/// config directory (`~/.config/flipfix/config.toml` on Linux).
pub fn load_config(cli_path: Option<&Path>) -> Result<TomlConfig> {
    let path = cli_path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_FILE_ENV).map(PathBuf::from))
        .or_else(default_config_path);

    match path {
        Some(path) => TomlConfig::load(&path),
        None => {
            warn!("No config directory on this platform, using defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Resolve the root folder holding the database
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Some(path) = std::env::var_os(ROOT_FOLDER_ENV) {
        return PathBuf::from(path);
    }

    // Priority 3: TOML config file
    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Database path for a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE)
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("flipfix").join("config.toml"))
}

fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("flipfix"))
        .unwrap_or_else(|| PathBuf::from("./flipfix_data"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert!(!config.auth_disabled);
        assert!(config.features.wiki_enabled);
        assert!(config.features.parts_enabled);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_config() {
        let config = TomlConfig::from_toml_str(
            r#"
            root_folder = "/srv/flipfix"
            auth_disabled = true

            [features]
            parts_enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.root_folder, Some(PathBuf::from("/srv/flipfix")));
        assert!(config.auth_disabled);
        assert!(config.features.wiki_enabled);
        assert!(!config.features.parts_enabled);
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let result = TomlConfig::from_toml_str("bind_address = [1, 2");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = TomlConfig::load(&temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, TomlConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "bind_address = \"0.0.0.0:8080\"\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:8080");
    }

    #[test]
    #[serial]
    fn test_root_folder_priority() {
        let config = TomlConfig {
            root_folder: Some(PathBuf::from("/from/toml")),
            ..TomlConfig::default()
        };

        env::set_var(ROOT_FOLDER_ENV, "/from/env");
        assert_eq!(
            resolve_root_folder(Some(Path::new("/from/cli")), &config),
            PathBuf::from("/from/cli")
        );
        assert_eq!(resolve_root_folder(None, &config), PathBuf::from("/from/env"));

        env::remove_var(ROOT_FOLDER_ENV);
        assert_eq!(resolve_root_folder(None, &config), PathBuf::from("/from/toml"));

        let fallback = resolve_root_folder(None, &TomlConfig::default());
        assert!(fallback.ends_with("flipfix") || fallback.ends_with("flipfix_data"));
    }

    #[test]
    fn test_database_path() {
        assert_eq!(
            database_path(Path::new("/srv/flipfix")),
            PathBuf::from("/srv/flipfix/flipfix.db")
        );
    }
}
