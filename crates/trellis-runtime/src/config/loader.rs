//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: enables TOML files (`trellis.toml`, `config.toml`)
//! - `yaml-config`: enables YAML files (`trellis.yaml`, `trellis.yml`, `config.yaml`, `config.yml`)
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Profile-specific config file (`trellis.{profile}.toml`)
//! 3. Main config file (`trellis.toml`)
//! 4. Environment variables (`TRELLIS_*`)
//! 5. Programmatic overrides
//!
//! # Environment Variable Mapping
//!
//! Variables use the `TRELLIS_` prefix with `__` as the nesting separator:
//!
//! - `TRELLIS_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `TRELLIS_ENGINE__RESPONSE__VIEW_DIRECTORY=/srv/views` → `engine.response.view_directory`
//! - `TRELLIS_ENGINE__CACHE__ENABLED=false` → `engine.cache.enabled = false`
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./config/trellis.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::TrellisConfig;
use super::validation::validate_config;

/// Environment variable selecting the profile.
pub const PROFILE_ENV: &str = "TRELLIS_PROFILE";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name; `prod` and `dev` are accepted as short forms.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads [`PROFILE_ENV`], defaulting to development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_ENV)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    figment: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    /// Specific config file to load (overrides search).
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Profile::parse(&profile.into());
        self
    }

    /// Adds a search path for configuration files.
    ///
    /// Without any search path the current directory and the user config
    /// directory (`~/.config/trellis` or the platform equivalent) are used.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(config_dir) => self.search_path(config_dir.join("trellis")),
            None => self,
        }
    }

    /// Sets a specific configuration file to load.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables loading environment variables (default: true).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges programmatic overrides, applied after every other source.
    pub fn merge(mut self, config: TrellisConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads the configuration without validating it.
    pub fn load(self) -> ConfigResult<TrellisConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;
        let config: TrellisConfig = figment.extract()?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            view_directory = %config.engine.response.view_directory,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Loads and validates the configuration.
    pub fn load_validated(self) -> ConfigResult<TrellisConfig> {
        let config = self.load()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(TrellisConfig::default()));

        if let Some(path) = self.config_file.take() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, &path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with TRELLIS_ prefix");
            figment = figment.merge(Env::prefixed("TRELLIS_").split("__"));
        }

        let overrides = std::mem::take(&mut self.figment);
        Ok(figment.merge(overrides))
    }

    /// Merges one file, dispatching on its extension.
    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => Err(ConfigError::ParseError(format!(
                "Unsupported or disabled configuration file format: .{ext}"
            ))),
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("trellis"));
        }
        paths
    }

    /// Tries `search_paths × base_names`, merging a profile variant before
    /// its base file. Stops at the first base file found.
    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn load_format_files<F>(
        &self,
        mut figment: Figment,
        search_paths: &[PathBuf],
        base_names: &[&str],
        merge_fn: F,
    ) -> (Figment, bool)
    where
        F: Fn(Figment, &Path) -> Figment,
    {
        for search_path in search_paths {
            for base_name in base_names {
                let Some((stem, ext)) = base_name.rsplit_once('.') else {
                    continue;
                };

                let profile_path = search_path.join(format!("{stem}.{}.{ext}", self.profile));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile-specific config");
                    figment = merge_fn(figment, &profile_path);
                }

                let base_path = search_path.join(base_name);
                if base_path.exists() {
                    info!(path = %base_path.display(), "Loading configuration file");
                    return (merge_fn(figment, &base_path), true);
                }
            }
        }
        (figment, false)
    }

    #[allow(unused_mut)]
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
        let search_paths = self.resolve_search_paths();
        let mut found = false;

        #[cfg(feature = "toml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["trellis.toml", "config.toml"],
                |fig, path| fig.merge(Toml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        #[cfg(feature = "yaml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["trellis.yaml", "trellis.yml", "config.yaml", "config.yml"],
                |fig, path| fig.merge(Yaml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        if !found {
            warn!("No configuration file found, using defaults");
        }
        figment
    }
}

/// Loads and validates configuration from the default locations.
pub fn load_config() -> ConfigResult<TrellisConfig> {
    ConfigLoader::new().load_validated()
}

/// Loads and validates configuration from one file plus the environment.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<TrellisConfig> {
    ConfigLoader::new().file(path).load_validated()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::new()
            .search_path(dir.path())
            .without_env()
            .load()
            .unwrap();

        assert_eq!(config.logging.level.as_str(), "info");
        assert_eq!(config.engine.max_bubble_depth, 32);
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("PROD"), Profile::Production);
        assert_eq!(Profile::parse("dev"), Profile::Development);
        assert_eq!(Profile::parse("staging").as_str(), "staging");
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigLoader::new()
            .file("/definitely/not/here/trellis.toml")
            .without_env()
            .load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_profile_file_then_base_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("trellis.staging.toml"),
            "[engine.response]\nview_directory = \"staging-views\"\ndefault_media = \"amp\"\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("trellis.toml"),
            "[engine.response]\nview_directory = \"views\"\n\n[logging]\nlevel = \"debug\"\n",
        )
        .unwrap();

        let config = ConfigLoader::new()
            .profile("staging")
            .search_path(dir.path())
            .without_env()
            .load()
            .unwrap();

        assert_eq!(config.engine.response.view_directory, "views");
        assert_eq!(config.engine.response.default_media, "amp");
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_overrides_win_and_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trellis.toml");
        std::fs::write(
            &path,
            "[engine.request]\ndefault_namespace = \"App\\\\\"\n\n[engine.response]\nview_directory = \"views\"\n",
        )
        .unwrap();

        let result = ConfigLoader::new().file(&path).without_env().load_validated();
        assert!(matches!(result, Err(ConfigError::MissingField { .. })));

        let mut overrides = ConfigLoader::new().file(&path).without_env().load().unwrap();
        assert_eq!(overrides.engine.request.default_namespace, "App\\");
        overrides.engine.response.exception_view = "error.tpl".into();

        let config = ConfigLoader::new()
            .file(&path)
            .without_env()
            .merge(overrides)
            .load_validated()
            .unwrap();
        assert_eq!(config.engine.response.exception_view, "error.tpl");
    }
}
