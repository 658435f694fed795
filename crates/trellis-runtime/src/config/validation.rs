//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LoggingConfig, TrellisConfig};
use trellis_core::EngineConfig;

/// Validates the entire configuration.
pub fn validate_config(config: &TrellisConfig) -> ConfigResult<()> {
    validate_engine_config(&config.engine)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

/// Validates the engine settings a dispatcher cannot run without.
pub fn validate_engine_config(engine: &EngineConfig) -> ConfigResult<()> {
    if engine.request.default_namespace.trim().is_empty() {
        return Err(ConfigError::missing_field("engine.request.default_namespace"));
    }
    if engine.response.view_directory.trim().is_empty() {
        return Err(ConfigError::missing_field("engine.response.view_directory"));
    }
    if engine.response.exception_view.trim().is_empty() {
        return Err(ConfigError::missing_field("engine.response.exception_view"));
    }

    let suffix = &engine.response.view_suffix;
    if suffix.is_empty() || suffix.contains(['.', '/']) {
        return Err(ConfigError::validation(format!(
            "View suffix must be a bare extension, got '{suffix}'"
        )));
    }
    if engine.request.default_class.is_empty() || engine.request.default_method.is_empty() {
        return Err(ConfigError::validation(
            "Default class and method must not be empty",
        ));
    }
    if !engine.request.base_path.is_empty() && !engine.request.base_path.starts_with('/') {
        return Err(ConfigError::validation("Base path must start with '/'"));
    }

    Ok(())
}

/// Validates logging configuration.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    for module in logging.filters.keys() {
        if module.is_empty() || module.contains(['=', ',', ' ']) {
            return Err(ConfigError::validation(format!(
                "Invalid log filter target: '{module}'"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    fn valid() -> TrellisConfig {
        let mut config = TrellisConfig::default();
        config.engine.request.default_namespace = "App\\".into();
        config.engine.response.view_directory = "views".into();
        config.engine.response.exception_view = "error.tpl".into();
        config
    }

    #[test]
    fn test_validate_complete_config() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_validate_default_config_misses_namespace() {
        let result = validate_config(&TrellisConfig::default());
        assert!(matches!(
            result,
            Err(ConfigError::MissingField { field }) if field == "engine.request.default_namespace"
        ));
    }

    #[test]
    fn test_validate_required_response_fields() {
        let mut config = valid();
        config.engine.response.exception_view.clear();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));

        let mut config = valid();
        config.engine.response.view_suffix = ".tpl".into();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_validate_logging() {
        let mut config = valid();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());
        config.logging.file_path = Some("trellis.log".into());
        assert!(validate_config(&config).is_ok());

        config.logging.filters.insert("a=b".into(), LogLevel::Debug);
        assert!(validate_config(&config).is_err());
    }
}
