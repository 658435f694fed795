//! Configuration loading and validation for Trellis applications.
//!
//! Settings are layered from defaults, files and `TRELLIS_*` environment
//! variables by the [`ConfigLoader`], then checked by [`validate_config`].

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, PROFILE_ENV, Profile, load_config, load_config_from_file};
pub use schema::{
    LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, SpanEventConfig, TrellisConfig,
};
pub use validation::{validate_config, validate_engine_config};
