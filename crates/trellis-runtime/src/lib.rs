//! Trellis Runtime - configuration, logging and application wiring.
//!
//! This crate provides:
//! - Layered configuration loading (`ConfigLoader`, `TrellisConfig`)
//! - Logging configuration (`LoggingBuilder`, `SpanEvents`)
//! - The long-lived application object (`TrellisApp`)
//!
//! ```ignore
//! use trellis_runtime::TrellisApp;
//!
//! fn main() -> trellis_runtime::RuntimeResult<()> {
//!     let mut registry = HandlerRegistry::new();
//!     registry.register::<Index>("App\\Index");
//!
//!     // Reads trellis.toml and TRELLIS_* variables, then sets up logging
//!     let app = TrellisApp::load(registry)?;
//!
//!     let page = app.handle_url("/index.html", Params::new(), None);
//!     println!("{}", page.body.as_text().unwrap_or_default());
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod logging;

// Re-exports
pub use app::TrellisApp;
pub use config::{
    ConfigError, ConfigLoader, ConfigResult, LoggingConfig, Profile, TrellisConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides the commonly used logging macros and `Level` for span
/// creation.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, span, trace, warn};
}
