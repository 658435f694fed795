//! # Trellis
//!
//! Compose server-rendered pages out of nested, independently resolved
//! responses.
//!
//! ## Overview
//!
//! A request names a handler class and method. The handler produces a
//! response node, and the node may declare a parent request that wraps it.
//! The dispatcher climbs that chain until it reaches a terminal node, so a
//! page ends up as a tree of responses that the renderer turns into text.
//!
//! ```text
//! ┌─────────┐     ┌────────────┐     ┌────────────────┐     ┌──────────┐
//! │ Request │────▶│ Dispatcher │────▶│ Users#show     │────▶│ Renderer │──▶ page
//! └─────────┘     │  (queue)   │     │   ▲ bubbles to │     │  (views) │
//!                 └────────────┘     │ Layout#index   │     └──────────┘
//!                                    └────────────────┘
//! ```
//!
//! - **Core**: requests, responses, parents, filters and the signature cache
//! - **Framework**: controllers, parameter resolution, dispatch and rendering
//! - **Runtime**: configuration, logging and the `TrellisApp` entry point
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use trellis::prelude::*;
//!
//! #[derive(Default)]
//! struct Users;
//!
//! impl Controller for Users {
//!     fn describe() -> TypeMeta {
//!         TypeMeta::new()
//!             .parent("/layout")
//!             .method(MethodMeta::new("show").param(ParamMeta::new("id").filter("int(min=1)")))
//!     }
//!
//!     fn invoke(&mut self, _: &str, args: Args, _: &mut Context<'_>) -> DispatchResult<Outcome> {
//!         Ok(serde_json::json!({ "id": args.value("id") }).into())
//!     }
//! }
//!
//! fn main() -> trellis::runtime::RuntimeResult<()> {
//!     let mut registry = HandlerRegistry::new();
//!     registry.register::<Users>("App\\Users");
//!
//!     let app = TrellisApp::load(registry)?;
//!     let page = app.handle_url("/users/show?id=3", Params::new(), None);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: read `trellis.toml` files (default)
//! - `yaml-config`: read `trellis.yaml` files
//! - `json-log`: JSON log output

pub use trellis_core as core;
pub use trellis_framework as framework;
pub use trellis_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use trellis::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use trellis_runtime::{TrellisApp, TrellisConfig};

    // Handlers, dispatch and rendering
    pub use trellis_framework::prelude::*;
}
