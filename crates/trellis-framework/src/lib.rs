//! # Trellis Framework
//!
//! The moving parts of the response-composition engine, built on the types
//! of `trellis-core`:
//!
//! - [`Dispatcher`]: FIFO request queue, plugin hooks and parent bubbling
//! - [`Controller`] and [`HandlerRegistry`]: handler types described by
//!   [`TypeMeta`] and created per request
//! - [`ParameterResolver`]: binds request parameters to method arguments
//!   through cached signatures and filter chains
//! - [`Form`]: typed parameter objects bound through the same cache
//! - [`RouteParser`]: turns URL-like locators into requests
//! - [`Renderer`]: serializes or renders response trees, with capture bins
//!   shared by the views of one page

pub mod context;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod finder;
pub mod form;
pub mod plugin;
pub mod registry;
pub mod render;
pub mod resolver;
pub mod route;

pub use context::Context;
pub use controller::{Controller, MethodMeta, Outcome, ParamMeta, TypeMeta};
pub use dispatcher::Dispatcher;
pub use error::{ViewError, ViewResult};
pub use finder::ParentFinder;
pub use form::{FieldMeta, Form, FormData, FormMeta};
pub use plugin::Plugin;
pub use registry::{FormType, HandlerRegistry, HandlerType};
pub use render::{
    Body, CaptureBins, ContentType, DirectoryLocator, PlaceholderEngine, RenderOptions,
    RenderOutput, Renderer, Status, VIEW_NOT_FOUND, ViewEngine, ViewLocator,
};
pub use resolver::{Arg, Args, ParameterResolver, Resolved};
pub use route::{PathRouteParser, RouteParser};

/// Everything a controller module usually needs.
pub mod prelude {
    pub use crate::{
        Args, Context, Controller, Dispatcher, Form, FormData, FormMeta, HandlerRegistry,
        MethodMeta, Outcome, ParamMeta, Plugin, RenderOptions, Renderer, TypeMeta,
    };
    pub use trellis_core::prelude::*;
}
