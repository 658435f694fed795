//! Controller contract and handler metadata.
//!
//! A controller is a type whose methods are dispatched by name. Because
//! Rust has no runtime reflection, every controller type describes itself
//! with a [`TypeMeta`]: its methods, their parameters (defaults, filter
//! expressions, form types) and the parents they declare. The resolver reads
//! this description only when a signature is not cached.
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_framework::prelude::*;
//! use serde_json::json;
//!
//! #[derive(Default)]
//! struct Users;
//!
//! impl Controller for Users {
//!     fn describe() -> TypeMeta {
//!         TypeMeta::new()
//!             .parent("layout")
//!             .method(
//!                 MethodMeta::new("show")
//!                     .param(ParamMeta::new("id").default(json!(0)).filter("int(min=1)")),
//!             )
//!     }
//!
//!     fn invoke(&mut self, method: &str, args: Args, cx: &mut Context<'_>) -> DispatchResult<Outcome> {
//!         match method {
//!             "show" => Ok(json!({ "id": args.value("id") }).into()),
//!             _ => Err(cx.method_not_found(method)),
//!         }
//!     }
//! }
//! ```

use serde_json::Value;
use trellis_core::{Data, DispatchResult, Response};

use crate::context::Context;
use crate::form::Form;
use crate::resolver::Args;

// ============================================================================
// Controller
// ============================================================================

/// A dispatchable handler type.
///
/// A fresh instance is created for every request, so per-request state can
/// live in plain fields.
pub trait Controller: 'static {
    /// Describes methods, parameters and declared parents.
    fn describe() -> TypeMeta
    where
        Self: Sized;

    /// Runs before the method is invoked.
    fn init(&mut self, _cx: &mut Context<'_>) -> DispatchResult<()> {
        Ok(())
    }

    /// Runs `method` with the bound arguments.
    ///
    /// Methods not listed in [`TypeMeta`] only reach this call when the type
    /// is marked [`catch_all`](TypeMeta::catch_all).
    fn invoke(&mut self, method: &str, args: Args, cx: &mut Context<'_>)
    -> DispatchResult<Outcome>;
}

/// What a controller method returns.
#[derive(Debug, Default)]
pub enum Outcome {
    /// Keep the context's response as it is.
    #[default]
    Empty,
    /// Merge into the response data, or set it when the data is empty.
    Data(Data),
    /// Replace the response entirely.
    Response(Response),
}

impl From<()> for Outcome {
    fn from(_: ()) -> Self {
        Self::Empty
    }
}

impl From<Data> for Outcome {
    fn from(data: Data) -> Self {
        Self::Data(data)
    }
}

impl From<Value> for Outcome {
    fn from(value: Value) -> Self {
        if value.is_null() {
            Self::Empty
        } else {
            Self::Data(Data::from_value(value))
        }
    }
}

impl From<Response> for Outcome {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// Self-description of a controller type.
#[derive(Debug, Clone, Default)]
pub struct TypeMeta {
    /// Type-level parent declaration, `target [content_key]`.
    pub parent: Option<String>,
    /// Whether unknown methods are routed to [`Controller::invoke`].
    pub catch_all: bool,
    pub methods: Vec<MethodMeta>,
}

impl TypeMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parent(mut self, declaration: impl Into<String>) -> Self {
        self.parent = Some(declaration.into());
        self
    }

    pub fn catch_all(mut self) -> Self {
        self.catch_all = true;
        self
    }

    pub fn method(mut self, method: MethodMeta) -> Self {
        self.methods.push(method);
        self
    }

    pub fn find_method(&self, name: &str) -> Option<&MethodMeta> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// Description of one method.
#[derive(Debug, Clone)]
pub struct MethodMeta {
    pub name: String,
    /// Method-level parent declaration; wins over the type's.
    pub parent: Option<String>,
    pub params: Vec<ParamMeta>,
}

impl MethodMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            params: Vec::new(),
        }
    }

    pub fn parent(mut self, declaration: impl Into<String>) -> Self {
        self.parent = Some(declaration.into());
        self
    }

    pub fn param(mut self, param: ParamMeta) -> Self {
        self.params.push(param);
        self
    }
}

/// Description of one method parameter.
#[derive(Debug, Clone)]
pub struct ParamMeta {
    pub name: String,
    pub default: Value,
    pub form: Option<String>,
    pub filters: Vec<String>,
}

impl ParamMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: Value::Null,
            form: None,
            filters: Vec::new(),
        }
    }

    pub fn default(mut self, value: Value) -> Self {
        self.default = value;
        self
    }

    /// Adds a filter expression, applied after those added before it.
    pub fn filter(mut self, expression: impl Into<String>) -> Self {
        self.filters.push(expression.into());
        self
    }

    /// Binds the parameter to the form type `F`.
    pub fn form<F: Form>(mut self) -> Self {
        self.form = Some(F::form_name());
        self
    }
}
