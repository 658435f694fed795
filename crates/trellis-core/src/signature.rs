//! Cached handler signatures.
//!
//! A [`SignatureEntry`] records everything parameter resolution needs to
//! know about one handler method, so that a cache hit can bind arguments
//! without consulting the handler's metadata again. [`FormEntry`] plays the
//! same role for form types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::filter::Filter;
use crate::parent::ParentSpec;

/// One declared method parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    /// Value used when the request does not supply the parameter.
    pub default: Value,
    /// Registered form type the parameter is bound to, if any.
    pub form: Option<String>,
    /// Filters applied to a supplied value, in order.
    pub filters: Vec<Filter>,
}

/// The resolved signature of a handler method.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignatureEntry {
    pub declared_parent: ParentSpec,
    pub params: Vec<ParamSpec>,
}

impl SignatureEntry {
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.name.as_str())
    }
}

/// One filtered form field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub filters: Vec<Filter>,
}

/// The resolved field list of a form type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormEntry {
    pub fields: Vec<FieldSpec>,
}

/// Cache key of a method signature: `Type#method`.
pub fn signature_key(type_name: &str, method: &str) -> String {
    format!("{type_name}#{method}")
}

/// Cache key of a form's field list: `Type#form`.
pub fn form_key(type_name: &str) -> String {
    format!("{type_name}#form")
}
