//! Typed forms.
//!
//! A form groups several request fields behind one method parameter. Its
//! field list and filters are cached under `Type#form`, so binding a form
//! repeatedly costs one cache lookup plus the filter work.

use serde_json::Value;
use trellis_core::Params;

/// A type built from filtered request fields.
pub trait Form: Sized + 'static {
    /// Describes the fields and their filters.
    fn describe() -> FormMeta;

    /// Builds the form from filtered field values.
    fn bind(data: FormData) -> Self;

    /// Registry name of the form type.
    fn form_name() -> String {
        std::any::type_name::<Self>().to_string()
    }
}

/// Self-description of a form type.
#[derive(Debug, Clone, Default)]
pub struct FormMeta {
    pub fields: Vec<FieldMeta>,
}

impl FormMeta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field with its filter expressions.
    pub fn field<I, S>(mut self, name: impl Into<String>, filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.push(FieldMeta {
            name: name.into(),
            filters: filters.into_iter().map(Into::into).collect(),
        });
        self
    }
}

/// Description of one form field.
#[derive(Debug, Clone)]
pub struct FieldMeta {
    pub name: String,
    pub filters: Vec<String>,
}

/// Filtered field values handed to [`Form::bind`].
///
/// Only fields present in the request are set. `has_error` reports whether
/// any of them was rejected by a filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
    values: Params,
    error: bool,
}

impl FormData {
    pub(crate) fn new(values: Params, error: bool) -> Self {
        Self { values, error }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// The field as a string, if it holds one.
    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn has_error(&self) -> bool {
        self.error
    }

    pub fn into_values(self) -> Params {
        self.values
    }
}
