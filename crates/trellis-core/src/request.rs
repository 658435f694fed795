//! Requests: a target handler method plus its named parameters.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::RequestConfig;

/// Named request parameters.
pub type Params = serde_json::Map<String, Value>;

/// Parameter carrying the output context (`json`, `html`, ...).
pub const CONTEXT_PARAM: &str = "context";

/// Parameter carrying the bubbling level budget.
pub const LEVEL_UP_PARAM: &str = "levelUp";

// =============================================================================
// HandlerId
// =============================================================================

/// Identifies a handler method: namespace, class and method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandlerId {
    /// Namespace prefix taken from configuration.
    pub namespace: String,
    /// Class segment, possibly nested with `\`.
    pub class: String,
    /// Method name.
    pub method: String,
}

impl HandlerId {
    pub fn new(
        namespace: impl Into<String>,
        class: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            class: class.into(),
            method: method.into(),
        }
    }

    /// The fully qualified type name: namespace plus the class with its
    /// first letter upper-cased.
    pub fn type_name(&self) -> String {
        format!("{}{}", self.namespace, ucfirst(&self.class))
    }

    /// Key of this method's signature entry: `Type#method`.
    pub fn signature_key(&self) -> String {
        format!("{}#{}", self.type_name(), self.method)
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.type_name(), self.method)
    }
}

// =============================================================================
// Request
// =============================================================================

/// A request for one handler method.
///
/// `history` is only populated while a parent request produced by bubbling
/// is being processed; it holds the requests that led to it, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    handler: HandlerId,
    params: Params,
    is_post: bool,
    history: Vec<Request>,
}

impl Request {
    /// Creates a request in the configured default namespace.
    ///
    /// Empty `class` or `method` fall back to the configured defaults.
    pub fn new(class: &str, method: &str, params: Params, config: &RequestConfig) -> Self {
        let class = if class.is_empty() {
            config.default_class.as_str()
        } else {
            class
        };
        let method = if method.is_empty() {
            config.default_method.as_str()
        } else {
            method
        };
        Self::from_handler(
            HandlerId::new(config.default_namespace.clone(), class, method),
            params,
        )
    }

    /// Creates a request targeting the configured default class and method.
    pub fn default_for(params: Params, config: &RequestConfig) -> Self {
        Self::new("", "", params, config)
    }

    /// Creates a request for an explicit handler.
    pub fn from_handler(handler: HandlerId, params: Params) -> Self {
        Self {
            handler,
            params,
            is_post: false,
            history: Vec::new(),
        }
    }

    /// Marks the request as a submission.
    pub fn with_post(mut self, is_post: bool) -> Self {
        self.is_post = is_post;
        self
    }

    pub fn handler(&self) -> &HandlerId {
        &self.handler
    }

    pub fn class(&self) -> &str {
        &self.handler.class
    }

    pub fn method(&self) -> &str {
        &self.handler.method
    }

    /// Fully qualified handler type name.
    pub fn type_name(&self) -> String {
        self.handler.type_name()
    }

    pub fn is_post(&self) -> bool {
        self.is_post
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    /// Returns a parameter value, treating `null` as absent.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name).filter(|v| !v.is_null())
    }

    /// Returns `true` when the parameter is present and not `null`.
    pub fn has_param(&self, name: &str) -> bool {
        self.param(name).is_some()
    }

    /// The requested output context, if any non-empty one was given.
    pub fn context(&self) -> Option<&str> {
        self.param(CONTEXT_PARAM)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// The requested level budget when the parameter is numeric.
    pub fn level_up(&self) -> Option<i64> {
        self.param(LEVEL_UP_PARAM).and_then(numeric)
    }

    /// Requests leading to this one, oldest first.
    pub fn history(&self) -> &[Request] {
        &self.history
    }

    pub fn set_history(&mut self, history: Vec<Request>) {
        self.history = history;
    }

    /// Removes and returns the history.
    pub fn take_history(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.history)
    }

    /// The request that started the chain: the first history entry, or this
    /// request when the history is empty.
    pub fn initial_request(&self) -> &Request {
        self.history.first().unwrap_or(self)
    }
}

/// Reads a numeric parameter from a number or a numeric string.
pub fn numeric(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}

// =============================================================================
// Name helpers
// =============================================================================

/// Upper-cases the first character.
pub fn ucfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lower-cases the first character.
pub fn lcfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Converts a class or method name to its URL form.
///
/// Capitals start a new hyphenated word and `\` becomes `/`:
/// `Admin\UserList` becomes `admin/user-list`.
pub fn to_url_form(name: &str) -> String {
    let mut spaced = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        match ch {
            '\\' => spaced.push('/'),
            c if c.is_ascii_uppercase() => {
                spaced.push(' ');
                spaced.push(c);
            }
            c => spaced.push(c),
        }
    }
    spaced
        .to_lowercase()
        .trim()
        .replace("/ ", "/")
        .replace(' ', "-")
}
