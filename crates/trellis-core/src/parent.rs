//! Parent references: what a response node embeds itself into.

use serde::{Deserialize, Serialize};

use crate::request::Request;
use crate::response::Response;

/// Data key a child is stored under when the parent names none.
pub const DEFAULT_CONTENT_KEY: &str = "content";

/// A response node's parent.
#[derive(Debug, Clone, Default)]
pub enum Parent {
    /// No parent; bubbling stops here.
    #[default]
    None,
    /// An already built response node.
    Node(Box<Response>),
    /// A route locator, `"json"`, or a view path ending in the view suffix.
    Named(String),
    /// A named parent plus the key the child is stored under.
    Keyed {
        target: String,
        content_key: String,
    },
    /// A request that is processed to produce the parent.
    Request(Box<Request>),
}

impl Parent {
    pub fn named(target: impl Into<String>) -> Self {
        Self::Named(target.into())
    }

    pub fn keyed(target: impl Into<String>, content_key: impl Into<String>) -> Self {
        Self::Keyed {
            target: target.into(),
            content_key: content_key.into(),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl From<Response> for Parent {
    fn from(node: Response) -> Self {
        Self::Node(Box::new(node))
    }
}

impl From<Request> for Parent {
    fn from(request: Request) -> Self {
        Self::Request(Box::new(request))
    }
}

/// The serializable part of a parent reference, as stored in signature
/// entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentSpec {
    #[default]
    None,
    Named(String),
    Keyed {
        target: String,
        content_key: String,
    },
}

impl ParentSpec {
    /// Parses a parent declaration: `target` or `target content_key`.
    ///
    /// The content key is the leading run of word characters of the second
    /// token, so `layout main-body` stores the child under `main`. A blank
    /// declaration yields [`ParentSpec::None`].
    pub fn parse(declaration: &str) -> Self {
        let mut tokens = declaration.split_whitespace();
        let Some(target) = tokens.next() else {
            return Self::None;
        };
        let key = tokens.next().map(|token| {
            let end = token
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(token.len());
            &token[..end]
        });
        match key {
            Some(key) if !key.is_empty() => Self::Keyed {
                target: target.to_string(),
                content_key: key.to_string(),
            },
            _ => Self::Named(target.to_string()),
        }
    }
}

impl From<ParentSpec> for Parent {
    fn from(spec: ParentSpec) -> Self {
        match spec {
            ParentSpec::None => Parent::None,
            ParentSpec::Named(target) => Parent::Named(target),
            ParentSpec::Keyed {
                target,
                content_key,
            } => Parent::Keyed {
                target,
                content_key,
            },
        }
    }
}
