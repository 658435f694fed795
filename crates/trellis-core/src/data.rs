//! Response data: a string-keyed map whose values may be plain values,
//! nested response nodes, or response sources.
//!
//! Nodes may sit directly under a key or one level down inside a
//! [`Slot::List`]. Deeper nesting is not representable, which is what the
//! renderer relies on when it dereferences nodes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::request::Params;
use crate::response::Response;

/// Anything that can produce a response node on demand.
pub trait ResponseSource: Send + Sync {
    fn response(&self) -> Response;
}

/// A value stored under one data key.
#[derive(Clone)]
pub enum Slot {
    Value(Value),
    Node(Box<Response>),
    Source(Arc<dyn ResponseSource>),
    /// A list whose items may themselves be nodes.
    List(Vec<Item>),
}

/// An item inside a [`Slot::List`].
#[derive(Clone)]
pub enum Item {
    Value(Value),
    Node(Box<Response>),
    Source(Arc<dyn ResponseSource>),
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Node(n) => f.debug_tuple("Node").field(n).finish(),
            Self::Source(_) => f.write_str("Source(..)"),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
        }
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Node(n) => f.debug_tuple("Node").field(n).finish(),
            Self::Source(_) => f.write_str("Source(..)"),
        }
    }
}

impl Slot {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Response> {
        match self {
            Self::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_node_mut(&mut self) -> Option<&mut Response> {
        match self {
            Self::Node(n) => Some(n),
            _ => None,
        }
    }

    /// Nodes stored in this slot, directly or as list items.
    pub fn nodes(&self) -> Vec<&Response> {
        match self {
            Self::Node(n) => vec![n.as_ref()],
            Self::List(items) => items
                .iter()
                .filter_map(|item| match item {
                    Item::Node(n) => Some(n.as_ref()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl From<Value> for Slot {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Response> for Slot {
    fn from(node: Response) -> Self {
        Self::Node(Box::new(node))
    }
}

impl From<Arc<dyn ResponseSource>> for Slot {
    fn from(source: Arc<dyn ResponseSource>) -> Self {
        Self::Source(source)
    }
}

impl From<Vec<Item>> for Slot {
    fn from(items: Vec<Item>) -> Self {
        Self::List(items)
    }
}

impl From<Value> for Item {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Response> for Item {
    fn from(node: Response) -> Self {
        Self::Node(Box::new(node))
    }
}

/// The data map of a response node.
#[derive(Debug, Clone, Default)]
pub struct Data {
    entries: BTreeMap<String, Slot>,
}

impl Data {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds data from an arbitrary value.
    ///
    /// Objects become entries, `null` becomes empty data, arrays are keyed
    /// by index and any other scalar is stored under `"0"`.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => map.into(),
            Value::Null => Self::new(),
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), Slot::Value(v)))
                .collect(),
            scalar => {
                let mut data = Self::new();
                data.set("0", scalar);
                data
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: &str) -> Option<&Slot> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Slot> {
        self.entries.get_mut(key)
    }

    /// The plain value under `key`, if it holds one.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.get(key).and_then(Slot::as_value)
    }

    /// The node under `key`, if it holds one.
    pub fn node(&self, key: &str) -> Option<&Response> {
        self.get(key).and_then(Slot::as_node)
    }

    pub fn set(&mut self, key: impl Into<String>, slot: impl Into<Slot>) -> Option<Slot> {
        self.entries.insert(key.into(), slot.into())
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Slot> {
        self.entries.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Slot)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Overwrites entries with those of `other`; keys only in `self` stay.
    pub fn merge(&mut self, other: Data) {
        self.entries.extend(other.entries);
    }

    /// Every node held directly or inside a list.
    pub fn nodes(&self) -> impl Iterator<Item = &Response> {
        self.entries.values().flat_map(Slot::nodes)
    }
}

impl From<Params> for Data {
    fn from(params: Params) -> Self {
        params
            .into_iter()
            .map(|(k, v)| (k, Slot::Value(v)))
            .collect()
    }
}

impl FromIterator<(String, Slot)> for Data {
    fn from_iter<I: IntoIterator<Item = (String, Slot)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Data {
    type Item = (String, Slot);
    type IntoIter = std::collections::btree_map::IntoIter<String, Slot>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
