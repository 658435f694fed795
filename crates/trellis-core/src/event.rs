//! Response-scoped events.
//!
//! Every response node carries an [`EventBus`]. Handlers record events on
//! it with [`EventBus::trigger`] and later consume them with
//! [`EventBus::listen`]. Events are delivered in the order they were
//! recorded, and a listener can stop delivery in two ways: by calling
//! [`Event::stop_propagation`], or by returning the failure sentinel.
//!
//! ```rust,ignore
//! use trellis_core::{Event, EventBus};
//! use serde_json::json;
//!
//! let mut bus = EventBus::new();
//! bus.trigger(Event::new("saved", Default::default()));
//! bus.listen("saved", |event| {
//!     event.stop_propagation();
//!     json!("handled")
//! });
//! ```

use std::collections::BTreeMap;

use serde_json::Value;

use crate::request::{HandlerId, Params};

/// The value a listener returns to signal failure. It cancels the event.
pub const FAILURE: Value = Value::Bool(false);

/// Returns `true` when `value` is the failure sentinel.
pub fn is_failure(value: &Value) -> bool {
    matches!(value, Value::Bool(false))
}

/// A named occurrence recorded on a response node.
///
/// Nodes do not point back at their events' owners, so an event records the
/// handler whose node it was triggered on instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Event type name.
    pub kind: String,
    /// Parameters given at trigger time.
    pub params: Params,
    /// Handler of the node the event was triggered on, if known.
    pub source: Option<HandlerId>,
    /// Value returned by the last listener that ran, `null` before that.
    pub result: Value,
    cancelled: bool,
}

impl Event {
    pub fn new(kind: impl Into<String>, params: Params) -> Self {
        Self {
            kind: kind.into(),
            params,
            source: None,
            result: Value::Null,
            cancelled: false,
        }
    }

    /// Binds the event to the handler whose node records it.
    pub fn with_source(mut self, source: HandlerId) -> Self {
        self.source = Some(source);
        self
    }

    /// Stops delivery of this event to later listeners.
    pub fn stop_propagation(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Ordered event storage, keyed by event type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventBus {
    events: BTreeMap<String, Vec<Event>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an event under its type.
    pub fn trigger(&mut self, event: Event) {
        self.events.entry(event.kind.clone()).or_default().push(event);
    }

    /// Delivers every pending event of `kind` to `listener`.
    ///
    /// Already cancelled events are skipped. The listener's return value is
    /// stored as the event result; returning [`FAILURE`] cancels the event.
    /// Returns the number of events delivered.
    pub fn listen<F>(&mut self, kind: &str, mut listener: F) -> usize
    where
        F: FnMut(&mut Event) -> Value,
    {
        let Some(events) = self.events.get_mut(kind) else {
            return 0;
        };

        let mut delivered = 0;
        for event in events.iter_mut().filter(|e| !e.cancelled) {
            let result = listener(event);
            if is_failure(&result) {
                event.cancelled = true;
            }
            event.result = result;
            delivered += 1;
        }
        delivered
    }

    /// Appends copies of every event of `other` after the events already
    /// stored. Cancelling a copy leaves the event on `other` untouched.
    pub fn merge(&mut self, other: &EventBus) {
        for (kind, events) in &other.events {
            self.events
                .entry(kind.clone())
                .or_default()
                .extend(events.iter().cloned());
        }
    }

    /// Events recorded under `kind`, in trigger order.
    pub fn events(&self, kind: &str) -> &[Event] {
        self.events.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.events.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.events.values().all(Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: i64) -> Params {
        let mut p = Params::new();
        p.insert("n".into(), json!(value));
        p
    }

    #[test]
    fn test_listen_in_trigger_order() {
        let mut bus = EventBus::new();
        bus.trigger(Event::new("saved", params(1)));
        bus.trigger(Event::new("saved", params(2)));
        bus.trigger(Event::new("other", params(3)));

        let mut seen = Vec::new();
        let delivered = bus.listen("saved", |event| {
            seen.push(event.params["n"].clone());
            json!("ok")
        });
        assert_eq!(delivered, 2);
        assert_eq!(seen, vec![json!(1), json!(2)]);
        assert_eq!(bus.events("saved")[1].result, json!("ok"));
        assert_eq!(bus.listen("missing", |_| Value::Null), 0);
    }

    #[test]
    fn test_failure_result_cancels() {
        let mut bus = EventBus::new();
        bus.trigger(Event::new("saved", params(1)));

        assert_eq!(bus.listen("saved", |_| FAILURE), 1);
        assert!(bus.events("saved")[0].is_cancelled());

        let mut second_listener_ran = false;
        assert_eq!(
            bus.listen("saved", |_| {
                second_listener_ran = true;
                Value::Null
            }),
            0
        );
        assert!(!second_listener_ran);
    }

    #[test]
    fn test_stop_propagation_cancels() {
        let mut bus = EventBus::new();
        bus.trigger(Event::new("saved", params(1)));
        bus.listen("saved", |event| {
            event.stop_propagation();
            json!(true)
        });
        assert_eq!(bus.listen("saved", |_| Value::Null), 0);
    }

    #[test]
    fn test_merge_appends() {
        let mut a = EventBus::new();
        a.trigger(Event::new("x", params(1)));
        let mut b = EventBus::new();
        b.trigger(Event::new("x", params(2)));
        b.trigger(Event::new("y", params(3)));

        a.merge(&b);
        assert_eq!(a.events("x").len(), 2);
        assert_eq!(a.events("x")[1].params["n"], json!(2));
        assert_eq!(a.kinds().collect::<Vec<_>>(), vec!["x", "y"]);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_merged_copies_keep_their_source() {
        let widget = HandlerId::new("App\\", "Index", "widget");
        let mut child = EventBus::new();
        child.trigger(Event::new("rendered", params(1)).with_source(widget.clone()));

        let mut parent = EventBus::new();
        parent.merge(&child);
        parent.listen("rendered", |_| FAILURE);

        assert_eq!(parent.events("rendered")[0].source.as_ref(), Some(&widget));
        assert!(parent.events("rendered")[0].is_cancelled());
        assert!(!child.events("rendered")[0].is_cancelled());
    }
}
