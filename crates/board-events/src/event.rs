//! The event value object and its descriptor.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;

/// Kind of an event delivered through the hub.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// An ordinary published event.
    #[default]
    Native,
    /// Synthetic notice emitted when a subscription is registered.
    Subscribe,
    /// Synthetic notice emitted when a subscription is removed.
    Unsubscribe,
}

/// Scalar key/value mapping identifying an event's logical topic.
///
/// Keys are kept sorted, so the canonical JSON form is stable and two
/// descriptors are equal iff they have identical key/value sets
/// regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Descriptor(BTreeMap<String, Value>);

impl Descriptor {
    /// Create an empty descriptor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a descriptor field.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style variant of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Get a descriptor field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check whether the descriptor has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Partial-match rule: check that every key of `require` is present
    /// in this descriptor with an equal value. Extra keys in the
    /// descriptor are ignored; an empty `require` matches anything.
    #[must_use]
    pub fn satisfies(&self, require: &Descriptor) -> bool {
        require
            .0
            .iter()
            .all(|(key, value)| self.0.get(key) == Some(value))
    }

    /// Canonical form: JSON of the sorted key/value map.
    #[must_use]
    pub fn canonical(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Build a [`Descriptor`] from `key => value` pairs.
#[macro_export]
macro_rules! descriptor {
    ($($key:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut d = $crate::event::Descriptor::new();
        $( d.insert($key, $value); )*
        d
    }};
}

/// Immutable-ish value delivered to subscribers.
///
/// The payload and descriptor never change after construction; the only
/// mutable state is the pair of flags: `is_cached` (set by the hub when
/// replaying a stored value, never by a publisher) and
/// `is_default_prevented` (settable by any subscriber to veto the
/// publisher's default action).
#[derive(Debug, Clone)]
pub struct Event {
    data: Arc<Value>,
    descriptor: Descriptor,
    kind: EventKind,
    is_cached: bool,
    default_prevented: Arc<AtomicBool>,
}

impl Event {
    /// Create a native event.
    #[must_use]
    pub fn new(data: Value, descriptor: Descriptor) -> Self {
        Self {
            data: Arc::new(data),
            descriptor,
            kind: EventKind::Native,
            is_cached: false,
            default_prevented: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a synthetic hub notice of the given kind.
    pub(crate) fn notice(kind: EventKind, descriptor: Descriptor) -> Self {
        Self {
            data: Arc::new(Value::Null),
            descriptor,
            kind,
            is_cached: false,
            default_prevented: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a replayed copy of a cached value. Hub-internal.
    pub(crate) fn replayed(data: Arc<Value>, descriptor: Descriptor) -> Self {
        Self {
            data,
            descriptor,
            kind: EventKind::Native,
            is_cached: true,
            default_prevented: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Event payload, read-only to subscribers.
    #[must_use]
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Shared handle to the payload.
    #[must_use]
    pub fn data_arc(&self) -> Arc<Value> {
        Arc::clone(&self.data)
    }

    /// Topic descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Event kind.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.kind
    }

    /// Whether this event is a hub replay of a cached value.
    #[must_use]
    pub const fn is_cached(&self) -> bool {
        self.is_cached
    }

    /// Veto the publisher's default action for this event.
    pub fn prevent_default(&self) {
        self.default_prevented.store(true, Ordering::Relaxed);
    }

    /// Whether any subscriber has vetoed the default action.
    #[must_use]
    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn descriptor_equality_is_order_independent() {
        let a = descriptor! {"context" => "dashboard", "type" => "_hostid"};
        let b = descriptor! {"type" => "_hostid", "context" => "dashboard"};
        assert_eq!(a, b);
        assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn satisfies_is_a_partial_match() {
        let full = descriptor! {"context" => "dashboard", "reference" => "AB", "type" => "_hostid"};
        assert!(full.satisfies(&descriptor! {"context" => "dashboard"}));
        assert!(full.satisfies(&descriptor! {"reference" => "AB", "type" => "_hostid"}));
        assert!(full.satisfies(&Descriptor::new()));
        assert!(!full.satisfies(&descriptor! {"context" => "map"}));
        assert!(!full.satisfies(&descriptor! {"missing" => 1}));
    }

    #[test]
    fn prevent_default_is_visible_through_clones() {
        let event = Event::new(json!({"v": 1}), descriptor! {"context" => "X"});
        let clone = event.clone();
        assert!(!event.is_default_prevented());

        clone.prevent_default();
        assert!(event.is_default_prevented());
    }

    #[test]
    fn replayed_events_are_flagged_cached() {
        let event = Event::new(json!(1), descriptor! {"k" => "v"});
        assert!(!event.is_cached());

        let replay = Event::replayed(event.data_arc(), event.descriptor().clone());
        assert!(replay.is_cached());
        assert_eq!(replay.data(), event.data());
    }
}
