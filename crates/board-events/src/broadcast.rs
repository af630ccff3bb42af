//! Descriptor constructors for the dashboard broadcast domain.
//!
//! Widgets coordinate by publishing under a stable shape: the broadcast
//! descriptor names the sender, its broadcast [`Reference`] and the
//! broadcast data type, so consumers can require any subset of those
//! dimensions.

use board_proto::{BroadcastType, Reference, WidgetUniqueId};

use crate::event::Descriptor;

/// Context value shared by all dashboard broadcast traffic.
pub const DASHBOARD_CONTEXT: &str = "dashboard";

/// Full descriptor for a widget broadcasting a value of `broadcast_type`
/// under its `reference`. The event origin defaults to the sender.
#[must_use]
pub fn broadcast_descriptor(
    sender: WidgetUniqueId,
    reference: &Reference,
    broadcast_type: &BroadcastType,
) -> Descriptor {
    broadcast_descriptor_with_origin(sender, sender, reference, broadcast_type)
}

/// Broadcast descriptor with an explicit origin, used when re-emitting a
/// value received as feedback: the origin stays with the widget that
/// initiated the change, so it can ignore the echo.
#[must_use]
pub fn broadcast_descriptor_with_origin(
    sender: WidgetUniqueId,
    origin: WidgetUniqueId,
    reference: &Reference,
    broadcast_type: &BroadcastType,
) -> Descriptor {
    Descriptor::new()
        .with("context", DASHBOARD_CONTEXT)
        .with("event_type", "broadcast")
        .with("sender_unique_id", sender.to_string())
        .with("event_origin", origin.to_string())
        .with("reference", reference.as_str())
        .with("type", broadcast_type.as_str())
}

/// Extract the event origin from a broadcast descriptor.
#[must_use]
pub fn event_origin(descriptor: &Descriptor) -> Option<WidgetUniqueId> {
    descriptor
        .get("event_origin")
        .and_then(serde_json::Value::as_str)
        .and_then(|s| WidgetUniqueId::parse(s).ok())
}

/// Partial descriptor a consumer requires to receive broadcasts of
/// `broadcast_type` from the widget owning `reference`.
#[must_use]
pub fn broadcast_require(reference: &Reference, broadcast_type: &BroadcastType) -> Descriptor {
    Descriptor::new()
        .with("context", DASHBOARD_CONTEXT)
        .with("event_type", "broadcast")
        .with("reference", reference.as_str())
        .with("type", broadcast_type.as_str())
}

/// Partial descriptor matching any broadcast traffic for `reference`,
/// regardless of data type. Used by broadcasters to observe the hub's
/// synthetic subscribe/unsubscribe notices about their own reference.
#[must_use]
pub fn broadcast_notice_require(reference: &Reference) -> Descriptor {
    Descriptor::new()
        .with("context", DASHBOARD_CONTEXT)
        .with("event_type", "broadcast")
        .with("reference", reference.as_str())
}

/// Partial descriptor a broadcaster requires to receive feedback for its
/// own `reference`.
#[must_use]
pub fn feedback_require(reference: &Reference) -> Descriptor {
    Descriptor::new()
        .with("context", DASHBOARD_CONTEXT)
        .with("event_type", "feedback")
        .with("reference", reference.as_str())
}

/// Descriptor for feedback sent back to the widget owning `reference`
/// (e.g. a consumer pushing a changed selection upstream).
#[must_use]
pub fn feedback_descriptor(
    sender: WidgetUniqueId,
    reference: &Reference,
    broadcast_type: &BroadcastType,
) -> Descriptor {
    Descriptor::new()
        .with("context", DASHBOARD_CONTEXT)
        .with("event_type", "feedback")
        .with("sender_unique_id", sender.to_string())
        .with("reference", reference.as_str())
        .with("type", broadcast_type.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_satisfies_consumer_require() {
        let sender = WidgetUniqueId::new();
        let reference = Reference::new("NAV");
        let hostid = BroadcastType::new("_hostid");
        let itemid = BroadcastType::new("_itemid");

        let published = broadcast_descriptor(sender, &reference, &hostid);
        assert!(published.satisfies(&broadcast_require(&reference, &hostid)));
        assert!(!published.satisfies(&broadcast_require(&reference, &itemid)));
        assert!(!published.satisfies(&broadcast_require(&Reference::new("OTHER"), &hostid)));
    }

    #[test]
    fn feedback_does_not_match_broadcast_require() {
        let sender = WidgetUniqueId::new();
        let reference = Reference::new("NAV");
        let hostid = BroadcastType::new("_hostid");

        let feedback = feedback_descriptor(sender, &reference, &hostid);
        assert!(!feedback.satisfies(&broadcast_require(&reference, &hostid)));
    }
}
