//! # board-events
//!
//! Page-wide publish/subscribe event hub with last-value caching and
//! synchronous replay to late subscribers.
//!
//! The hub is an explicitly constructed, dependency-injected instance
//! rather than a process-wide global, so tests can run isolated hubs
//! per case.
//! Events are identified by a [`Descriptor`]: a sorted scalar key/value
//! map naming the logical topic. Subscribers register a *partial*
//! descriptor (`require`); an event matches when every required key is
//! present in its descriptor with an equal value.
//!
//! ```
//! use std::sync::Arc;
//! use board_events::{descriptor, Event, EventHub, Subscription};
//!
//! let hub = EventHub::new();
//! hub.publish(&Event::new(
//!     serde_json::json!({"sel": [1]}),
//!     descriptor! {"context" => "X"},
//! ));
//!
//! // A late subscriber sees the cached value synchronously.
//! let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
//! let seen_cb = Arc::clone(&seen);
//! hub.subscribe(Subscription::new(descriptor! {"context" => "X"}, move |event| {
//!     seen_cb.lock().push(event.data().clone());
//! }));
//! assert_eq!(seen.lock().len(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod broadcast;
pub mod event;
pub mod form;
pub mod hub;

pub use broadcast::{
    broadcast_descriptor, broadcast_descriptor_with_origin, broadcast_notice_require,
    broadcast_require, event_origin, feedback_descriptor, feedback_require, DASHBOARD_CONTEXT,
};
pub use event::{Descriptor, Event, EventKind};
pub use form::{redirect_url_of, FormEvent, FormEventName, FORM_CONTEXT};
pub use hub::{EventCallback, EventHub, Subscription, SubscriptionHandle};
