//! The event hub: publish/subscribe with last-value caching.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::event::{Descriptor, Event, EventKind};

/// Subscriber callback invoked synchronously during fan-out.
pub type EventCallback = Arc<dyn Fn(&Event) + Send + Sync>;

/// Opaque handle identifying a registered subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

/// A subscription request: partial descriptor plus callback.
pub struct Subscription {
    /// Partial descriptor; an event matches when every required key is
    /// present in its descriptor with an equal value.
    pub require: Descriptor,
    /// Which event kind the subscription receives. `Native` by default;
    /// `Subscribe`/`Unsubscribe` subscriptions receive the synthetic
    /// notices the hub emits about other registrations.
    pub kind: EventKind,
    /// Callback invoked for each matching event.
    pub callback: EventCallback,
}

impl Subscription {
    /// Create a native-event subscription.
    pub fn new(require: Descriptor, callback: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        Self {
            require,
            kind: EventKind::Native,
            callback: Arc::new(callback),
        }
    }

    /// Select which event kind the subscription receives.
    #[must_use]
    pub fn with_kind(mut self, kind: EventKind) -> Self {
        self.kind = kind;
        self
    }
}

struct SubscriberEntry {
    handle: SubscriptionHandle,
    require: Descriptor,
    kind: EventKind,
    callback: EventCallback,
}

struct CachedEntry {
    canonical: String,
    descriptor: Descriptor,
    data: Arc<Value>,
}

#[derive(Default)]
struct HubInner {
    next_handle: u64,
    /// Insertion order preserved for fan-out determinism.
    subscribers: Vec<SubscriberEntry>,
    /// One entry per distinct full descriptor, most recent write last.
    latest_data: Vec<CachedEntry>,
}

impl HubInner {
    fn matching_callbacks(&self, event_kind: EventKind, descriptor: &Descriptor) -> Vec<EventCallback> {
        self.subscribers
            .iter()
            .filter(|entry| entry.kind == event_kind && descriptor.satisfies(&entry.require))
            .map(|entry| Arc::clone(&entry.callback))
            .collect()
    }
}

/// Page-wide publish/subscribe broadcaster with last-value caching.
///
/// Purely synchronous in-memory bookkeeping: no I/O, no failure mode.
/// All mutation happens under an internal lock which is *released* before
/// subscriber callbacks run, so callbacks may publish, subscribe and
/// unsubscribe reentrantly. A callback that panics aborts the remaining
/// fan-out of that publish but cannot corrupt hub state.
#[derive(Default)]
pub struct EventHub {
    inner: Mutex<HubInner>,
}

impl EventHub {
    /// Create an isolated hub instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an event.
    ///
    /// Stores/overwrites the cached entry for the event's exact
    /// descriptor (moving it to most-recent), then invokes every
    /// matching subscriber in registration order. Subscribers added or
    /// removed by a callback do not affect the fan-out of this publish.
    pub fn publish(&self, event: &Event) {
        let callbacks = {
            let mut inner = self.inner.lock();

            if event.kind() == EventKind::Native {
                let canonical = event.descriptor().canonical();
                inner.latest_data.retain(|entry| entry.canonical != canonical);
                inner.latest_data.push(CachedEntry {
                    canonical,
                    descriptor: event.descriptor().clone(),
                    data: event.data_arc(),
                });
            }

            inner.matching_callbacks(event.kind(), event.descriptor())
        };

        debug!(
            descriptor = %event.descriptor(),
            subscribers = callbacks.len(),
            "publishing event"
        );

        for callback in callbacks {
            callback(event);
        }
    }

    /// Register a subscription.
    ///
    /// For native subscriptions, the single most-recently-published
    /// cached entry matching `require` (if any) is replayed by invoking
    /// the callback synchronously before this method returns, with
    /// `is_cached` set on the replayed event. Emits a synthetic
    /// [`EventKind::Subscribe`] notice to matching notice subscribers.
    pub fn subscribe(&self, subscription: Subscription) -> SubscriptionHandle {
        let Subscription {
            require,
            kind,
            callback,
        } = subscription;

        let (handle, replay, notice_callbacks) = {
            let mut inner = self.inner.lock();

            let replay = if kind == EventKind::Native {
                inner
                    .latest_data
                    .iter()
                    .rev()
                    .find(|entry| entry.descriptor.satisfies(&require))
                    .map(|entry| Event::replayed(Arc::clone(&entry.data), entry.descriptor.clone()))
            } else {
                None
            };

            // Notices go to subscribers registered before this one.
            let notice_callbacks = inner.matching_callbacks(EventKind::Subscribe, &require);

            inner.next_handle += 1;
            let handle = SubscriptionHandle(inner.next_handle);
            inner.subscribers.push(SubscriberEntry {
                handle,
                require: require.clone(),
                kind,
                callback: Arc::clone(&callback),
            });

            (handle, replay, notice_callbacks)
        };

        debug!(require = %require, ?handle, "subscription registered");

        if let Some(cached) = replay {
            callback(&cached);
        }

        if !notice_callbacks.is_empty() {
            let notice = Event::notice(EventKind::Subscribe, require);
            for notice_callback in notice_callbacks {
                notice_callback(&notice);
            }
        }

        handle
    }

    /// Remove a subscription. Idempotent: returns whether it existed.
    ///
    /// Emits a synthetic [`EventKind::Unsubscribe`] notice to matching
    /// notice subscribers when a registration was actually removed.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let removed = {
            let mut inner = self.inner.lock();

            let position = inner
                .subscribers
                .iter()
                .position(|entry| entry.handle == handle);

            position.map(|index| {
                let entry = inner.subscribers.remove(index);
                let notice_callbacks =
                    inner.matching_callbacks(EventKind::Unsubscribe, &entry.require);
                (entry.require, notice_callbacks)
            })
        };

        match removed {
            Some((require, notice_callbacks)) => {
                debug!(require = %require, ?handle, "subscription removed");

                if !notice_callbacks.is_empty() {
                    let notice = Event::notice(EventKind::Unsubscribe, require);
                    for notice_callback in notice_callbacks {
                        notice_callback(&notice);
                    }
                }

                true
            }
            None => false,
        }
    }

    /// Remove a batch of subscriptions.
    pub fn unsubscribe_all(&self, handles: impl IntoIterator<Item = SubscriptionHandle>) {
        for handle in handles {
            self.unsubscribe(handle);
        }
    }

    /// Drop every cached entry whose descriptor matches the partial
    /// `require`. Used when a broadcaster leaves the page and its stored
    /// values must no longer be replayed.
    pub fn invalidate_data(&self, require: &Descriptor) {
        let mut inner = self.inner.lock();
        inner
            .latest_data
            .retain(|entry| !entry.descriptor.satisfies(require));
    }

    /// Number of cached descriptor entries.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.inner.lock().latest_data.len()
    }

    /// Number of registered subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}
