//! The widget runtime: lifecycle, data exchange and the update engine.
//!
//! A [`Widget`] is a cheaply clonable handle around shared state. One
//! logical update cycle is in flight per widget at any time: every
//! (re)trigger cancels the previous cycle's [`CancellationToken`] and
//! spawns a fresh update loop, so a stale completion can never overwrite
//! newer contents.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use board_events::{
    broadcast_descriptor, broadcast_descriptor_with_origin, broadcast_notice_require,
    broadcast_require, event_origin, feedback_descriptor, feedback_require, Descriptor, Event,
    EventHub, EventKind, Subscription, SubscriptionHandle, DASHBOARD_CONTEXT,
};
use board_proto::{
    BroadcastType, ContentRequest, ContentResponse, GridPos, Reference, ViewMode, WidgetConfig,
    WidgetId, WidgetManifest, WidgetUniqueId,
};
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::content::ContentService;
use crate::lifecycle::{is_valid_transition, WidgetState};

/// Delay before retrying an update that failed at the transport level.
const UPDATE_RETRY_INTERVAL: Duration = Duration::from_secs(3);

/// Errors surfaced by widget operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WidgetError {
    /// A lifecycle method was called out of order.
    #[error("unsupported state change from {from} to {to}")]
    InvalidTransition {
        /// State the widget was in.
        from: WidgetState,
        /// State the caller requested.
        to: WidgetState,
    },
    /// The operation requires an active widget.
    #[error("widget is not active")]
    NotActive,
}

/// Result alias for widget operations.
pub type WidgetResult<T> = Result<T, WidgetError>;

/// Type-specific hooks invoked during lifecycle transitions and data
/// exchange. Every hook has a no-op default; a concrete widget type
/// overrides only what it needs.
#[allow(unused_variables)]
pub trait WidgetBehavior: Send {
    /// Called once when the widget enters the page.
    fn on_start(&mut self) {}

    /// Called each time the widget becomes visible and interactive.
    fn on_activate(&mut self) {}

    /// Called each time the widget leaves the active state.
    fn on_deactivate(&mut self) {}

    /// Called once when the widget is permanently removed.
    fn on_destroy(&mut self) {}

    /// Called when the dashboard enters edit mode.
    fn on_edit(&mut self) {}

    /// Called after the widget's grid position or size changed.
    fn on_resize(&mut self, pos: GridPos) {}

    /// Called when the set of consumers of this widget's broadcasts
    /// changes, or when data it refers to was re-broadcast.
    fn on_referred_update(&mut self) {}

    /// Called when a consumer pushes feedback for one of this widget's
    /// broadcast types. Return `true` to accept the value and have it
    /// re-broadcast to the other consumers.
    fn on_feedback(&mut self, broadcast_type: &BroadcastType, value: &Value) -> bool {
        false
    }
}

/// Behavior implementation with every hook left at its default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBehavior;

impl WidgetBehavior for NoopBehavior {}

struct WidgetInner {
    unique_id: WidgetUniqueId,
    widget_id: Option<WidgetId>,
    manifest: WidgetManifest,
    config: WidgetConfig,
    pos: Option<GridPos>,
    state: WidgetState,
    is_edit_mode: bool,
    hub: Arc<EventHub>,
    service: Arc<dyn ContentService>,
    behavior: Box<dyn WidgetBehavior>,
    subscriptions: Vec<SubscriptionHandle>,
    /// Token of the in-flight update cycle, if any.
    update_token: Option<CancellationToken>,
    contents: Option<ContentResponse>,
    has_ever_updated: bool,
    /// Latest value received per referring field path.
    referred_data: HashMap<String, Arc<Value>>,
    /// Last value broadcast per type, used to drop no-op feedback.
    broadcast_cache: HashMap<BroadcastType, Value>,
}

impl WidgetInner {
    fn transition(&mut self, to: WidgetState) -> WidgetResult<()> {
        if !is_valid_transition(self.state, to) {
            return Err(WidgetError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        debug!(widget = %self.unique_id, from = %self.state, to = %to, "state change");
        self.state = to;
        Ok(())
    }

    fn stop_updating(&mut self) {
        if let Some(token) = self.update_token.take() {
            token.cancel();
        }
    }

    fn content_request(&self) -> ContentRequest {
        ContentRequest {
            widget_id: self.widget_id,
            unique_id: self.unique_id,
            kind: self.config.kind.clone(),
            name: self.config.name.clone(),
            fields: self.config.fields.clone(),
            view_mode: self.config.view_mode,
            is_edit_mode: self.is_edit_mode,
            contents_size: self.pos.map_or(self.manifest.default_size, |pos| pos.size()),
            rf_rate: self.config.rf_rate,
        }
    }

    /// Effective refresh rate: edit mode suppresses periodic refresh.
    fn effective_rf_rate(&self) -> u64 {
        if self.is_edit_mode {
            0
        } else {
            self.config.rf_rate
        }
    }
}

/// A dashboard widget.
///
/// Clones share the same underlying state. Lifecycle methods enforce the
/// `Initial -> Inactive <-> Active -> Destroyed` state machine and return
/// [`WidgetError::InvalidTransition`] when called out of order.
#[derive(Clone)]
pub struct Widget {
    inner: Arc<Mutex<WidgetInner>>,
}

impl PartialEq for Widget {
    fn eq(&self, other: &Self) -> bool {
        self.unique_id() == other.unique_id()
    }
}

impl Eq for Widget {}

impl std::fmt::Debug for Widget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Widget")
            .field("unique_id", &inner.unique_id)
            .field("kind", &inner.config.kind)
            .field("state", &inner.state)
            .finish_non_exhaustive()
    }
}

impl Widget {
    /// Create a widget in the [`WidgetState::Initial`] state.
    #[must_use]
    pub fn new(
        hub: Arc<EventHub>,
        service: Arc<dyn ContentService>,
        manifest: WidgetManifest,
        config: WidgetConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(WidgetInner {
                unique_id: WidgetUniqueId::new(),
                widget_id: None,
                manifest,
                config,
                pos: None,
                state: WidgetState::Initial,
                is_edit_mode: false,
                hub,
                service,
                behavior: Box::new(NoopBehavior),
                subscriptions: Vec::new(),
                update_token: None,
                contents: None,
                has_ever_updated: false,
                referred_data: HashMap::new(),
                broadcast_cache: HashMap::new(),
            })),
        }
    }

    /// Attach the persisted widget id. Only meaningful before `start`.
    #[must_use]
    pub fn with_widget_id(self, widget_id: WidgetId) -> Self {
        self.inner.lock().widget_id = Some(widget_id);
        self
    }

    /// Place the widget on the grid. Only meaningful before `start`.
    #[must_use]
    pub fn with_pos(self, pos: GridPos) -> Self {
        self.inner.lock().pos = Some(pos);
        self
    }

    /// Install type-specific behavior hooks. Only meaningful before
    /// `start`.
    #[must_use]
    pub fn with_behavior(self, behavior: Box<dyn WidgetBehavior>) -> Self {
        self.inner.lock().behavior = behavior;
        self
    }

    /// Session-local widget id.
    #[must_use]
    pub fn unique_id(&self) -> WidgetUniqueId {
        self.inner.lock().unique_id
    }

    /// Persisted widget id, if the widget has been saved.
    #[must_use]
    pub fn widget_id(&self) -> Option<WidgetId> {
        self.inner.lock().widget_id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WidgetState {
        self.inner.lock().state
    }

    /// Current grid position, if placed.
    #[must_use]
    pub fn pos(&self) -> Option<GridPos> {
        self.inner.lock().pos
    }

    /// Snapshot of the widget configuration.
    #[must_use]
    pub fn config(&self) -> WidgetConfig {
        self.inner.lock().config.clone()
    }

    /// The catalog manifest for this widget's kind.
    #[must_use]
    pub fn manifest(&self) -> WidgetManifest {
        self.inner.lock().manifest.clone()
    }

    /// This widget's broadcast reference, if it has one.
    #[must_use]
    pub fn reference(&self) -> Option<Reference> {
        self.inner.lock().config.fields.reference.clone()
    }

    /// Whether the widget is in (one-way) edit mode.
    #[must_use]
    pub fn is_edit_mode(&self) -> bool {
        self.inner.lock().is_edit_mode
    }

    /// Header display mode.
    #[must_use]
    pub fn view_mode(&self) -> ViewMode {
        self.inner.lock().config.view_mode
    }

    /// Latest contents returned by the content service, if any update
    /// cycle has completed.
    #[must_use]
    pub fn contents(&self) -> Option<ContentResponse> {
        self.inner.lock().contents.clone()
    }

    /// Whether at least one update cycle has completed.
    #[must_use]
    pub fn has_ever_updated(&self) -> bool {
        self.inner.lock().has_ever_updated
    }

    /// Latest value received for the given referring field path.
    #[must_use]
    pub fn referred_data(&self, field: &str) -> Option<Arc<Value>> {
        self.inner.lock().referred_data.get(field).cloned()
    }

    /// Enter the page: `Initial -> Inactive`.
    ///
    /// Registers the widget's hub subscriptions. Referring fields start
    /// receiving broadcasts immediately (including a cached replay), a
    /// broadcasting widget starts observing subscribe/unsubscribe
    /// notices and feedback for its reference.
    pub fn start(&self) -> WidgetResult<()> {
        {
            let mut inner = self.inner.lock();
            inner.transition(WidgetState::Inactive)?;
            inner.behavior.on_start();
        }
        self.start_data_exchange();
        Ok(())
    }

    /// Show the widget: `Inactive -> Active`. Triggers an update cycle.
    pub fn activate(&self) -> WidgetResult<()> {
        {
            let mut inner = self.inner.lock();
            inner.transition(WidgetState::Active)?;
            inner.behavior.on_activate();
        }
        start_updating(&self.inner);
        Ok(())
    }

    /// Hide the widget: `Active -> Inactive`. Cancels any in-flight
    /// update cycle; already-fetched contents are kept.
    pub fn deactivate(&self) -> WidgetResult<()> {
        let mut inner = self.inner.lock();
        inner.transition(WidgetState::Inactive)?;
        inner.stop_updating();
        inner.behavior.on_deactivate();
        Ok(())
    }

    /// Permanently remove the widget: `Inactive -> Destroyed`.
    ///
    /// An active widget is deactivated first. All hub subscriptions are
    /// removed and the hub entries cached from this widget's broadcasts
    /// are invalidated, so late subscribers no longer replay them.
    pub fn destroy(&self) -> WidgetResult<()> {
        if self.state() == WidgetState::Active {
            self.deactivate()?;
        }

        let (hub, handles, sender_require) = {
            let mut inner = self.inner.lock();
            inner.transition(WidgetState::Destroyed)?;
            inner.stop_updating();
            inner.behavior.on_destroy();
            let handles = std::mem::take(&mut inner.subscriptions);
            let sender_require = Descriptor::new()
                .with("context", DASHBOARD_CONTEXT)
                .with("sender_unique_id", inner.unique_id.to_string());
            (Arc::clone(&inner.hub), handles, sender_require)
        };

        hub.unsubscribe_all(handles);
        hub.invalidate_data(&sender_require);
        Ok(())
    }

    /// Switch the widget into edit mode. One-way: there is no exit short
    /// of destroying the widget. Suppresses periodic refresh for
    /// subsequent update cycles.
    pub fn set_edit_mode(&self) {
        let mut inner = self.inner.lock();
        if inner.is_edit_mode {
            return;
        }
        inner.is_edit_mode = true;
        inner.behavior.on_edit();
    }

    /// Move or resize the widget. Restarts the update cycle when active,
    /// since the contents size is part of the content request.
    pub fn set_pos(&self, pos: GridPos) {
        let restart = {
            let mut inner = self.inner.lock();
            if inner.pos == Some(pos) {
                return;
            }
            inner.pos = Some(pos);
            inner.behavior.on_resize(pos);
            inner.state == WidgetState::Active
        };
        if restart {
            start_updating(&self.inner);
        }
    }

    /// Replace the widget configuration, e.g. after an applied edit.
    /// Restarts the update cycle when active.
    pub fn set_config(&self, config: WidgetConfig) {
        {
            let mut inner = self.inner.lock();
            inner.config = config;
        }
        if self.state() == WidgetState::Active {
            start_updating(&self.inner);
        }
    }

    /// Manually (re)trigger an update cycle, superseding any cycle
    /// already in flight.
    pub fn trigger_update(&self) -> WidgetResult<()> {
        if self.state() != WidgetState::Active {
            return Err(WidgetError::NotActive);
        }
        start_updating(&self.inner);
        Ok(())
    }

    /// Cancel the in-flight update cycle without a state change. Used by
    /// the iterator when its cells fall below the child minimum size;
    /// the next trigger resumes updating.
    pub(crate) fn suspend_updating(&self) {
        self.inner.lock().stop_updating();
    }

    /// Broadcast a value of one of this widget's declared broadcast
    /// types. A widget without a reference broadcasts nowhere.
    pub fn broadcast(&self, broadcast_type: &BroadcastType, value: Value) {
        let (hub, descriptor) = {
            let mut inner = self.inner.lock();
            if !inner.manifest.supports_broadcast(broadcast_type) {
                warn!(
                    widget = %inner.unique_id,
                    broadcast_type = %broadcast_type,
                    "broadcast type not declared by manifest, dropping"
                );
                return;
            }
            let Some(reference) = inner.config.fields.reference.clone() else {
                return;
            };
            inner
                .broadcast_cache
                .insert(broadcast_type.clone(), value.clone());
            (
                Arc::clone(&inner.hub),
                broadcast_descriptor(inner.unique_id, &reference, broadcast_type),
            )
        };
        // Publish outside the state lock: fan-out may re-enter this
        // widget.
        hub.publish(&Event::new(value, descriptor));
    }

    /// Push a changed value upstream for a referring field, e.g. a user
    /// selection made inside this widget. No-op when the field holds no
    /// foreign reference.
    pub fn send_feedback(&self, field: &str, value: Value) {
        let Some((hub, descriptor)) = ({
            let inner = self.inner.lock();
            inner
                .config
                .fields
                .references
                .get(field)
                .filter(|typed| !typed.is_empty())
                .map(|typed| {
                    (
                        Arc::clone(&inner.hub),
                        feedback_descriptor(
                            inner.unique_id,
                            &typed.reference,
                            &typed.broadcast_type,
                        ),
                    )
                })
        }) else {
            return;
        };
        hub.publish(&Event::new(value, descriptor));
    }

    fn start_data_exchange(&self) {
        let (hub, unique_id, referring, own) = {
            let inner = self.inner.lock();
            let referring: Vec<(String, Reference, BroadcastType)> = inner
                .config
                .fields
                .references
                .iter()
                .filter(|(_, typed)| !typed.is_empty())
                .map(|(field, typed)| {
                    (
                        field.clone(),
                        typed.reference.clone(),
                        typed.broadcast_type.clone(),
                    )
                })
                .collect();
            let own = inner
                .config
                .fields
                .reference
                .clone()
                .filter(|_| !inner.manifest.broadcast_types.is_empty());
            (
                Arc::clone(&inner.hub),
                inner.unique_id,
                referring,
                own,
            )
        };

        let mut handles = Vec::new();

        for (field, reference, broadcast_type) in referring {
            let weak = Arc::downgrade(&self.inner);
            handles.push(hub.subscribe(Subscription::new(
                broadcast_require(&reference, &broadcast_type),
                move |event| on_referred_broadcast(&weak, unique_id, &field, event),
            )));
        }

        if let Some(reference) = own {
            for kind in [EventKind::Subscribe, EventKind::Unsubscribe] {
                let weak = Arc::downgrade(&self.inner);
                handles.push(hub.subscribe(
                    Subscription::new(broadcast_notice_require(&reference), move |event| {
                        on_consumer_notice(&weak, event);
                    })
                    .with_kind(kind),
                ));
            }

            let weak = Arc::downgrade(&self.inner);
            handles.push(hub.subscribe(Subscription::new(
                feedback_require(&reference),
                move |event| on_feedback_event(&weak, event),
            )));
        }

        self.inner.lock().subscriptions.extend(handles);
    }
}

/// A referred widget re-broadcast a value: store it and, when active,
/// refresh the contents. The widget's own echoes (feedback it initiated
/// that was accepted and re-broadcast) are skipped.
fn on_referred_broadcast(
    weak: &Weak<Mutex<WidgetInner>>,
    unique_id: WidgetUniqueId,
    field: &str,
    event: &Event,
) {
    let Some(inner_arc) = weak.upgrade() else {
        return;
    };
    let refresh = {
        let mut inner = inner_arc.lock();
        if event_origin(event.descriptor()) == Some(unique_id) {
            return;
        }
        inner.referred_data.insert(field.to_string(), event.data_arc());
        inner.state == WidgetState::Active
    };
    if refresh {
        start_updating(&inner_arc);
    }
}

/// A consumer of this widget's broadcasts arrived or left.
fn on_consumer_notice(weak: &Weak<Mutex<WidgetInner>>, event: &Event) {
    let Some(inner_arc) = weak.upgrade() else {
        return;
    };
    let mut inner = inner_arc.lock();
    let declared = event
        .descriptor()
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|tag| {
            inner
                .manifest
                .supports_broadcast(&BroadcastType::new(tag))
        });
    if declared {
        inner.behavior.on_referred_update();
    }
}

/// Feedback arrived for one of this widget's broadcast types. The
/// behavior decides whether to accept; an accepted value is re-broadcast
/// with the origin pinned to the feedback sender, so the sender can
/// ignore its own echo.
fn on_feedback_event(weak: &Weak<Mutex<WidgetInner>>, event: &Event) {
    let Some(inner_arc) = weak.upgrade() else {
        return;
    };

    let rebroadcast = {
        let mut inner = inner_arc.lock();
        let Some(broadcast_type) = event
            .descriptor()
            .get("type")
            .and_then(Value::as_str)
            .map(BroadcastType::new)
        else {
            return;
        };
        if !inner.manifest.supports_broadcast(&broadcast_type) {
            return;
        }
        if inner.broadcast_cache.get(&broadcast_type) == Some(event.data()) {
            return;
        }

        let accepted = inner
            .behavior
            .on_feedback(&broadcast_type, event.data());
        if !accepted {
            return;
        }

        inner
            .broadcast_cache
            .insert(broadcast_type.clone(), event.data().clone());

        inner.config.fields.reference.clone().map(|reference| {
            let origin = event
                .descriptor()
                .get("sender_unique_id")
                .and_then(Value::as_str)
                .and_then(|s| WidgetUniqueId::parse(s).ok())
                .unwrap_or(inner.unique_id);
            (
                Arc::clone(&inner.hub),
                broadcast_descriptor_with_origin(
                    inner.unique_id,
                    origin,
                    &reference,
                    &broadcast_type,
                ),
                event.data().clone(),
            )
        })
    };

    if let Some((hub, descriptor, value)) = rebroadcast {
        hub.publish(&Event::new(value, descriptor));
    }
}

/// Cancel the in-flight update cycle (if any) and start a new one.
fn start_updating(inner_arc: &Arc<Mutex<WidgetInner>>) {
    let (service, request, token, rf_rate) = {
        let mut inner = inner_arc.lock();
        if inner.state != WidgetState::Active {
            return;
        }
        inner.stop_updating();
        let token = CancellationToken::new();
        inner.update_token = Some(token.clone());
        (
            Arc::clone(&inner.service),
            inner.content_request(),
            token,
            inner.effective_rf_rate(),
        )
    };

    let weak = Arc::downgrade(inner_arc);
    tokio::spawn(update_loop(weak, service, request, token, rf_rate));
}

async fn update_loop(
    widget: Weak<Mutex<WidgetInner>>,
    service: Arc<dyn ContentService>,
    first_request: ContentRequest,
    token: CancellationToken,
    rf_rate: u64,
) {
    let mut request = first_request;

    loop {
        let fetched = tokio::select! {
            () = token.cancelled() => return,
            result = service.fetch(request.clone()) => result,
        };
        // The fetch future may win the race against a cancellation
        // issued in the same tick; a superseded result must not land.
        if token.is_cancelled() {
            return;
        }

        let delay = match fetched {
            Ok(response) => {
                let Some(inner_arc) = widget.upgrade() else {
                    return;
                };
                {
                    let mut inner = inner_arc.lock();
                    if inner.state != WidgetState::Active {
                        return;
                    }
                    if let ContentResponse::Error { error } = &response {
                        debug!(
                            widget = %inner.unique_id,
                            messages = ?error.messages,
                            "content service returned an error"
                        );
                    }
                    inner.contents = Some(response);
                    inner.has_ever_updated = true;
                    request = inner.content_request();
                }
                if rf_rate == 0 {
                    return;
                }
                Duration::from_secs(rf_rate)
            }
            Err(error) => {
                warn!(%error, "widget update failed, retrying");
                UPDATE_RETRY_INTERVAL
            }
        };

        tokio::select! {
            () = token.cancelled() => return,
            () = tokio::time::sleep(delay) => {}
        }
    }
}
