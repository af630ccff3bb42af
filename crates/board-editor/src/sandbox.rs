//! The transactional edit sandbox.
//!
//! One sandbox is one draft session over a single widget. The draft is
//! never mutated in place: every configuration change swaps a freshly
//! constructed widget into the page (copy-on-write), so widget identity
//! always matches the configuration it was built from. Cancelling
//! restores the page to its pre-session state.

use std::sync::Arc;

use board_events::EventHub;
use board_proto::{
    GridPos, Reference, TypedReference, WidgetCatalog, WidgetConfig, WidgetId, WidgetKind,
    WidgetManifest, WidgetUniqueId,
};
use board_widget::page::{AccommodateOptions, DashboardPage, PageError};
use board_widget::widget::{Widget, WidgetError};
use board_widget::{ContentService, WidgetState};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

/// Errors surfaced by sandbox operations.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The page has no free region fitting the new widget.
    #[error("no free space on the page for a new {kind} widget")]
    NoSpace {
        /// The widget kind that could not be placed.
        kind: WidgetKind,
    },
    /// The widget kind is not in the catalog.
    #[error("unknown widget kind {0}")]
    UnknownKind(WidgetKind),
    /// The widget to edit is not on the page.
    #[error("widget {0} is not on the page")]
    UnknownWidget(WidgetUniqueId),
    /// The session has already been applied or cancelled.
    #[error("edit session already ended ({state})")]
    SessionEnded {
        /// The terminal state the session is in.
        state: SessionState,
    },
    /// `apply` was called before the new widget received a
    /// configuration.
    #[error("draft placeholder was never configured")]
    NotConfigured,
    /// A page operation failed.
    #[error(transparent)]
    Page(#[from] PageError),
    /// A widget lifecycle operation failed.
    #[error(transparent)]
    Widget(#[from] WidgetError),
}

/// Result alias for sandbox operations.
pub type SandboxResult<T> = Result<T, SandboxError>;

/// Lifecycle of a draft session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// A new widget's placeholder is on the page, awaiting its first
    /// configuration.
    CreatingPlaceholder,
    /// The draft carries a real configuration and may be applied.
    Configuring,
    /// The session ended with the draft kept.
    Applied,
    /// The session ended with the pre-session state restored.
    Cancelled,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::CreatingPlaceholder => "creating-placeholder",
            Self::Configuring => "configuring",
            Self::Applied => "applied",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Pre-session snapshot of the edited widget, for cancel.
struct OriginalSnapshot {
    config: WidgetConfig,
    pos: Option<GridPos>,
    widget_id: Option<WidgetId>,
}

/// A widget holding a foreign-reference field pointing at the draft,
/// captured once when the session starts.
struct CapturedListener {
    /// Current identity, updated across copy-on-write replacements.
    unique_id: WidgetUniqueId,
    /// Field paths pointing at the draft's reference.
    fields: Vec<String>,
    /// Configuration at capture time, for cancel.
    original_config: WidgetConfig,
}

/// A transactional draft-editing session over one widget.
pub struct EditSandbox {
    page: Arc<Mutex<DashboardPage>>,
    hub: Arc<EventHub>,
    content_service: Arc<dyn ContentService>,
    catalog: Arc<WidgetCatalog>,
    state: SessionState,
    draft: Widget,
    /// The draft's broadcast reference, stable across replacements.
    reference: Option<Reference>,
    original: Option<OriginalSnapshot>,
    listeners: Vec<CapturedListener>,
    /// Cleared permanently once the user resizes during the session.
    auto_fix_size: bool,
}

impl EditSandbox {
    /// Begin editing a widget already on the page.
    pub fn start_existing(
        page: Arc<Mutex<DashboardPage>>,
        hub: Arc<EventHub>,
        content_service: Arc<dyn ContentService>,
        catalog: Arc<WidgetCatalog>,
        unique_id: WidgetUniqueId,
    ) -> SandboxResult<Self> {
        let (draft, original, reference, listeners) = {
            let page = page.lock();
            let widget = page
                .widget(unique_id)
                .ok_or(SandboxError::UnknownWidget(unique_id))?;
            let reference = widget.reference();
            let listeners = reference.as_ref().map_or_else(Vec::new, |reference| {
                page.listeners_of(reference)
                    .into_iter()
                    .map(|(listener, fields)| CapturedListener {
                        unique_id: listener.unique_id(),
                        fields,
                        original_config: listener.config(),
                    })
                    .collect()
            });
            let original = OriginalSnapshot {
                config: widget.config(),
                pos: widget.pos(),
                widget_id: widget.widget_id(),
            };
            widget.set_edit_mode();
            (widget.clone(), original, reference, listeners)
        };

        debug!(widget = %unique_id, listeners = listeners.len(), "edit session started");
        Ok(Self {
            page,
            hub,
            content_service,
            catalog,
            state: SessionState::Configuring,
            draft,
            reference,
            original: Some(original),
            listeners,
            auto_fix_size: true,
        })
    }

    /// Begin creating a new widget, inserting a placeholder at the given
    /// position or at the best free region for the kind's default size.
    pub fn start_new(
        page: Arc<Mutex<DashboardPage>>,
        hub: Arc<EventHub>,
        content_service: Arc<dyn ContentService>,
        catalog: Arc<WidgetCatalog>,
        kind: WidgetKind,
        explicit_pos: Option<GridPos>,
    ) -> SandboxResult<Self> {
        let manifest = catalog
            .manifest(&kind)
            .ok_or_else(|| SandboxError::UnknownKind(kind.clone()))?
            .clone();

        let (placeholder, reference) = {
            let mut page_guard = page.lock();
            let pos = match explicit_pos {
                Some(pos) => pos,
                None => page_guard
                    .best_pos_for(manifest.default_size, manifest.min_size)
                    .ok_or_else(|| SandboxError::NoSpace { kind: kind.clone() })?,
            };

            let reference = (!manifest.broadcast_types.is_empty())
                .then(|| page_guard.allocate_reference());
            let mut config = WidgetConfig::new(kind);
            config.fields.reference = reference.clone();

            let placeholder = Widget::new(
                Arc::clone(&hub),
                Arc::clone(&content_service),
                manifest,
                config,
            )
            .with_pos(pos);
            placeholder.set_edit_mode();
            page_guard.add_widget(placeholder.clone())?;
            (placeholder, reference)
        };
        placeholder.start()?;

        debug!(widget = %placeholder.unique_id(), "placeholder inserted");
        Ok(Self {
            page,
            hub,
            content_service,
            catalog,
            state: SessionState::CreatingPlaceholder,
            draft: placeholder,
            reference,
            original: None,
            listeners: Vec::new(),
            auto_fix_size: true,
        })
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Handle to the current draft widget.
    #[must_use]
    pub fn draft(&self) -> Widget {
        self.draft.clone()
    }

    /// The current draft configuration.
    #[must_use]
    pub fn draft_config(&self) -> WidgetConfig {
        self.draft().config()
    }

    /// Permanently disable auto-fixing the draft size on kind changes,
    /// in response to the user resizing during the session.
    pub fn notify_user_resized(&mut self) {
        self.auto_fix_size = false;
    }

    /// Replace the draft with a widget built from the new configuration.
    ///
    /// Position is preserved; when the kind changes and the user has not
    /// resized this session, the size is re-fit to the new kind's
    /// default (shrunk to the available space if needed). Listener
    /// correction runs before returning whenever the kind changed.
    pub fn update(&mut self, mut config: WidgetConfig) -> SandboxResult<Widget> {
        self.ensure_open()?;
        let manifest = self
            .catalog
            .manifest(&config.kind)
            .ok_or_else(|| SandboxError::UnknownKind(config.kind.clone()))?
            .clone();

        let old = self.draft();
        let kind_changed = old.config().kind != config.kind;

        // The broadcast reference survives type changes so listeners
        // stay wired; a kind with no broadcasts loses it.
        if manifest.broadcast_types.is_empty() {
            config.fields.reference = None;
        } else {
            if self.reference.is_none() {
                self.reference = Some(self.page.lock().allocate_reference());
            }
            config.fields.reference = self.reference.clone();
        }

        let mut pos = old.pos();
        if kind_changed && self.auto_fix_size {
            if let Some(current) = pos {
                let page = self.page.lock();
                pos = page
                    .accommodate_pos(
                        current.with_size(manifest.default_size),
                        AccommodateOptions {
                            exclude: Some(self.draft.unique_id()),
                            ..AccommodateOptions::default()
                        },
                    )
                    .or(pos);
            }
        }

        let widget_id = self.original.as_ref().and_then(|snapshot| snapshot.widget_id);
        let draft = self.replace_draft(manifest.clone(), config, pos, widget_id)?;
        if kind_changed {
            self.correct_listeners(&manifest)?;
        }
        self.state = SessionState::Configuring;
        Ok(draft)
    }

    /// End the session keeping the draft as the permanent widget.
    pub fn apply(&mut self) -> SandboxResult<Widget> {
        self.ensure_open()?;
        if self.state == SessionState::CreatingPlaceholder {
            return Err(SandboxError::NotConfigured);
        }
        self.state = SessionState::Applied;
        debug!(widget = %self.draft.unique_id(), "edit session applied");
        Ok(self.draft())
    }

    /// End the session restoring the pre-session page state.
    ///
    /// A new widget is deleted outright. An edited widget is rebuilt
    /// from the pre-session snapshot when the draft differs from it;
    /// corrected listeners are restored to their captured
    /// configurations the same way.
    pub fn cancel(&mut self) -> SandboxResult<()> {
        self.ensure_open()?;

        match self.original.take() {
            None => {
                let draft = self.page.lock().remove_widget(self.draft.unique_id())?;
                destroy_if_started(&draft)?;
                debug!(widget = %self.draft.unique_id(), "new widget discarded");
            }
            Some(snapshot) => {
                let draft = self.draft();
                if draft.config() != snapshot.config || draft.pos() != snapshot.pos {
                    self.replace_draft(
                        self.catalog
                            .manifest(&snapshot.config.kind)
                            .ok_or_else(|| SandboxError::UnknownKind(snapshot.config.kind.clone()))?
                            .clone(),
                        snapshot.config,
                        snapshot.pos,
                        snapshot.widget_id,
                    )?;
                }
                self.restore_listeners()?;
            }
        }

        self.state = SessionState::Cancelled;
        Ok(())
    }

    fn ensure_open(&self) -> SandboxResult<()> {
        match self.state {
            SessionState::CreatingPlaceholder | SessionState::Configuring => Ok(()),
            state @ (SessionState::Applied | SessionState::Cancelled) => {
                Err(SandboxError::SessionEnded { state })
            }
        }
    }

    /// Copy-on-write swap of the draft widget.
    fn replace_draft(
        &mut self,
        manifest: WidgetManifest,
        config: WidgetConfig,
        pos: Option<GridPos>,
        widget_id: Option<WidgetId>,
    ) -> SandboxResult<Widget> {
        let mut replacement = Widget::new(
            Arc::clone(&self.hub),
            Arc::clone(&self.content_service),
            manifest,
            config,
        );
        if let Some(pos) = pos {
            replacement = replacement.with_pos(pos);
        }
        if let Some(widget_id) = widget_id {
            replacement = replacement.with_widget_id(widget_id);
        }
        replacement.set_edit_mode();

        let old = self
            .page
            .lock()
            .replace_widget(self.draft.unique_id(), replacement.clone())?;
        let was_active = old.state() == WidgetState::Active;
        destroy_if_started(&old)?;

        replacement.start()?;
        if was_active {
            replacement.activate()?;
        }

        debug!(
            old = %self.draft.unique_id(),
            new = %replacement.unique_id(),
            "draft replaced"
        );
        self.draft = replacement.clone();
        Ok(replacement)
    }

    /// Re-point every captured listener field at the draft: kept when
    /// the new kind still broadcasts that field's data type, cleared to
    /// the empty reference otherwise. Listeners are re-instantiated
    /// copy-on-write either way.
    fn correct_listeners(&mut self, manifest: &WidgetManifest) -> SandboxResult<()> {
        let Some(reference) = self.reference.clone() else {
            return Ok(());
        };

        for index in 0..self.listeners.len() {
            let listener_id = self.listeners[index].unique_id;
            let Some(widget) = self.page.lock().widget(listener_id).cloned() else {
                continue;
            };

            let mut config = widget.config();
            for field in &self.listeners[index].fields {
                if let Some(typed) = config.fields.references.get_mut(field) {
                    if typed.reference == reference
                        && !manifest.supports_broadcast(&typed.broadcast_type)
                    {
                        debug!(listener = %listener_id, field, "clearing dangling reference");
                        *typed = TypedReference::empty();
                    }
                }
            }

            let replacement = self.replace_listener(&widget, config)?;
            self.listeners[index].unique_id = replacement;
        }
        Ok(())
    }

    /// Put every captured listener back to its captured configuration.
    fn restore_listeners(&mut self) -> SandboxResult<()> {
        for index in 0..self.listeners.len() {
            let listener_id = self.listeners[index].unique_id;
            let Some(widget) = self.page.lock().widget(listener_id).cloned() else {
                continue;
            };
            if widget.config() == self.listeners[index].original_config {
                continue;
            }
            let config = self.listeners[index].original_config.clone();
            let replacement = self.replace_listener(&widget, config)?;
            self.listeners[index].unique_id = replacement;
        }
        Ok(())
    }

    fn replace_listener(
        &self,
        current: &Widget,
        config: WidgetConfig,
    ) -> SandboxResult<WidgetUniqueId> {
        let mut replacement = Widget::new(
            Arc::clone(&self.hub),
            Arc::clone(&self.content_service),
            current.manifest(),
            config,
        );
        if let Some(pos) = current.pos() {
            replacement = replacement.with_pos(pos);
        }
        if let Some(widget_id) = current.widget_id() {
            replacement = replacement.with_widget_id(widget_id);
        }

        let old = self
            .page
            .lock()
            .replace_widget(current.unique_id(), replacement.clone())?;
        let was_active = old.state() == WidgetState::Active;
        destroy_if_started(&old)?;

        replacement.start()?;
        if was_active {
            replacement.activate()?;
        }
        Ok(replacement.unique_id())
    }
}

fn destroy_if_started(widget: &Widget) -> Result<(), WidgetError> {
    if widget.state() == WidgetState::Initial {
        return Ok(());
    }
    widget.destroy()
}

#[cfg(test)]
mod tests {
    use board_proto::{
        BroadcastType, ContentRequest, ContentResponse, GridSize, TransportError, WidgetFields,
    };
    use futures::FutureExt;

    use super::*;

    struct StaticService;

    impl ContentService for StaticService {
        fn fetch(
            &self,
            request: ContentRequest,
        ) -> futures::future::BoxFuture<'static, Result<ContentResponse, TransportError>> {
            async move { Ok(ContentResponse::content(request.name, "<body/>")) }.boxed()
        }
    }

    fn catalog() -> Arc<WidgetCatalog> {
        let mut catalog = WidgetCatalog::new();
        catalog.register(
            WidgetManifest::new("navigator", GridSize::new(4, 3), GridSize::new(2, 2))
                .with_broadcast_type("_hostid"),
        );
        catalog.register(
            WidgetManifest::new("map", GridSize::new(6, 4), GridSize::new(2, 2))
                .with_broadcast_type("_hostid"),
        );
        catalog.register(WidgetManifest::new(
            "clock",
            GridSize::new(2, 2),
            GridSize::new(1, 1),
        ));
        Arc::new(catalog)
    }

    struct Fixture {
        page: Arc<Mutex<DashboardPage>>,
        hub: Arc<EventHub>,
        service: Arc<dyn ContentService>,
        catalog: Arc<WidgetCatalog>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                page: Arc::new(Mutex::new(DashboardPage::new(12, 8))),
                hub: Arc::new(EventHub::new()),
                service: Arc::new(StaticService),
                catalog: catalog(),
            }
        }

        fn add_widget(&self, kind: &str, pos: GridPos, fields: WidgetFields) -> Widget {
            let manifest = self.catalog.manifest(&kind.into()).unwrap().clone();
            let widget = Widget::new(
                Arc::clone(&self.hub),
                Arc::clone(&self.service),
                manifest,
                WidgetConfig::new(kind).with_fields(fields),
            )
            .with_pos(pos);
            self.page.lock().add_widget(widget.clone()).unwrap();
            widget.start().unwrap();
            widget
        }

        fn start_existing(&self, unique_id: WidgetUniqueId) -> EditSandbox {
            EditSandbox::start_existing(
                Arc::clone(&self.page),
                Arc::clone(&self.hub),
                Arc::clone(&self.service),
                Arc::clone(&self.catalog),
                unique_id,
            )
            .unwrap()
        }

        fn start_new(&self, kind: &str, pos: Option<GridPos>) -> SandboxResult<EditSandbox> {
            EditSandbox::start_new(
                Arc::clone(&self.page),
                Arc::clone(&self.hub),
                Arc::clone(&self.service),
                Arc::clone(&self.catalog),
                kind.into(),
                pos,
            )
        }
    }

    #[tokio::test]
    async fn new_widget_is_auto_placed_at_the_best_free_region() {
        let fixture = Fixture::new();
        // Blocker leaves a full-size region only below row 3.
        fixture.add_widget(
            "clock",
            GridPos::new(0, 0, 2, 2),
            WidgetFields::new(),
        );

        let sandbox = fixture.start_new("navigator", None).unwrap();
        assert_eq!(sandbox.state(), SessionState::CreatingPlaceholder);

        let draft = sandbox.draft();
        assert_eq!(draft.pos(), Some(GridPos::new(2, 0, 4, 3)));
        assert!(draft.reference().is_some());
        assert!(draft.is_edit_mode());
        assert_eq!(fixture.page.lock().widgets().len(), 2);
    }

    #[tokio::test]
    async fn starting_with_no_space_is_a_hard_failure() {
        let fixture = Fixture::new();
        fixture.add_widget(
            "map",
            GridPos::new(0, 0, 12, 8),
            WidgetFields::new(),
        );

        assert!(matches!(
            fixture.start_new("navigator", None),
            Err(SandboxError::NoSpace { .. })
        ));
        assert_eq!(fixture.page.lock().widgets().len(), 1);
    }

    #[tokio::test]
    async fn update_replaces_the_draft_copy_on_write() {
        let fixture = Fixture::new();
        let original = fixture.add_widget("clock", GridPos::new(0, 0, 2, 2), WidgetFields::new());
        let original_id = original.unique_id();

        let mut sandbox = fixture.start_existing(original_id);
        let draft = sandbox
            .update(WidgetConfig::new("clock").with_name("Berlin"))
            .unwrap();

        assert_ne!(draft.unique_id(), original_id);
        assert_eq!(original.state(), WidgetState::Destroyed);
        assert_eq!(draft.config().name, "Berlin");
        assert!(draft.is_edit_mode());
        assert!(fixture.page.lock().widget(draft.unique_id()).is_some());
        assert!(fixture.page.lock().widget(original_id).is_none());
    }

    #[tokio::test]
    async fn kind_change_refits_the_size_until_the_user_resizes() {
        let fixture = Fixture::new();
        let original = fixture.add_widget("clock", GridPos::new(0, 0, 2, 2), WidgetFields::new());

        let mut sandbox = fixture.start_existing(original.unique_id());
        let draft = sandbox.update(WidgetConfig::new("map")).unwrap();
        assert_eq!(draft.pos(), Some(GridPos::new(0, 0, 6, 4)));

        sandbox.notify_user_resized();
        let draft = sandbox.update(WidgetConfig::new("clock")).unwrap();
        assert_eq!(draft.pos(), Some(GridPos::new(0, 0, 6, 4)));
    }

    #[tokio::test]
    async fn cancel_on_a_new_widget_removes_it() {
        let fixture = Fixture::new();
        let mut sandbox = fixture.start_new("clock", None).unwrap();
        sandbox.update(WidgetConfig::new("clock")).unwrap();

        sandbox.cancel().unwrap();
        assert_eq!(sandbox.state(), SessionState::Cancelled);
        assert!(fixture.page.lock().widgets().is_empty());
    }

    #[tokio::test]
    async fn cancel_restores_the_original_configuration_exactly() {
        let fixture = Fixture::new();
        let original = fixture.add_widget(
            "navigator",
            GridPos::new(0, 0, 4, 3),
            WidgetFields::new().with_reference(Reference::new("NAV01")),
        );
        let pristine = original.config();

        let mut sandbox = fixture.start_existing(original.unique_id());
        sandbox
            .update(WidgetConfig::new("map").with_name("World"))
            .unwrap();
        sandbox.cancel().unwrap();

        let page = fixture.page.lock();
        assert_eq!(page.widgets().len(), 1);
        assert_eq!(page.widgets()[0].config(), pristine);
        assert_eq!(page.widgets()[0].pos(), Some(GridPos::new(0, 0, 4, 3)));
    }

    #[tokio::test]
    async fn cancel_on_an_unmodified_draft_keeps_the_widget() {
        let fixture = Fixture::new();
        let original = fixture.add_widget("clock", GridPos::new(0, 0, 2, 2), WidgetFields::new());
        let original_id = original.unique_id();

        let mut sandbox = fixture.start_existing(original_id);
        sandbox.cancel().unwrap();

        // Nothing changed, so no replacement happened.
        assert_eq!(fixture.page.lock().widgets()[0].unique_id(), original_id);
        assert_ne!(original.state(), WidgetState::Destroyed);
    }

    #[tokio::test]
    async fn apply_ends_the_session() {
        let fixture = Fixture::new();
        let original = fixture.add_widget("clock", GridPos::new(0, 0, 2, 2), WidgetFields::new());

        let mut sandbox = fixture.start_existing(original.unique_id());
        sandbox.apply().unwrap();
        assert_eq!(sandbox.state(), SessionState::Applied);

        assert!(matches!(
            sandbox.update(WidgetConfig::new("clock")),
            Err(SandboxError::SessionEnded { .. })
        ));
        assert!(matches!(
            sandbox.cancel(),
            Err(SandboxError::SessionEnded { .. })
        ));
    }

    #[tokio::test]
    async fn applying_an_unconfigured_placeholder_is_rejected() {
        let fixture = Fixture::new();
        let mut sandbox = fixture.start_new("clock", None).unwrap();
        assert!(matches!(sandbox.apply(), Err(SandboxError::NotConfigured)));
    }

    fn listener_fields(reference: &str) -> WidgetFields {
        WidgetFields::new().with_reference_field(
            "hostids",
            TypedReference::new(Reference::new(reference), BroadcastType::new("_hostid")),
        )
    }

    #[tokio::test]
    async fn retyping_to_an_incompatible_kind_clears_listener_fields() {
        let fixture = Fixture::new();
        let broadcaster = fixture.add_widget(
            "navigator",
            GridPos::new(0, 0, 4, 3),
            WidgetFields::new().with_reference(Reference::new("NAV01")),
        );
        fixture.add_widget("map", GridPos::new(4, 0, 6, 4), listener_fields("NAV01"));

        let mut sandbox = fixture.start_existing(broadcaster.unique_id());
        // Clocks broadcast nothing.
        sandbox.update(WidgetConfig::new("clock")).unwrap();

        let page = fixture.page.lock();
        let listener = page.widgets().iter().find(|w| w.config().kind == "map".into()).unwrap();
        assert_eq!(
            listener.config().fields.references.get("hostids"),
            Some(&TypedReference::empty())
        );
    }

    #[tokio::test]
    async fn retyping_to_a_compatible_kind_reinstantiates_but_keeps_fields() {
        let fixture = Fixture::new();
        let broadcaster = fixture.add_widget(
            "navigator",
            GridPos::new(0, 0, 4, 3),
            WidgetFields::new().with_reference(Reference::new("NAV01")),
        );
        let listener =
            fixture.add_widget("map", GridPos::new(4, 0, 6, 4), listener_fields("NAV01"));
        let listener_id = listener.unique_id();

        let mut sandbox = fixture.start_existing(broadcaster.unique_id());
        // Maps also broadcast _hostid.
        sandbox.update(WidgetConfig::new("map")).unwrap();

        let page = fixture.page.lock();
        let corrected = page
            .widgets()
            .iter()
            .find(|w| w.config().fields.refers_to(&Reference::new("NAV01")))
            .unwrap();
        assert_ne!(corrected.unique_id(), listener_id);
        assert_eq!(
            corrected.config().fields.references.get("hostids"),
            Some(&TypedReference::new(
                Reference::new("NAV01"),
                BroadcastType::new("_hostid"),
            ))
        );
    }

    #[tokio::test]
    async fn cancel_restores_corrected_listeners() {
        let fixture = Fixture::new();
        let broadcaster = fixture.add_widget(
            "navigator",
            GridPos::new(0, 0, 4, 3),
            WidgetFields::new().with_reference(Reference::new("NAV01")),
        );
        fixture.add_widget("map", GridPos::new(4, 0, 6, 4), listener_fields("NAV01"));

        let mut sandbox = fixture.start_existing(broadcaster.unique_id());
        sandbox.update(WidgetConfig::new("clock")).unwrap();
        sandbox.cancel().unwrap();

        let page = fixture.page.lock();
        let listener = page.widgets().iter().find(|w| w.config().kind == "map".into()).unwrap();
        assert_eq!(listener.config(), WidgetConfig::new("map").with_fields(listener_fields("NAV01")));
    }
}
