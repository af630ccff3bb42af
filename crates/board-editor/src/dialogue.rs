//! The edit dialogue: orchestration of the modal form around a draft.
//!
//! The dialogue owns the sandbox and a validator, reacts to debounced
//! field edits, and signals its surroundings exclusively through typed
//! form events on the hub. It has no rendering concern.

use std::sync::Arc;
use std::time::Duration;

use board_events::{EventHub, FormEvent, FormEventName};
use board_proto::{ConfigCheckRequest, ConfigCheckResponse, ServiceError, WidgetConfig};
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::check::ConfigCheckService;
use crate::sandbox::{EditSandbox, SandboxError};
use crate::validator::EditValidator;

/// Pause after the last field edit before a configuration check is
/// issued.
pub const DEBOUNCE_INTERVAL: Duration = Duration::from_millis(500);

/// Errors surfaced by dialogue operations.
#[derive(Debug, Error)]
pub enum DialogueError {
    /// The dialogue has already been closed.
    #[error("dialogue is closed")]
    Closed,
    /// A sandbox operation failed.
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
}

/// Result alias for dialogue operations.
pub type DialogueResult<T> = Result<T, DialogueError>;

/// Lifecycle of the dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogueState {
    /// Waiting for the initial configuration check.
    Loading,
    /// Interactive; field edits are accepted.
    Ready,
    /// A final check and apply are underway.
    Submitting,
    /// Closed after submit or cancel; all operations are rejected.
    Closed,
}

struct DialogueShared {
    hub: Arc<EventHub>,
    sandbox: Mutex<EditSandbox>,
    validator: EditValidator,
    check_service: Arc<dyn ConfigCheckService>,
    state: Mutex<DialogueState>,
    /// The configuration the form currently describes.
    draft_request: Mutex<WidgetConfig>,
    /// Non-fatal messages from the latest check.
    messages: Mutex<Vec<String>>,
    /// Fatal error from the latest check, if any.
    error: Mutex<Option<ServiceError>>,
    debounce: Mutex<Option<CancellationToken>>,
}

impl DialogueShared {
    fn apply_outcome(&self, response: &ConfigCheckResponse) {
        match response {
            ConfigCheckResponse::Valid { fields, messages } => {
                let mut config = self.draft_request.lock().clone();
                config.fields = fields.clone();

                let updated = self.sandbox.lock().update(config.clone());
                match updated {
                    Ok(_) => {
                        *self.draft_request.lock() = config;
                        *self.messages.lock() = messages.clone();
                        *self.error.lock() = None;
                        self.hub
                            .publish(FormEvent::new(FormEventName::Update, Value::Null).event());
                    }
                    Err(error) => {
                        debug!(%error, "discarding check outcome, sandbox rejected the update");
                    }
                }
            }
            ConfigCheckResponse::Invalid { error } => {
                *self.error.lock() = Some(error.clone());
            }
        }

        let mut state = self.state.lock();
        if *state == DialogueState::Loading {
            *state = DialogueState::Ready;
        }
    }

    fn check_request(&self) -> ConfigCheckRequest {
        let config = self.draft_request.lock().clone();
        ConfigCheckRequest {
            kind: config.kind,
            name: config.name,
            fields: config.fields,
        }
    }

    fn cancel_debounce(&self) {
        if let Some(token) = self.debounce.lock().take() {
            token.cancel();
        }
    }
}

/// The modal widget-edit dialogue.
///
/// Cheaply clonable handle; clones share the same dialogue.
#[derive(Clone)]
pub struct EditDialogue {
    shared: Arc<DialogueShared>,
}

impl EditDialogue {
    /// Open the dialogue over an active sandbox session.
    ///
    /// Publishes the `ready` form event, wires a validator callback that
    /// applies valid outcomes to the sandbox, and issues the initial
    /// configuration check. The dialogue stays in
    /// [`DialogueState::Loading`] until that check completes.
    #[must_use]
    pub fn open(
        hub: Arc<EventHub>,
        sandbox: EditSandbox,
        check_service: Arc<dyn ConfigCheckService>,
    ) -> Self {
        let draft_request = sandbox.draft_config();
        let shared = Arc::new(DialogueShared {
            hub,
            sandbox: Mutex::new(sandbox),
            validator: EditValidator::new(Arc::clone(&check_service)),
            check_service,
            state: Mutex::new(DialogueState::Loading),
            draft_request: Mutex::new(draft_request),
            messages: Mutex::new(Vec::new()),
            error: Mutex::new(None),
            debounce: Mutex::new(None),
        });

        let weak = Arc::downgrade(&shared);
        shared
            .validator
            .on_result("dialogue", 0, false, move |response| {
                if let Some(shared) = weak.upgrade() {
                    shared.apply_outcome(response);
                }
            });

        shared
            .hub
            .publish(FormEvent::new(FormEventName::Ready, Value::Null).event());
        shared.validator.check(shared.check_request());

        Self { shared }
    }

    /// Current dialogue state.
    #[must_use]
    pub fn state(&self) -> DialogueState {
        *self.shared.state.lock()
    }

    /// Non-fatal messages from the latest check.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.shared.messages.lock().clone()
    }

    /// Fatal error from the latest check, if any.
    #[must_use]
    pub fn error(&self) -> Option<ServiceError> {
        self.shared.error.lock().clone()
    }

    /// The configuration the form currently describes.
    #[must_use]
    pub fn draft_config(&self) -> WidgetConfig {
        self.shared.draft_request.lock().clone()
    }

    /// Record a field edit and schedule a debounced configuration
    /// check. Rapid successive edits collapse into one check issued
    /// [`DEBOUNCE_INTERVAL`] after the last edit.
    pub fn field_changed(&self, config: WidgetConfig) -> DialogueResult<()> {
        self.ensure_open()?;
        *self.shared.draft_request.lock() = config;

        self.shared.cancel_debounce();
        let token = CancellationToken::new();
        *self.shared.debounce.lock() = Some(token.clone());

        let weak = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => return,
                () = tokio::time::sleep(DEBOUNCE_INTERVAL) => {}
            }
            if let Some(shared) = weak.upgrade() {
                shared.validator.check(shared.check_request());
            }
        });
        Ok(())
    }

    /// Re-issue an un-debounced check for the current draft
    /// configuration.
    pub fn reload(&self) -> DialogueResult<()> {
        self.ensure_open()?;
        self.shared
            .hub
            .publish(FormEvent::new(FormEventName::Reload, Value::Null).event());
        self.shared.validator.check(self.shared.check_request());
        Ok(())
    }

    /// Run a final un-debounced check and, on success, apply the
    /// sandbox and close.
    ///
    /// Returns `true` when the dialogue closed. A fatal check outcome or
    /// a transport failure keeps it open with the error or message
    /// recorded.
    pub async fn submit(&self) -> DialogueResult<bool> {
        self.ensure_open()?;
        *self.shared.state.lock() = DialogueState::Submitting;
        self.shared.cancel_debounce();
        self.shared.validator.stop();

        let outcome = self
            .shared
            .check_service
            .check(self.shared.check_request())
            .await;

        match outcome {
            Ok(ConfigCheckResponse::Valid { fields, messages }) => {
                let mut config = self.shared.draft_request.lock().clone();
                config.fields = fields;
                {
                    let mut sandbox = self.shared.sandbox.lock();
                    sandbox.update(config)?;
                    sandbox.apply()?;
                }
                *self.shared.messages.lock() = messages;
                *self.shared.state.lock() = DialogueState::Closed;
                self.shared.hub.publish(FormEvent::submit(None).event());
                debug!("dialogue submitted");
                Ok(true)
            }
            Ok(ConfigCheckResponse::Invalid { error }) => {
                *self.shared.error.lock() = Some(error);
                *self.shared.state.lock() = DialogueState::Ready;
                Ok(false)
            }
            Err(error) => {
                self.shared.messages.lock().push(error.to_string());
                *self.shared.state.lock() = DialogueState::Ready;
                Ok(false)
            }
        }
    }

    /// Roll the sandbox back and close.
    pub fn cancel(&self) -> DialogueResult<()> {
        self.ensure_open()?;
        self.shared.cancel_debounce();
        self.shared.validator.stop();
        self.shared.sandbox.lock().cancel()?;
        *self.shared.state.lock() = DialogueState::Closed;
        self.shared
            .hub
            .publish(FormEvent::new(FormEventName::Cancel, Value::Null).event());
        debug!("dialogue cancelled");
        Ok(())
    }

    fn ensure_open(&self) -> DialogueResult<()> {
        if *self.shared.state.lock() == DialogueState::Closed {
            return Err(DialogueError::Closed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use board_events::Subscription;
    use board_proto::{
        ContentRequest, ContentResponse, GridPos, GridSize, TransportError, WidgetCatalog,
        WidgetFields, WidgetManifest,
    };
    use board_widget::page::DashboardPage;
    use board_widget::ContentService;
    use futures::FutureExt;
    use serde_json::json;
    use tokio::sync::oneshot;

    use crate::sandbox::SessionState;

    use super::*;

    struct StaticContent;

    impl ContentService for StaticContent {
        fn fetch(
            &self,
            request: ContentRequest,
        ) -> futures::future::BoxFuture<'static, Result<ContentResponse, TransportError>> {
            async move { Ok(ContentResponse::content(request.name, "<body/>")) }.boxed()
        }
    }

    #[derive(Default)]
    struct ManualCheckService {
        pending: Mutex<Vec<oneshot::Sender<Result<ConfigCheckResponse, TransportError>>>>,
    }

    impl ManualCheckService {
        fn pending_count(&self) -> usize {
            self.pending.lock().len()
        }

        fn resolve(&self, index: usize, outcome: Result<ConfigCheckResponse, TransportError>) {
            let sender = self.pending.lock().remove(index);
            let _ = sender.send(outcome);
        }
    }

    impl ConfigCheckService for ManualCheckService {
        fn check(
            &self,
            _request: ConfigCheckRequest,
        ) -> futures::future::BoxFuture<'static, Result<ConfigCheckResponse, TransportError>>
        {
            let (sender, receiver) = oneshot::channel();
            self.pending.lock().push(sender);
            async move {
                receiver
                    .await
                    .unwrap_or_else(|_| Err(TransportError("request dropped".to_string())))
            }
            .boxed()
        }
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    struct Fixture {
        hub: Arc<EventHub>,
        page: Arc<Mutex<DashboardPage>>,
        check_service: Arc<ManualCheckService>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                hub: Arc::new(EventHub::new()),
                page: Arc::new(Mutex::new(DashboardPage::new(12, 8))),
                check_service: Arc::new(ManualCheckService::default()),
            }
        }

        fn open_for_new_clock(&self) -> EditDialogue {
            let mut catalog = WidgetCatalog::new();
            catalog.register(WidgetManifest::new(
                "clock",
                GridSize::new(2, 2),
                GridSize::new(1, 1),
            ));
            let sandbox = EditSandbox::start_new(
                Arc::clone(&self.page),
                Arc::clone(&self.hub),
                Arc::new(StaticContent),
                Arc::new(catalog),
                "clock".into(),
                Some(GridPos::new(0, 0, 2, 2)),
            )
            .unwrap();
            EditDialogue::open(
                Arc::clone(&self.hub),
                sandbox,
                Arc::clone(&self.check_service) as Arc<dyn ConfigCheckService>,
            )
        }
    }

    fn valid_with(fields: WidgetFields) -> ConfigCheckResponse {
        ConfigCheckResponse::Valid {
            fields,
            messages: Vec::new(),
        }
    }

    #[tokio::test]
    async fn open_loads_until_the_initial_check_completes() {
        let fixture = Fixture::new();
        let dialogue = fixture.open_for_new_clock();
        assert_eq!(dialogue.state(), DialogueState::Loading);
        settle().await;
        assert_eq!(fixture.check_service.pending_count(), 1);

        fixture.check_service.resolve(0, Ok(valid_with(WidgetFields::new())));
        settle().await;
        assert_eq!(dialogue.state(), DialogueState::Ready);
        // The sandbox left the placeholder phase on the applied outcome.
        assert_eq!(
            fixture.page.lock().widgets()[0].config().kind,
            "clock".into()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_collapse_into_one_debounced_check() {
        let fixture = Fixture::new();
        let dialogue = fixture.open_for_new_clock();
        settle().await;
        fixture.check_service.resolve(0, Ok(valid_with(WidgetFields::new())));
        settle().await;

        for name in ["B", "Be", "Ber"] {
            dialogue
                .field_changed(WidgetConfig::new("clock").with_name(name))
                .unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(fixture.check_service.pending_count(), 0);

        tokio::time::sleep(DEBOUNCE_INTERVAL).await;
        settle().await;
        assert_eq!(fixture.check_service.pending_count(), 1);
        assert_eq!(dialogue.draft_config().name, "Ber");
    }

    #[tokio::test]
    async fn valid_outcomes_flow_into_the_sandbox() {
        let fixture = Fixture::new();
        let dialogue = fixture.open_for_new_clock();
        settle().await;

        let normalized = WidgetFields::new().with_value("tz", json!("Europe/Riga"));
        fixture.check_service.resolve(0, Ok(valid_with(normalized.clone())));
        settle().await;

        assert_eq!(dialogue.draft_config().fields, normalized);
        assert_eq!(
            fixture.page.lock().widgets()[0].config().fields,
            normalized
        );
    }

    #[tokio::test]
    async fn invalid_outcomes_surface_without_touching_the_sandbox() {
        let fixture = Fixture::new();
        let dialogue = fixture.open_for_new_clock();
        settle().await;

        let before = fixture.page.lock().widgets()[0].unique_id();
        fixture.check_service.resolve(
            0,
            Ok(ConfigCheckResponse::Invalid {
                error: ServiceError::new(["name is required"]),
            }),
        );
        settle().await;

        assert_eq!(dialogue.error().unwrap().messages, vec!["name is required"]);
        assert_eq!(fixture.page.lock().widgets()[0].unique_id(), before);
    }

    #[tokio::test]
    async fn submit_applies_and_publishes_the_form_event() {
        let fixture = Fixture::new();
        let dialogue = fixture.open_for_new_clock();
        settle().await;
        fixture.check_service.resolve(0, Ok(valid_with(WidgetFields::new())));
        settle().await;

        let submits = Arc::new(Mutex::new(0u32));
        let sink = Arc::clone(&submits);
        fixture.hub.subscribe(Subscription::new(
            FormEvent::require(FormEventName::Submit),
            move |_| *sink.lock() += 1,
        ));

        let submitted = tokio::spawn({
            let dialogue = dialogue.clone();
            async move { dialogue.submit().await }
        });
        settle().await;
        fixture.check_service.resolve(0, Ok(valid_with(WidgetFields::new())));

        assert!(submitted.await.unwrap().unwrap());
        assert_eq!(dialogue.state(), DialogueState::Closed);
        assert_eq!(*submits.lock(), 1);
        assert!(matches!(dialogue.submit().await, Err(DialogueError::Closed)));
    }

    #[tokio::test]
    async fn fatal_submit_outcome_keeps_the_dialogue_open() {
        let fixture = Fixture::new();
        let dialogue = fixture.open_for_new_clock();
        settle().await;
        fixture.check_service.resolve(0, Ok(valid_with(WidgetFields::new())));
        settle().await;

        let submitted = tokio::spawn({
            let dialogue = dialogue.clone();
            async move { dialogue.submit().await }
        });
        settle().await;
        fixture.check_service.resolve(
            0,
            Ok(ConfigCheckResponse::Invalid {
                error: ServiceError::new(["overlapping widgets"]),
            }),
        );

        assert!(!submitted.await.unwrap().unwrap());
        assert_eq!(dialogue.state(), DialogueState::Ready);
        assert!(dialogue.error().is_some());
    }

    #[tokio::test]
    async fn cancel_rolls_back_and_closes() {
        let fixture = Fixture::new();
        let dialogue = fixture.open_for_new_clock();
        settle().await;
        fixture.check_service.resolve(0, Ok(valid_with(WidgetFields::new())));
        settle().await;
        assert_eq!(fixture.page.lock().widgets().len(), 1);

        let cancels = Arc::new(Mutex::new(0u32));
        let sink = Arc::clone(&cancels);
        fixture.hub.subscribe(Subscription::new(
            FormEvent::require(FormEventName::Cancel),
            move |_| *sink.lock() += 1,
        ));

        dialogue.cancel().unwrap();
        assert_eq!(dialogue.state(), DialogueState::Closed);
        assert_eq!(*cancels.lock(), 1);
        assert!(fixture.page.lock().widgets().is_empty());
        assert_eq!(
            dialogue.shared.sandbox.lock().state(),
            SessionState::Cancelled
        );
    }
}
