//! Single-flight configuration validation with prioritized fan-out.

use std::sync::Arc;

use board_proto::{ConfigCheckRequest, ConfigCheckResponse};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::check::ConfigCheckService;

/// Callback invoked with the outcome of a configuration check.
pub type CheckCallback = Arc<dyn Fn(&ConfigCheckResponse) + Send + Sync>;

struct ResultCallback {
    id: String,
    priority: i32,
    once: bool,
    callback: CheckCallback,
}

#[derive(Default)]
struct ValidatorInner {
    /// Monotonic check counter; a completion only lands if its
    /// generation is still the active one.
    generation: u64,
    active: Option<(u64, CancellationToken)>,
    callbacks: Vec<ResultCallback>,
}

/// Issues cancelable configuration checks and fans the outcomes out to
/// registered callbacks.
///
/// At most one check is in flight: issuing a new one cancels the
/// previous, whose result is silently discarded even if the transport
/// completes it later. Transport failures are also silent; only real
/// outcomes (valid or invalid) reach the callbacks.
pub struct EditValidator {
    service: Arc<dyn ConfigCheckService>,
    inner: Arc<Mutex<ValidatorInner>>,
}

impl EditValidator {
    /// Create a validator over the given check service.
    #[must_use]
    pub fn new(service: Arc<dyn ConfigCheckService>) -> Self {
        Self {
            service,
            inner: Arc::new(Mutex::new(ValidatorInner::default())),
        }
    }

    /// Register a result callback under a caller-chosen identity.
    /// Callbacks run in ascending priority order; `once` callbacks are
    /// dropped after their first invocation. Re-registering an identity
    /// overwrites its priority, once flag and callback.
    pub fn on_result(
        &self,
        id: impl Into<String>,
        priority: i32,
        once: bool,
        callback: impl Fn(&ConfigCheckResponse) + Send + Sync + 'static,
    ) {
        let id = id.into();
        let mut inner = self.inner.lock();
        inner.callbacks.retain(|existing| existing.id != id);
        inner.callbacks.push(ResultCallback {
            id,
            priority,
            once,
            callback: Arc::new(callback),
        });
    }

    /// Remove a result callback by identity. Idempotent.
    pub fn remove_result_callback(&self, id: &str) {
        self.inner.lock().callbacks.retain(|existing| existing.id != id);
    }

    /// Start a check, superseding any check already in flight.
    pub fn check(&self, request: ConfigCheckRequest) {
        let (generation, token) = {
            let mut inner = self.inner.lock();
            if let Some((_, token)) = inner.active.take() {
                token.cancel();
            }
            inner.generation += 1;
            let token = CancellationToken::new();
            inner.active = Some((inner.generation, token.clone()));
            (inner.generation, token)
        };

        debug!(kind = %request.kind, generation, "configuration check started");
        let service = Arc::clone(&self.service);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let outcome = tokio::select! {
                () = token.cancelled() => return,
                outcome = service.check(request) => outcome,
            };
            if token.is_cancelled() {
                return;
            }

            let response = match outcome {
                Ok(response) => response,
                Err(error) => {
                    // Non-fatal; the next keystroke re-checks anyway.
                    warn!(%error, "configuration check failed");
                    let mut guard = inner.lock();
                    if guard.active.as_ref().map(|(active, _)| *active) == Some(generation) {
                        guard.active = None;
                    }
                    return;
                }
            };

            let callbacks = {
                let mut guard = inner.lock();
                if guard.active.as_ref().map(|(active, _)| *active) != Some(generation) {
                    return;
                }
                guard.active = None;

                let mut snapshot: Vec<(i32, CheckCallback)> = guard
                    .callbacks
                    .iter()
                    .map(|entry| (entry.priority, Arc::clone(&entry.callback)))
                    .collect();
                guard.callbacks.retain(|entry| !entry.once);
                snapshot.sort_by_key(|(priority, _)| *priority);
                snapshot
            };

            for (_, callback) in callbacks {
                callback(&response);
            }
        });
    }

    /// Cancel any in-flight check without invoking callbacks.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        if let Some((_, token)) = inner.active.take() {
            token.cancel();
        }
    }

    /// Whether a check is currently outstanding.
    #[must_use]
    pub fn in_progress(&self) -> bool {
        self.inner.lock().active.is_some()
    }
}

#[cfg(test)]
mod tests {
    use board_proto::{TransportError, WidgetFields};
    use futures::FutureExt;
    use tokio::sync::oneshot;

    use super::*;

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

    fn request(kind: &str) -> ConfigCheckRequest {
        ConfigCheckRequest {
            kind: kind.into(),
            name: String::new(),
            fields: WidgetFields::new(),
        }
    }

    fn valid() -> ConfigCheckResponse {
        ConfigCheckResponse::Valid {
            fields: WidgetFields::new(),
            messages: Vec::new(),
        }
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn callbacks_run_in_ascending_priority_order() {
        let service = Arc::new(ManualCheckService::default());
        let validator = EditValidator::new(Arc::clone(&service) as Arc<dyn ConfigCheckService>);

        let order = Arc::new(Mutex::new(Vec::new()));
        for (id, priority) in [("form", 10), ("messages", 0), ("preview", 5)] {
            let sink = Arc::clone(&order);
            validator.on_result(id, priority, false, move |_| sink.lock().push(priority));
        }

        validator.check(request("clock"));
        settle().await;
        assert!(validator.in_progress());

        service.resolve(0, Ok(valid()));
        settle().await;
        assert!(!validator.in_progress());
        assert_eq!(order.lock().as_slice(), &[0, 5, 10]);
    }

    #[tokio::test]
    async fn a_new_check_supersedes_the_previous_one() {
        let service = Arc::new(ManualCheckService::default());
        let validator = EditValidator::new(Arc::clone(&service) as Arc<dyn ConfigCheckService>);

        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&outcomes);
        validator.on_result("sink", 0, false, move |response| {
            sink.lock().push(response.clone());
        });

        validator.check(request("clock"));
        settle().await;
        validator.check(request("map"));
        settle().await;
        assert_eq!(service.pending_count(), 2);

        // The superseded completion must not reach the callbacks.
        service.resolve(0, Ok(valid()));
        settle().await;
        assert!(outcomes.lock().is_empty());

        service.resolve(0, Ok(valid()));
        settle().await;
        assert_eq!(outcomes.lock().len(), 1);
    }

    #[tokio::test]
    async fn stop_aborts_silently() {
        let service = Arc::new(ManualCheckService::default());
        let validator = EditValidator::new(Arc::clone(&service) as Arc<dyn ConfigCheckService>);

        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&outcomes);
        validator.on_result("sink", 0, false, move |response| {
            sink.lock().push(response.clone());
        });

        validator.check(request("clock"));
        settle().await;
        validator.stop();
        assert!(!validator.in_progress());

        service.resolve(0, Ok(valid()));
        settle().await;
        assert!(outcomes.lock().is_empty());
    }

    #[tokio::test]
    async fn once_callbacks_fire_a_single_time() {
        let service = Arc::new(ManualCheckService::default());
        let validator = EditValidator::new(Arc::clone(&service) as Arc<dyn ConfigCheckService>);

        let count = Arc::new(Mutex::new(0u32));
        let sink = Arc::clone(&count);
        validator.on_result("once", 0, true, move |_| *sink.lock() += 1);

        for _ in 0..2 {
            validator.check(request("clock"));
            settle().await;
            service.resolve(0, Ok(valid()));
            settle().await;
        }
        assert_eq!(*count.lock(), 1);
    }

    #[tokio::test]
    async fn reregistration_overwrites_priority_and_once() {
        let service = Arc::new(ManualCheckService::default());
        let validator = EditValidator::new(Arc::clone(&service) as Arc<dyn ConfigCheckService>);

        let count = Arc::new(Mutex::new(0u32));
        let sink = Arc::clone(&count);
        validator.on_result("cb", 0, true, move |_| *sink.lock() += 1);
        let sink = Arc::clone(&count);
        validator.on_result("cb", 0, false, move |_| *sink.lock() += 10);

        validator.check(request("clock"));
        settle().await;
        service.resolve(0, Ok(valid()));
        settle().await;
        assert_eq!(*count.lock(), 10);

        validator.remove_result_callback("cb");
        validator.check(request("clock"));
        settle().await;
        service.resolve(0, Ok(valid()));
        settle().await;
        assert_eq!(*count.lock(), 10);
    }

    #[tokio::test]
    async fn transport_failure_is_dropped_silently() {
        let service = Arc::new(ManualCheckService::default());
        let validator = EditValidator::new(Arc::clone(&service) as Arc<dyn ConfigCheckService>);

        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&outcomes);
        validator.on_result("sink", 0, false, move |response| {
            sink.lock().push(response.clone());
        });

        validator.check(request("clock"));
        settle().await;
        service.resolve(0, Err(TransportError("boom".to_string())));
        settle().await;

        assert!(outcomes.lock().is_empty());
        assert!(!validator.in_progress());
    }
}
