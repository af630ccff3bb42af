//! The configuration-check service collaborator.

use board_proto::{ConfigCheckRequest, ConfigCheckResponse, TransportError};
use futures::future::BoxFuture;

/// External collaborator that validates and normalizes a draft widget
/// configuration.
///
/// Called on every debounced edit, so implementations must be
/// idempotent and side-effect-free. A transport-level `Err` is silently
/// dropped by the validator when superseded; a rejected configuration
/// is an `Ok(ConfigCheckResponse::Invalid { .. })`.
pub trait ConfigCheckService: Send + Sync {
    /// Validate one draft configuration.
    fn check(
        &self,
        request: ConfigCheckRequest,
    ) -> BoxFuture<'static, Result<ConfigCheckResponse, TransportError>>;
}
