//! The widget content service collaborator.

use board_proto::{ContentRequest, ContentResponse, TransportError};
use futures::future::BoxFuture;

/// External collaborator that renders a widget's contents.
///
/// Implementations perform the actual data retrieval and templating,
/// which are out of scope for this core. A transport-level `Err` is
/// non-fatal (the update engine schedules a retry); a fatal controller
/// error is an `Ok(ContentResponse::Error { .. })` and is rendered as an
/// in-place message.
pub trait ContentService: Send + Sync {
    /// Fetch the contents for one update cycle.
    fn fetch(
        &self,
        request: ContentRequest,
    ) -> BoxFuture<'static, Result<ContentResponse, TransportError>>;
}
