//! Payloads exchanged with the external service collaborators.
//!
//! The services themselves (configuration check, widget content) are
//! implemented outside this core; see the `ContentService` and
//! `ConfigCheckService` traits in `board-widget` / `board-editor`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ViewMode, WidgetFields};
use crate::geometry::GridSize;
use crate::types::{WidgetId, WidgetKind, WidgetUniqueId};

/// Transport-level failure talking to a service collaborator.
///
/// Non-fatal by the error taxonomy: widgets schedule a retry, the edit
/// validator drops the result if superseded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("transport failure: {0}")]
pub struct TransportError(pub String);

/// Structured fatal error returned by a service.
///
/// Rendered as an in-place message; never stops the lifecycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceError {
    /// Optional error title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Error messages.
    pub messages: Vec<String>,
}

impl ServiceError {
    /// Create an error from messages.
    pub fn new(messages: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            title: None,
            messages: messages.into_iter().map(Into::into).collect(),
        }
    }

    /// Set the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Draft configuration submitted to the configuration-check service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigCheckRequest {
    /// Widget type tag.
    pub kind: WidgetKind,
    /// Widget name.
    pub name: String,
    /// Draft field values.
    pub fields: WidgetFields,
}

/// Outcome of a configuration check.
///
/// The service must be idempotent and side-effect-free: it is invoked on
/// every keystroke-debounced edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigCheckResponse {
    /// Configuration accepted; fields are validated and normalized.
    Valid {
        /// Normalized field values.
        fields: WidgetFields,
        /// Non-fatal warnings.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        messages: Vec<String>,
    },
    /// Configuration rejected.
    Invalid {
        /// Fatal error details.
        error: ServiceError,
    },
}

/// Update-request payload sent to the widget content service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRequest {
    /// Persisted widget id, if the widget has been saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget_id: Option<WidgetId>,
    /// Session-local widget id.
    pub unique_id: WidgetUniqueId,
    /// Widget type tag.
    pub kind: WidgetKind,
    /// Widget name.
    pub name: String,
    /// Current field values.
    pub fields: WidgetFields,
    /// Header display mode.
    pub view_mode: ViewMode,
    /// Whether the dashboard is in edit mode.
    pub is_edit_mode: bool,
    /// Current contents size in grid cells.
    pub contents_size: GridSize,
    /// Refresh rate in seconds.
    pub rf_rate: u64,
}

/// Response from the widget content service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentResponse {
    /// Successful render content.
    Content {
        /// Resolved widget name for the header.
        name: String,
        /// Rendered body, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<String>,
        /// Non-fatal messages shown next to the content.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        messages: Vec<String>,
        /// Informational annotations.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        info: Vec<String>,
        /// Debug output, if enabled server-side.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        debug: Option<String>,
    },
    /// Fatal controller error.
    Error {
        /// Error details.
        error: ServiceError,
    },
}

impl ContentResponse {
    /// Successful content with just a name and body.
    pub fn content(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Content {
            name: name.into(),
            body: Some(body.into()),
            messages: Vec::new(),
            info: Vec::new(),
            debug: None,
        }
    }

    /// Fatal error response.
    #[must_use]
    pub const fn error(error: ServiceError) -> Self {
        Self::Error { error }
    }
}
