//! Core identifier types for the Gridboard runtime.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ProtoError;

/// Session-local runtime identifier of a widget instance.
///
/// Generated when the widget object is constructed and never reused within
/// a page session. Copy-on-write replacement during editing produces a new
/// `WidgetUniqueId` for every replacement instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WidgetUniqueId(Uuid);

impl WidgetUniqueId {
    /// Create a new random `WidgetUniqueId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a `WidgetUniqueId` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid UUID.
    pub fn parse(s: &str) -> Result<Self, ProtoError> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| ProtoError::InvalidId(format!("invalid widget unique ID: {e}")))
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for WidgetUniqueId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WidgetUniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted identifier of a widget, assigned by the server.
///
/// Absent for widgets that have never been saved (e.g. a draft created
/// during an edit session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WidgetId(Uuid);

impl WidgetId {
    /// Create a new random `WidgetId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a `WidgetId` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid UUID.
    pub fn parse(s: &str) -> Result<Self, ProtoError> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| ProtoError::InvalidId(format!("invalid widget ID: {e}")))
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for WidgetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Widget type tag (the `id` of a widget-type manifest).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WidgetKind(String);

impl WidgetKind {
    /// Create a widget kind from a type tag.
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    /// Get the type tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WidgetKind {
    fn from(kind: &str) -> Self {
        Self::new(kind)
    }
}
