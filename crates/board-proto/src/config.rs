//! Widget configuration values.
//!
//! The runtime is generic over widget types: the per-kind field schema is
//! owned by the configuration-check service, and the runtime machinery
//! interprets exactly two well-known parts of a widget's fields: the
//! optional broadcast `reference` the widget exposes, and the set of
//! foreign-reference fields pointing at other widgets' references.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::reference::{Reference, TypedReference};
use crate::types::WidgetKind;

/// Whether the widget header is always shown or only while focused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    /// Header always visible.
    #[default]
    Normal,
    /// Header shown only while the widget is focused.
    HiddenHeader,
}

/// Configuration field values of a widget.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WidgetFields {
    /// Broadcast identity this widget exposes, if it broadcasts at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Reference>,
    /// Foreign-reference fields: field name to the typed reference it
    /// holds. An empty typed reference means "no source selected".
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub references: BTreeMap<String, TypedReference>,
    /// All remaining fields, opaque to the runtime and validated by the
    /// configuration-check service.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub values: Map<String, Value>,
}

impl WidgetFields {
    /// Create empty fields.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the broadcast reference.
    #[must_use]
    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Set a foreign-reference field.
    #[must_use]
    pub fn with_reference_field(mut self, name: impl Into<String>, typed: TypedReference) -> Self {
        self.references.insert(name.into(), typed);
        self
    }

    /// Set an opaque field value.
    #[must_use]
    pub fn with_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Iterate the foreign-reference fields that currently point at the
    /// given reference.
    pub fn reference_fields_pointing_at<'a>(
        &'a self,
        reference: &'a Reference,
    ) -> impl Iterator<Item = (&'a str, &'a TypedReference)> {
        self.references
            .iter()
            .filter(move |(_, typed)| !typed.is_empty() && typed.reference == *reference)
            .map(|(name, typed)| (name.as_str(), typed))
    }

    /// Check whether any foreign-reference field points at the given
    /// reference.
    #[must_use]
    pub fn refers_to(&self, reference: &Reference) -> bool {
        self.reference_fields_pointing_at(reference).next().is_some()
    }
}

/// Complete configuration of a widget.
///
/// Structural equality over this type is what "cancel restores the
/// original byte-for-byte" is checked against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetConfig {
    /// Widget type tag.
    pub kind: WidgetKind,
    /// Custom widget name (may be empty; the content service supplies a
    /// default name).
    pub name: String,
    /// Header display mode.
    pub view_mode: ViewMode,
    /// Configuration field values.
    pub fields: WidgetFields,
    /// Update cycle rate in seconds; `0` disables periodic refresh.
    pub rf_rate: u64,
}

impl WidgetConfig {
    /// Create a configuration with empty fields and default view mode.
    pub fn new(kind: impl Into<WidgetKind>) -> Self {
        Self {
            kind: kind.into(),
            name: String::new(),
            view_mode: ViewMode::default(),
            fields: WidgetFields::new(),
            rf_rate: 0,
        }
    }

    /// Set the widget name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the view mode.
    #[must_use]
    pub const fn with_view_mode(mut self, view_mode: ViewMode) -> Self {
        self.view_mode = view_mode;
        self
    }

    /// Set the field values.
    #[must_use]
    pub fn with_fields(mut self, fields: WidgetFields) -> Self {
        self.fields = fields;
        self
    }

    /// Set the refresh rate in seconds.
    #[must_use]
    pub const fn with_rf_rate(mut self, rf_rate: u64) -> Self {
        self.rf_rate = rf_rate;
        self
    }
}
