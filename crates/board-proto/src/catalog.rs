//! Widget-type catalog: per-kind defaults and broadcast capabilities.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::geometry::GridSize;
use crate::reference::BroadcastType;
use crate::types::WidgetKind;

/// Static description of a widget type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetManifest {
    /// Widget type tag.
    pub kind: WidgetKind,
    /// Default size used for auto-placement and auto-fix-size.
    pub default_size: GridSize,
    /// Minimum size a single instance (or iterator child cell) may take.
    pub min_size: GridSize,
    /// Broadcast data types instances of this kind can emit.
    pub broadcast_types: Vec<BroadcastType>,
}

impl WidgetManifest {
    /// Create a manifest with no broadcast capability.
    pub fn new(kind: impl Into<WidgetKind>, default_size: GridSize, min_size: GridSize) -> Self {
        Self {
            kind: kind.into(),
            default_size,
            min_size,
            broadcast_types: Vec::new(),
        }
    }

    /// Add a broadcast data type.
    #[must_use]
    pub fn with_broadcast_type(mut self, broadcast_type: impl Into<BroadcastType>) -> Self {
        self.broadcast_types.push(broadcast_type.into());
        self
    }

    /// Check whether this kind can broadcast the given data type.
    #[must_use]
    pub fn supports_broadcast(&self, broadcast_type: &BroadcastType) -> bool {
        self.broadcast_types.contains(broadcast_type)
    }
}

/// Registry of the widget types known to a dashboard.
#[derive(Debug, Clone, Default)]
pub struct WidgetCatalog {
    manifests: HashMap<WidgetKind, WidgetManifest>,
}

impl WidgetCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a widget type, replacing any previous manifest for the
    /// same kind.
    pub fn register(&mut self, manifest: WidgetManifest) {
        self.manifests.insert(manifest.kind.clone(), manifest);
    }

    /// Look up the manifest for a kind.
    #[must_use]
    pub fn manifest(&self, kind: &WidgetKind) -> Option<&WidgetManifest> {
        self.manifests.get(kind)
    }

    /// Number of registered widget types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    /// Check whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }
}
