//! # board-proto
//!
//! Shared value types for the Gridboard dashboard runtime: widget
//! identifiers, grid geometry, configuration, broadcast references, the
//! widget-type catalog, and the payloads exchanged with the external
//! configuration-check and widget-content services.
//!
//! This crate carries no behavior beyond value semantics; the runtime
//! itself lives in `board-events`, `board-widget` and `board-editor`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod geometry;
pub mod reference;
pub mod service;
pub mod types;

pub use catalog::{WidgetCatalog, WidgetManifest};
pub use config::{ViewMode, WidgetConfig, WidgetFields};
pub use error::ProtoError;
pub use geometry::{GridPos, GridSize};
pub use reference::{BroadcastType, Reference, TypedReference};
pub use service::{
    ConfigCheckRequest, ConfigCheckResponse, ContentRequest, ContentResponse, ServiceError,
    TransportError,
};
pub use types::{WidgetId, WidgetKind, WidgetUniqueId};
