//! # board-widget
//!
//! The widget runtime of Gridboard: a lifecycle state machine wrapping
//! one rectangular dashboard cell, a single-flight asynchronous update
//! engine bounded by a cancellation token, the iterator widget with its
//! pixel-exact grid partitioning, and the dashboard page that owns the
//! widgets and answers free-space queries.
//!
//! Widgets never share mutable state with each other: cross-widget
//! coordination happens exclusively through the `board-events` hub (or
//! through the edit sandbox's listener correction in `board-editor`).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod content;
pub mod iterator;
pub mod lifecycle;
pub mod page;
pub mod widget;

pub use content::ContentService;
pub use iterator::{grid_cells, IteratorError, IteratorWidget};
pub use lifecycle::{is_valid_transition, WidgetState};
pub use page::{AccommodateOptions, DashboardPage, PageError, PageResult};
pub use widget::{NoopBehavior, Widget, WidgetBehavior, WidgetError, WidgetResult};
