//! The widget lifecycle state machine.

use std::fmt;

/// Lifecycle state of a widget.
///
/// `INITIAL → INACTIVE → ACTIVE → INACTIVE → … → DESTROYED`. The
/// orthogonal edit-mode flag is not a lifecycle state; see
/// [`Widget::set_edit_mode`](crate::widget::Widget::set_edit_mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetState {
    /// Constructed, view not yet created.
    Initial,
    /// Started but not on the visible page.
    Inactive,
    /// On the visible page, listeners registered, update cycle running.
    Active,
    /// Permanently removed. Terminal.
    Destroyed,
}

impl WidgetState {
    /// Check whether this is the terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Destroyed)
    }
}

impl fmt::Display for WidgetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initial => "initial",
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Destroyed => "destroyed",
        };
        f.write_str(s)
    }
}

/// Check whether a lifecycle transition is allowed.
///
/// Destruction is only reachable from `Inactive`; destroying an active
/// widget deactivates it first (handled by
/// [`Widget::destroy`](crate::widget::Widget::destroy)).
#[must_use]
pub const fn is_valid_transition(from: WidgetState, to: WidgetState) -> bool {
    matches!(
        (from, to),
        (WidgetState::Initial, WidgetState::Inactive)
            | (WidgetState::Inactive, WidgetState::Active)
            | (WidgetState::Active, WidgetState::Inactive)
            | (WidgetState::Inactive, WidgetState::Destroyed)
    )
}
