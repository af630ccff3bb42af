//! Typed events for the widget-edit dialogue domain.
//!
//! Thin value-object specializations of [`Event`]: named event
//! constants, a matching `require` constructor, and payload accessors.
//! No algorithmic behavior lives here.

use serde_json::{json, Value};

use crate::event::{Descriptor, Event};

/// Context value for widget-edit dialogue traffic.
pub const FORM_CONTEXT: &str = "widget_form";

/// Named events of the dialogue domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormEventName {
    /// The dialogue has loaded and the draft is in place.
    Ready,
    /// The draft configuration was updated.
    Update,
    /// The dialogue was submitted and the draft applied.
    Submit,
    /// The dialogue was cancelled and the draft rolled back.
    Cancel,
    /// The dialogue re-validated the current draft.
    Reload,
}

impl FormEventName {
    /// Wire name of the event.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Update => "update",
            Self::Submit => "submit",
            Self::Cancel => "cancel",
            Self::Reload => "reload",
        }
    }
}

/// A dialogue-domain event.
#[derive(Debug, Clone)]
pub struct FormEvent(Event);

impl FormEvent {
    /// Create a dialogue event with an arbitrary payload.
    #[must_use]
    pub fn new(name: FormEventName, data: Value) -> Self {
        Self(Event::new(
            data,
            Descriptor::new()
                .with("context", FORM_CONTEXT)
                .with("event", name.as_str()),
        ))
    }

    /// Create a submit event, optionally carrying a redirect URL for the
    /// caller to navigate to once the dialogue closes.
    #[must_use]
    pub fn submit(redirect_url: Option<&str>) -> Self {
        let data = match redirect_url {
            Some(url) => json!({ "redirect_url": url }),
            None => Value::Null,
        };
        Self::new(FormEventName::Submit, data)
    }

    /// Partial descriptor for subscribing to one dialogue event.
    #[must_use]
    pub fn require(name: FormEventName) -> Descriptor {
        Descriptor::new()
            .with("context", FORM_CONTEXT)
            .with("event", name.as_str())
    }

    /// The underlying hub event.
    #[must_use]
    pub const fn event(&self) -> &Event {
        &self.0
    }

    /// Redirect URL carried by a submit event, if any.
    #[must_use]
    pub fn redirect_url(&self) -> Option<&str> {
        self.0.data().get("redirect_url").and_then(Value::as_str)
    }

    /// Veto the default action (e.g. keep the dialogue open).
    pub fn prevent_default(&self) {
        self.0.prevent_default();
    }

    /// Whether a subscriber vetoed the default action.
    #[must_use]
    pub fn is_default_prevented(&self) -> bool {
        self.0.is_default_prevented()
    }
}

/// Extract the redirect URL from a raw hub event of the dialogue domain.
#[must_use]
pub fn redirect_url_of(event: &Event) -> Option<&str> {
    event.data().get("redirect_url").and_then(Value::as_str)
}
