//! # board-editor
//!
//! The widget editing stack of Gridboard: a transactional edit sandbox
//! that keeps the page consistent through copy-on-write widget
//! replacement, a single-flight configuration validator, and the edit
//! dialogue orchestrating both around a modal form.
//!
//! Nothing in this crate renders anything: the dialogue communicates
//! with its surroundings through typed form events on the
//! `board-events` hub.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod check;
pub mod dialogue;
pub mod sandbox;
pub mod validator;

pub use check::ConfigCheckService;
pub use dialogue::{DialogueError, DialogueResult, DialogueState, EditDialogue, DEBOUNCE_INTERVAL};
pub use sandbox::{EditSandbox, SandboxError, SandboxResult, SessionState};
pub use validator::{CheckCallback, EditValidator};
