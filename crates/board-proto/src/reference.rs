//! Broadcast references: the stable identities widgets expose to each
//! other as data sources.
//!
//! A widget that broadcasts data owns a [`Reference`]. Another widget
//! depends on it by storing a [`TypedReference`] in one of its
//! configuration fields: the reference plus the broadcast data type it
//! expects from that source (the "foreign reference field" of the
//! glossary).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProtoError;

/// Stable broadcast identity of a widget.
///
/// An empty reference means "no data source selected".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reference(String);

impl Reference {
    /// Create a reference from its string form.
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// The empty reference.
    #[must_use]
    pub const fn empty() -> Self {
        Self(String::new())
    }

    /// Check whether this is the empty reference.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the reference as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Reference {
    fn from(reference: &str) -> Self {
        Self::new(reference)
    }
}

/// Data type tag of a broadcast, e.g. `_hostid`.
///
/// Broadcast types start with an underscore by convention, which keeps
/// the `reference._type` string form unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BroadcastType(String);

impl BroadcastType {
    /// Create a broadcast type from its tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Get the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BroadcastType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BroadcastType {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

/// A reference to another widget's broadcast of a specific data type.
///
/// Serialized in configuration fields as `reference._type` (empty string
/// when unset).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypedReference {
    /// The broadcast identity of the source widget.
    pub reference: Reference,
    /// The broadcast data type expected from the source.
    pub broadcast_type: BroadcastType,
}

impl TypedReference {
    /// Create a typed reference.
    #[must_use]
    pub const fn new(reference: Reference, broadcast_type: BroadcastType) -> Self {
        Self {
            reference,
            broadcast_type,
        }
    }

    /// The unset typed reference.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            reference: Reference::empty(),
            broadcast_type: BroadcastType::new(""),
        }
    }

    /// Check whether this typed reference is unset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reference.is_empty()
    }

    /// Serialize to the `reference._type` string form.
    ///
    /// The empty typed reference serializes to the empty string.
    #[must_use]
    pub fn to_typed_string(&self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            format!("{}.{}", self.reference, self.broadcast_type)
        }
    }

    /// Parse the `reference._type` string form.
    ///
    /// # Errors
    ///
    /// Returns an error if a non-empty string lacks the `.` separator.
    pub fn parse_typed(s: &str) -> Result<Self, ProtoError> {
        if s.is_empty() {
            return Ok(Self::empty());
        }

        match s.split_once('.') {
            Some((reference, broadcast_type)) if !reference.is_empty() => Ok(Self::new(
                Reference::new(reference),
                BroadcastType::new(broadcast_type),
            )),
            _ => Err(ProtoError::InvalidTypedReference(s.to_string())),
        }
    }
}
