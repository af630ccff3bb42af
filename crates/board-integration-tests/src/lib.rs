//! Integration test crate for the Gridboard widget runtime.
//!
//! This crate exists solely to run integration tests that span multiple
//! Gridboard crates. It has no public API - all functionality is in the
//! test modules.

#![forbid(unsafe_code)]
