//! Note domain model.
//!
//! # Responsibility
//! - Define the note and content block value types shared by every layer.
//! - Keep persisted payload shape next to the types that own it.
//!
//! # Invariants
//! - All model types are immutable values; edits return new values.
//! - A note's identity is its store-assigned `NoteId`, absent until insert.

pub mod content;
pub mod note;
