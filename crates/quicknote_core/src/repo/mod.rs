//! Repository layer: the sole gateway to durable note storage.
//!
//! # Responsibility
//! - Define the store contract consumed by the editing session.
//! - Isolate SQLite and payload encoding from session logic.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`MissingId`, `NotFound`,
//!   `Decode`) in addition to DB transport errors.

pub mod note_repo;
