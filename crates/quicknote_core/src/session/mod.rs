//! Note editing session.
//!
//! # Responsibility
//! - Hold the per-note view/edit/select state backing the UI.
//! - Translate presentation intents into transitions and store calls.
//!
//! # Invariants
//! - The session is the sole writer of in-memory note state; observers only
//!   receive snapshots.
//! - The repository is the sole gateway to durable storage.

pub mod intent;
pub mod state;
pub mod worker;
