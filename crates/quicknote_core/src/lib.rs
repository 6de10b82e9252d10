//! Core domain logic for QuickNote.
//! This crate owns the note model, the editing session state machine and the
//! store contract.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod session;

pub use config::CoreConfig;
pub use logging::{default_log_level, init_logging, logging_status, LogLevel, LoggingError};
pub use model::content::{
    format_absolute_date, format_amount, format_key_combination, link_open_target, pop_key,
    push_key, ContentBlock, ContentError, ContentType, Key, KeySymbol, MoneyAdjustment,
    NamedSymbol, RelativeDay,
};
pub use model::note::{Note, NoteError, NoteId};
pub use query::{
    content_type_catalogue, project_notes, ContentTypeDescriptor, NoteFilter, NoteListItem,
    NoteSort,
};
pub use repo::note_repo::{
    decode_payload, encode_payload, DecodeFailure, LoadReport, NoteRecord, NoteRepository,
    RepoError, RepoResult, SqliteNoteRepository,
};
pub use session::intent::{Intent, IntentOutcome};
pub use session::state::{
    EditingUndoBuffer, FocusHint, NoteSession, NoteSessionState, SessionError, SessionResult,
    SessionSnapshot,
};
pub use session::worker::SessionWorker;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
