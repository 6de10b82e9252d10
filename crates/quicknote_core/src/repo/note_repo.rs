//! Note repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Map `Note` values to persisted `{ id, payload }` records and back.
//! - Keep SQL and JSON payload details inside the persistence boundary.
//!
//! # Invariants
//! - The payload is the JSON encoding of a note without its id.
//! - `update`/`delete` address a note strictly by id; a note without id is
//!   rejected with `MissingId` before any SQL runs.
//! - A malformed payload fails only its own record during `get_all`.

use crate::db::DbError;
use crate::model::note::{Note, NoteId};
use log::{debug, warn};
use rusqlite::{params, Connection};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for note persistence.
#[derive(Debug)]
pub enum RepoError {
    /// Persisted payload of record `id` is not a valid note.
    Decode {
        id: NoteId,
        source: serde_json::Error,
    },
    /// Note could not be encoded into a payload.
    Encode(serde_json::Error),
    /// Operation requires a persisted note but the note has no id.
    MissingId { op: &'static str },
    /// Record addressed by id does not exist.
    NotFound(NoteId),
    /// Connection is missing the notes schema.
    MissingRequiredTable(&'static str),
    /// Storage transport failure.
    Db(DbError),
}

impl RepoError {
    /// Returns whether this error indicates a caller bug rather than a
    /// storage condition.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::MissingId { .. })
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decode { id, source } => write!(f, "note record {id} has invalid payload: {source}"),
            Self::Encode(err) => write!(f, "failed to encode note payload: {err}"),
            Self::MissingId { op } => write!(f, "note `{op}` requires a persisted note id"),
            Self::NotFound(id) => write!(f, "note not found: {id}"),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Decode { source, .. } => Some(source),
            Self::Encode(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::MissingId { .. } | Self::NotFound(_) | Self::MissingRequiredTable(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Raw persisted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteRecord {
    pub id: NoteId,
    pub payload: String,
}

/// One record skipped during a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeFailure {
    pub id: NoteId,
    pub message: String,
}

/// Result of loading every persisted note.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Decoded notes in store order, each carrying its id.
    pub notes: Vec<Note>,
    /// Records whose payload failed to decode.
    pub failures: Vec<DecodeFailure>,
}

impl LoadReport {
    /// Decodes raw records, isolating failures per record.
    pub fn from_records(records: impl IntoIterator<Item = NoteRecord>) -> Self {
        let mut report = Self::default();
        for record in records {
            match decode_record(&record) {
                Ok(note) => report.notes.push(note),
                Err(err) => {
                    warn!(
                        "event=note_decode module=repo status=error note_id={} error_code=decode_failed",
                        record.id
                    );
                    report.failures.push(DecodeFailure {
                        id: record.id,
                        message: err.to_string(),
                    });
                }
            }
        }
        report
    }

    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Store gateway used by the editing session.
pub trait NoteRepository {
    /// Loads every persisted note; undecodable records land in `failures`.
    fn get_all(&self) -> RepoResult<LoadReport>;
    /// Persists a new note and returns it carrying the store-assigned id.
    ///
    /// Any id already on `note` is ignored.
    fn insert(&self, note: &Note) -> RepoResult<Note>;
    /// Re-inserts a previously deleted note under its former id.
    ///
    /// Notes without id are inserted as new. Fails when the id is taken.
    fn restore(&self, note: &Note) -> RepoResult<Note>;
    /// Replaces the payload of an existing note.
    fn update(&self, note: &Note) -> RepoResult<()>;
    /// Removes a note. Deleting an already-missing record succeeds.
    fn delete(&self, note: &Note) -> RepoResult<()>;
}

/// Encodes a note into its persisted payload (id excluded).
pub fn encode_payload(note: &Note) -> RepoResult<String> {
    serde_json::to_string(note).map_err(RepoError::Encode)
}

/// Decodes a persisted payload; the returned note has no id.
pub fn decode_payload(payload: &str) -> Result<Note, serde_json::Error> {
    serde_json::from_str(payload)
}

/// Decodes one record into a note tagged with the record id.
pub fn decode_record(record: &NoteRecord) -> RepoResult<Note> {
    decode_payload(&record.payload)
        .map(|note| note.with_id(record.id))
        .map_err(|source| RepoError::Decode {
            id: record.id,
            source,
        })
}

/// Returns the note id or a `MissingId` precondition error.
pub fn require_id(note: &Note, op: &'static str) -> RepoResult<NoteId> {
    note.id.ok_or(RepoError::MissingId { op })
}

/// SQLite-backed note repository.
pub struct SqliteNoteRepository {
    conn: Connection,
}

impl SqliteNoteRepository {
    /// Wraps a migrated connection.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        if !table_exists(&conn, "notes")? {
            return Err(RepoError::MissingRequiredTable("notes"));
        }
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Lists raw records in id order without decoding.
    pub fn list_records(&self) -> RepoResult<Vec<NoteRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, payload FROM notes ORDER BY id ASC;")?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(NoteRecord {
                id: row.get("id")?,
                payload: row.get("payload")?,
            });
        }
        Ok(records)
    }
}

impl NoteRepository for SqliteNoteRepository {
    fn get_all(&self) -> RepoResult<LoadReport> {
        let records = self.list_records()?;
        let report = LoadReport::from_records(records);
        debug!(
            "event=note_load module=repo status=ok loaded={} skipped={}",
            report.notes.len(),
            report.failures.len()
        );
        Ok(report)
    }

    fn insert(&self, note: &Note) -> RepoResult<Note> {
        let payload = encode_payload(note)?;
        self.conn
            .execute("INSERT INTO notes (payload) VALUES (?1);", [payload])?;
        let id = self.conn.last_insert_rowid();
        debug!("event=note_insert module=repo status=ok note_id={id}");
        Ok(note.with_id(id))
    }

    fn restore(&self, note: &Note) -> RepoResult<Note> {
        let Some(id) = note.id else {
            return self.insert(note);
        };
        let payload = encode_payload(note)?;
        self.conn.execute(
            "INSERT INTO notes (id, payload) VALUES (?1, ?2);",
            params![id, payload],
        )?;
        debug!("event=note_restore module=repo status=ok note_id={id}");
        Ok(note.clone())
    }

    fn update(&self, note: &Note) -> RepoResult<()> {
        let id = require_id(note, "update")?;
        let payload = encode_payload(note)?;
        let changed = self.conn.execute(
            "UPDATE notes SET payload = ?2 WHERE id = ?1;",
            params![id, payload],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        debug!("event=note_update module=repo status=ok note_id={id}");
        Ok(())
    }

    fn delete(&self, note: &Note) -> RepoResult<()> {
        let id = require_id(note, "delete")?;
        let changed = self
            .conn
            .execute("DELETE FROM notes WHERE id = ?1;", [id])?;
        if changed == 0 {
            warn!("event=note_delete module=repo status=noop note_id={id} reason=missing");
        } else {
            debug!("event=note_delete module=repo status=ok note_id={id}");
        }
        Ok(())
    }
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
