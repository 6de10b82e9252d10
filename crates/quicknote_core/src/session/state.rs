//! Note editing session state machine.
//!
//! # Responsibility
//! - Own the in-memory note list and per-note view/edit/select state.
//! - Keep the single-slot field undo buffer and the single-slot deleted
//!   batch cache.
//! - Reconcile edited notes with the store through commit/cancel/delete.
//!
//! # Invariants
//! - At most one note is editing; starting an edit elsewhere commits it first.
//! - Selection mode and editing are mutually exclusive.
//! - The undo buffer holds the note value from immediately before the most
//!   recent mutation, and is empty outside an active edit.
//! - A failed commit leaves the note editing with its edits intact; a failed
//!   delete leaves the note in the list.
//! - Every transition takes `&mut self`, so a transition and the repository
//!   call it issues complete before any other intent is observed.

use crate::model::content::{ContentBlock, ContentError, ContentType, MoneyAdjustment};
use crate::model::note::{Note, NoteError, NoteId};
use crate::repo::note_repo::{DecodeFailure, NoteRepository, RepoError};
use chrono::{Local, NaiveDate};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Instant;

/// Session error surfaced to the presentation layer.
#[derive(Debug)]
pub enum SessionError {
    /// Note index does not address a note in the session list.
    NoteIndexOutOfRange { index: usize, len: usize },
    /// Transition requires the note to be editing.
    NotEditing(usize),
    /// Transition is not allowed while another note is editing.
    EditInProgress(usize),
    /// Editing is not allowed while selection mode is active.
    SelectionActive,
    /// Selection transition requires selection mode.
    NotSelecting,
    /// A mutation tried to change the note's store identity.
    IdentityChanged {
        expected: Option<NoteId>,
        found: Option<NoteId>,
    },
    Note(NoteError),
    Content(ContentError),
    Repo(RepoError),
    /// Bulk delete removed `completed` notes and failed on `failed`.
    BulkDelete {
        completed: usize,
        failed: usize,
        first: RepoError,
    },
    /// Background session worker is not running.
    WorkerStopped,
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoteIndexOutOfRange { index, len } => {
                write!(f, "note index {index} out of range for {len} notes")
            }
            Self::NotEditing(index) => write!(f, "note {index} is not being edited"),
            Self::EditInProgress(index) => write!(f, "note {index} is being edited"),
            Self::SelectionActive => write!(f, "selection mode is active"),
            Self::NotSelecting => write!(f, "selection mode is not active"),
            Self::IdentityChanged { expected, found } => {
                write!(f, "note id changed from {expected:?} to {found:?}")
            }
            Self::Note(err) => write!(f, "{err}"),
            Self::Content(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::BulkDelete {
                completed,
                failed,
                first,
            } => write!(
                f,
                "deleted {completed} notes, {failed} failed; first error: {first}"
            ),
            Self::WorkerStopped => write!(f, "session worker stopped"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Note(err) => Some(err),
            Self::Content(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::BulkDelete { first, .. } => Some(first),
            _ => None,
        }
    }
}

impl From<NoteError> for SessionError {
    fn from(value: NoteError) -> Self {
        Self::Note(value)
    }
}

impl From<ContentError> for SessionError {
    fn from(value: ContentError) -> Self {
        Self::Content(value)
    }
}

impl From<RepoError> for SessionError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Per-note UI state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteSessionState {
    pub note: Note,
    pub is_editing: bool,
    pub is_selected: bool,
}

impl NoteSessionState {
    fn viewing(note: Note) -> Self {
        Self {
            note,
            is_editing: false,
            is_selected: false,
        }
    }
}

/// Single-slot snapshot of the editing note's previous value.
///
/// Recording replaces the slot; there is no history beyond one step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditingUndoBuffer {
    slot: Option<Note>,
}

impl EditingUndoBuffer {
    pub fn record(&mut self, note: Note) {
        self.slot = Some(note);
    }

    pub fn take(&mut self) -> Option<Note> {
        self.slot.take()
    }

    pub fn clear(&mut self) {
        self.slot = None;
    }

    pub fn peek(&self) -> Option<&Note> {
        self.slot.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }
}

/// Out-of-band hint: where the presentation layer should put input focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusHint {
    pub note_index: usize,
    pub content_index: usize,
}

/// Read-only copy of the session published to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub notes: Vec<NoteSessionState>,
    pub is_selecting: bool,
    pub all_selected: bool,
    pub can_undo: bool,
    pub deleted_batch_len: usize,
    pub focus_hint: Option<FocusHint>,
    pub load_failures: Vec<DecodeFailure>,
}

/// Editing session over one note list.
pub struct NoteSession<R: NoteRepository> {
    repo: R,
    entries: Vec<NoteSessionState>,
    is_selecting: bool,
    all_selected: bool,
    undo: EditingUndoBuffer,
    /// Value of the editing note when the edit started.
    pristine: Option<Note>,
    deleted_batch: Vec<Note>,
    focus_hint: Option<FocusHint>,
    load_failures: Vec<DecodeFailure>,
    observers: Vec<Sender<SessionSnapshot>>,
    today: fn() -> NaiveDate,
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

impl<R: NoteRepository> NoteSession<R> {
    /// Loads every persisted note into a new session.
    ///
    /// Undecodable records are skipped and reported by `load_failures()`.
    pub fn load(repo: R) -> SessionResult<Self> {
        let mut session = Self {
            repo,
            entries: Vec::new(),
            is_selecting: false,
            all_selected: false,
            undo: EditingUndoBuffer::default(),
            pristine: None,
            deleted_batch: Vec::new(),
            focus_hint: None,
            load_failures: Vec::new(),
            observers: Vec::new(),
            today: local_today,
        };
        session.load_entries()?;
        Ok(session)
    }

    /// Replaces the calendar source used for default `Date` blocks.
    pub fn with_today(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Reloads the list from the store.
    ///
    /// # Errors
    /// - `EditInProgress` while a note is editing; reloading would drop edits.
    pub fn reload(&mut self) -> SessionResult<()> {
        if let Some(index) = self.editing_index() {
            return Err(SessionError::EditInProgress(index));
        }
        self.load_entries()?;
        self.publish();
        Ok(())
    }

    fn load_entries(&mut self) -> SessionResult<()> {
        let report = self.repo.get_all()?;
        if report.is_partial() {
            warn!(
                "event=session_load module=session status=partial loaded={} skipped={}",
                report.notes.len(),
                report.failures.len()
            );
        } else {
            info!(
                "event=session_load module=session status=ok loaded={}",
                report.notes.len()
            );
        }
        self.entries = report
            .notes
            .into_iter()
            .map(NoteSessionState::viewing)
            .collect();
        self.load_failures = report.failures;
        self.is_selecting = false;
        self.all_selected = false;
        self.focus_hint = None;
        Ok(())
    }

    pub fn notes(&self) -> &[NoteSessionState] {
        &self.entries
    }

    pub fn note(&self, index: usize) -> SessionResult<&NoteSessionState> {
        self.entries
            .get(index)
            .ok_or(SessionError::NoteIndexOutOfRange {
                index,
                len: self.entries.len(),
            })
    }

    pub fn is_selecting(&self) -> bool {
        self.is_selecting
    }

    pub fn all_selected(&self) -> bool {
        self.all_selected
    }

    pub fn editing_index(&self) -> Option<usize> {
        self.entries.iter().position(|entry| entry.is_editing)
    }

    pub fn undo_buffer(&self) -> &EditingUndoBuffer {
        &self.undo
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// Notes held by the last bulk delete, restorable once.
    pub fn deleted_batch(&self) -> &[Note] {
        &self.deleted_batch
    }

    pub fn focus_hint(&self) -> Option<FocusHint> {
        self.focus_hint
    }

    /// Consumes the focus hint so it is acted on once.
    pub fn take_focus_hint(&mut self) -> Option<FocusHint> {
        self.focus_hint.take()
    }

    pub fn load_failures(&self) -> &[DecodeFailure] {
        &self.load_failures
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            notes: self.entries.clone(),
            is_selecting: self.is_selecting,
            all_selected: self.all_selected,
            can_undo: self.can_undo(),
            deleted_batch_len: self.deleted_batch.len(),
            focus_hint: self.focus_hint,
            load_failures: self.load_failures.clone(),
        }
    }

    /// Registers an observer. The current snapshot is delivered immediately,
    /// then one snapshot per completed transition.
    ///
    /// The channel is unbounded and every snapshot clones the note list, so
    /// the receiver must be drained (e.g. `try_iter().last()`) or dropped.
    /// Dropped receivers are pruned on the next transition.
    pub fn subscribe(&mut self) -> Receiver<SessionSnapshot> {
        let (tx, rx) = mpsc::channel();
        if tx.send(self.snapshot()).is_ok() {
            self.observers.push(tx);
        }
        rx
    }

    fn publish(&mut self) {
        if self.observers.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        self.observers
            .retain(|observer| observer.send(snapshot.clone()).is_ok());
    }

    /// Appends a new unsaved note in editing state and returns its index.
    ///
    /// A note already editing is committed first.
    pub fn add_note(&mut self) -> SessionResult<usize> {
        if self.is_selecting {
            return Err(SessionError::SelectionActive);
        }
        self.commit_current()?;

        let note = Note::default();
        self.begin_edit_tracking(&note);
        self.entries.push(NoteSessionState {
            note,
            is_editing: true,
            is_selected: false,
        });
        let index = self.entries.len() - 1;
        info!("event=note_add module=session status=ok note_index={index}");
        self.publish();
        Ok(index)
    }

    /// Puts the note at `index` into editing state.
    pub fn start_edit(&mut self, index: usize) -> SessionResult<()> {
        self.note(index)?;
        if self.is_selecting {
            return Err(SessionError::SelectionActive);
        }
        match self.editing_index() {
            Some(current) if current == index => return Ok(()),
            Some(current) => self.commit(current)?,
            None => {}
        }

        let note = self.entries[index].note.clone();
        self.begin_edit_tracking(&note);
        self.entries[index].is_editing = true;
        self.publish();
        Ok(())
    }

    fn begin_edit_tracking(&mut self, note: &Note) {
        self.undo.clear();
        self.undo.record(note.clone());
        self.pristine = Some(note.clone());
        self.focus_hint = None;
    }

    fn end_edit_tracking(&mut self) {
        self.undo.clear();
        self.pristine = None;
        self.focus_hint = None;
    }

    fn commit_current(&mut self) -> SessionResult<()> {
        match self.editing_index() {
            Some(current) => self.commit(current),
            None => Ok(()),
        }
    }

    fn editing_note(&self, index: usize) -> SessionResult<&Note> {
        let entry = self.note(index)?;
        if !entry.is_editing {
            return Err(SessionError::NotEditing(index));
        }
        Ok(&entry.note)
    }

    /// Replaces the editing note with `note`, recording the previous value
    /// for one undo step.
    ///
    /// # Errors
    /// - `NotEditing` when the note is not in editing state.
    /// - `IdentityChanged` when `note.id` differs from the current id.
    pub fn mutate(&mut self, index: usize, note: Note) -> SessionResult<()> {
        self.edit_with(index, |current| {
            if current.id != note.id {
                return Err(SessionError::IdentityChanged {
                    expected: current.id,
                    found: note.id,
                });
            }
            Ok(note)
        })
    }

    /// Derives the next value from the current one and applies it as one
    /// mutation, so index-based edits resolve against a single snapshot.
    fn edit_with(
        &mut self,
        index: usize,
        derive: impl FnOnce(&Note) -> SessionResult<Note>,
    ) -> SessionResult<()> {
        self.apply_edit(index, derive)?;
        self.publish();
        Ok(())
    }

    /// Applies one mutation without publishing. Any focus hint is dropped,
    /// since its block index refers to the previous content list.
    fn apply_edit(
        &mut self,
        index: usize,
        derive: impl FnOnce(&Note) -> SessionResult<Note>,
    ) -> SessionResult<()> {
        let next = derive(self.editing_note(index)?)?;
        let previous = std::mem::replace(&mut self.entries[index].note, next);
        self.undo.record(previous);
        self.focus_hint = None;
        Ok(())
    }

    pub fn set_title(&mut self, index: usize, title: impl Into<String>) -> SessionResult<()> {
        let title = title.into();
        self.edit_with(index, |note| Ok(note.with_title(title)))
    }

    /// Appends a default block of `kind` and returns the focus hint for it.
    pub fn add_content_block(&mut self, index: usize, kind: ContentType) -> SessionResult<FocusHint> {
        let block = kind.default_block_on((self.today)());
        self.apply_edit(index, |note| Ok(note.append_content(block)))?;
        let hint = FocusHint {
            note_index: index,
            content_index: self.entries[index].note.contents.len() - 1,
        };
        self.focus_hint = Some(hint);
        self.publish();
        Ok(hint)
    }

    pub fn replace_content(
        &mut self,
        index: usize,
        content_index: usize,
        block: ContentBlock,
    ) -> SessionResult<()> {
        self.edit_with(index, |note| Ok(note.replace_content_at(content_index, block)?))
    }

    pub fn remove_content(&mut self, index: usize, content_index: usize) -> SessionResult<()> {
        self.edit_with(index, |note| Ok(note.remove_content_at(content_index)?))
    }

    /// Swaps two neighbouring blocks.
    pub fn move_content(&mut self, index: usize, from: usize, to: usize) -> SessionResult<()> {
        self.edit_with(index, |note| Ok(note.move_content(from, to)?))
    }

    /// Moves a block one position up; returns `false` when already first.
    pub fn move_content_up(&mut self, index: usize, content_index: usize) -> SessionResult<bool> {
        let len = self.editing_note(index)?.contents.len();
        if content_index >= len {
            return Err(NoteError::IndexOutOfRange {
                index: content_index,
                len,
            }
            .into());
        }
        if content_index == 0 {
            return Ok(false);
        }
        self.move_content(index, content_index, content_index - 1)?;
        Ok(true)
    }

    /// Moves a block one position down; returns `false` when already last.
    pub fn move_content_down(&mut self, index: usize, content_index: usize) -> SessionResult<bool> {
        let len = self.editing_note(index)?.contents.len();
        if content_index >= len {
            return Err(NoteError::IndexOutOfRange {
                index: content_index,
                len,
            }
            .into());
        }
        if content_index + 1 == len {
            return Ok(false);
        }
        self.move_content(index, content_index, content_index + 1)?;
        Ok(true)
    }

    /// Applies one money adjustment step to a money block.
    pub fn adjust_money(
        &mut self,
        index: usize,
        content_index: usize,
        adjustment: MoneyAdjustment,
    ) -> SessionResult<()> {
        self.edit_with(index, |note| {
            let block = note
                .contents
                .get(content_index)
                .ok_or(NoteError::IndexOutOfRange {
                    index: content_index,
                    len: note.contents.len(),
                })?;
            let adjusted = block.adjusted_money(adjustment)?;
            Ok(note.replace_content_at(content_index, adjusted)?)
        })
    }

    /// Restores the value from before the most recent mutation.
    ///
    /// Returns `false` without change when the buffer is already empty.
    pub fn undo(&mut self, index: usize) -> SessionResult<bool> {
        self.editing_note(index)?;
        match self.undo.take() {
            Some(previous) => {
                self.entries[index].note = previous;
                self.focus_hint = None;
                self.publish();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Persists the editing note and returns it to viewing state.
    ///
    /// Unsaved notes are inserted, persisted ones updated. On failure the
    /// note stays editing with its edits and undo slot untouched.
    pub fn commit(&mut self, index: usize) -> SessionResult<()> {
        let note = self.editing_note(index)?.clone();
        let started_at = Instant::now();
        let (op, result) = match note.id {
            None => ("insert", self.repo.insert(&note)),
            Some(_) => ("update", self.repo.update(&note).map(|()| note)),
        };

        match result {
            Ok(saved) => {
                info!(
                    "event=note_commit module=session status=ok op={} note_id={} duration_ms={}",
                    op,
                    saved.id.map_or_else(|| "none".to_string(), |id| id.to_string()),
                    started_at.elapsed().as_millis()
                );
                let entry = &mut self.entries[index];
                entry.note = saved;
                entry.is_editing = false;
                self.end_edit_tracking();
                self.publish();
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=note_commit module=session status=error op={} note_index={} duration_ms={} error={}",
                    op,
                    index,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err.into())
            }
        }
    }

    /// Leaves editing without persisting.
    ///
    /// A never-persisted note is removed; a persisted one reverts to the value
    /// it had when the edit started.
    pub fn cancel_edit(&mut self, index: usize) -> SessionResult<()> {
        let is_persisted = self.editing_note(index)?.is_persisted();
        let pristine = self.pristine.take();
        self.end_edit_tracking();

        if is_persisted {
            let entry = &mut self.entries[index];
            if let Some(original) = pristine {
                entry.note = original;
            }
            entry.is_editing = false;
        } else {
            self.entries.remove(index);
        }
        info!("event=note_cancel module=session status=ok note_index={index} persisted={is_persisted}");
        self.publish();
        Ok(())
    }

    /// Deletes the editing note from the store and the list.
    pub fn delete_edit(&mut self, index: usize) -> SessionResult<()> {
        let note = self.editing_note(index)?.clone();
        if note.is_persisted() {
            if let Err(err) = self.repo.delete(&note) {
                error!(
                    "event=note_delete module=session status=error note_index={index} error={err}"
                );
                return Err(err.into());
            }
        }

        self.end_edit_tracking();
        self.entries.remove(index);
        info!("event=note_delete module=session status=ok note_index={index}");
        self.publish();
        Ok(())
    }

    /// Enters selection mode with every selection cleared.
    ///
    /// A note already editing is committed first.
    pub fn enter_selection_mode(&mut self) -> SessionResult<()> {
        self.commit_current()?;
        for entry in &mut self.entries {
            entry.is_selected = false;
        }
        self.is_selecting = true;
        self.all_selected = false;
        self.publish();
        Ok(())
    }

    pub fn toggle_select(&mut self, index: usize, selected: bool) -> SessionResult<()> {
        if !self.is_selecting {
            return Err(SessionError::NotSelecting);
        }
        self.note(index)?;
        self.entries[index].is_selected = selected;
        self.recompute_all_selected();
        self.publish();
        Ok(())
    }

    pub fn select_all(&mut self, selected: bool) -> SessionResult<()> {
        if !self.is_selecting {
            return Err(SessionError::NotSelecting);
        }
        for entry in &mut self.entries {
            entry.is_selected = selected;
        }
        self.all_selected = selected;
        self.publish();
        Ok(())
    }

    pub fn exit_selection_mode(&mut self) {
        for entry in &mut self.entries {
            entry.is_selected = false;
        }
        self.is_selecting = false;
        self.all_selected = false;
        self.publish();
    }

    /// An empty list is never "all selected".
    fn recompute_all_selected(&mut self) {
        self.all_selected =
            !self.entries.is_empty() && self.entries.iter().all(|entry| entry.is_selected);
    }

    /// Deletes every selected note and caches them as the last deleted batch.
    ///
    /// Returns the number deleted; zero selected is a no-op. Notes whose
    /// delete fails stay listed and selected, and the call reports
    /// `BulkDelete` after removing the ones that succeeded.
    pub fn delete_selected(&mut self) -> SessionResult<usize> {
        let selected: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_selected)
            .map(|(idx, _)| idx)
            .collect();
        if selected.is_empty() {
            return Ok(0);
        }

        let mut removed = vec![false; self.entries.len()];
        let mut batch = Vec::with_capacity(selected.len());
        let mut failed = 0;
        let mut first_error = None;
        for idx in selected {
            let note = &self.entries[idx].note;
            let result = if note.is_persisted() {
                self.repo.delete(note)
            } else {
                Ok(())
            };
            match result {
                Ok(()) => {
                    removed[idx] = true;
                    batch.push(note.clone());
                }
                Err(err) => {
                    failed += 1;
                    first_error.get_or_insert(err);
                }
            }
        }

        let completed = batch.len();
        if completed > 0 {
            let mut flags = removed.into_iter();
            self.entries
                .retain(|_| !flags.next().unwrap_or(false));
            self.deleted_batch = batch;
        }
        self.recompute_all_selected();
        self.publish();

        match first_error {
            None => {
                info!("event=notes_delete_selected module=session status=ok deleted={completed}");
                Ok(completed)
            }
            Some(first) => {
                error!(
                    "event=notes_delete_selected module=session status=error deleted={} failed={} error={}",
                    completed, failed, first
                );
                Err(SessionError::BulkDelete {
                    completed,
                    failed,
                    first,
                })
            }
        }
    }

    /// Re-inserts the last deleted batch once, under the notes' former ids,
    /// and appends it to the list.
    ///
    /// Returns the number restored; an empty batch is a no-op. On failure the
    /// notes not yet restored stay cached for a retry.
    pub fn undo_delete(&mut self) -> SessionResult<usize> {
        if self.deleted_batch.is_empty() {
            return Ok(0);
        }

        let mut pending = std::mem::take(&mut self.deleted_batch).into_iter();
        let mut restored = 0;
        while let Some(note) = pending.next() {
            match self.repo.restore(&note) {
                Ok(saved) => {
                    self.entries.push(NoteSessionState::viewing(saved));
                    restored += 1;
                }
                Err(err) => {
                    self.deleted_batch = std::iter::once(note).chain(pending).collect();
                    error!(
                        "event=notes_undo_delete module=session status=error restored={} remaining={} error={}",
                        restored,
                        self.deleted_batch.len(),
                        err
                    );
                    if self.is_selecting {
                        self.recompute_all_selected();
                    }
                    self.publish();
                    return Err(err.into());
                }
            }
        }

        if self.is_selecting {
            self.recompute_all_selected();
        }
        info!("event=notes_undo_delete module=session status=ok restored={restored}");
        self.publish();
        Ok(restored)
    }
}
