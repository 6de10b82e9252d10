//! Presentation intents and their dispatch onto the session.

use crate::model::content::{ContentBlock, ContentType, MoneyAdjustment};
use crate::model::note::Note;
use crate::repo::note_repo::NoteRepository;
use crate::session::state::{FocusHint, NoteSession, SessionResult};

/// One user intent forwarded by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    AddNote,
    StartEdit {
        note: usize,
    },
    Mutate {
        note: usize,
        value: Note,
    },
    SetTitle {
        note: usize,
        title: String,
    },
    AddContent {
        note: usize,
        kind: ContentType,
    },
    ReplaceContent {
        note: usize,
        content: usize,
        block: ContentBlock,
    },
    RemoveContent {
        note: usize,
        content: usize,
    },
    MoveContentUp {
        note: usize,
        content: usize,
    },
    MoveContentDown {
        note: usize,
        content: usize,
    },
    AdjustMoney {
        note: usize,
        content: usize,
        adjustment: MoneyAdjustment,
    },
    Undo {
        note: usize,
    },
    Commit {
        note: usize,
    },
    Cancel {
        note: usize,
    },
    DeleteEditing {
        note: usize,
    },
    EnterSelection,
    ToggleSelect {
        note: usize,
        selected: bool,
    },
    SelectAll {
        selected: bool,
    },
    ExitSelection,
    DeleteSelected,
    UndoDelete,
    Reload,
}

/// Result payload of a dispatched intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentOutcome {
    Done,
    NoteAdded(usize),
    ContentAdded(FocusHint),
    /// `false` when the transition was a no-op (empty undo slot, edge move).
    Applied(bool),
    Deleted(usize),
    Restored(usize),
}

impl<R: NoteRepository> NoteSession<R> {
    /// Routes one intent to its transition.
    pub fn dispatch(&mut self, intent: Intent) -> SessionResult<IntentOutcome> {
        let outcome = match intent {
            Intent::AddNote => IntentOutcome::NoteAdded(self.add_note()?),
            Intent::StartEdit { note } => {
                self.start_edit(note)?;
                IntentOutcome::Done
            }
            Intent::Mutate { note, value } => {
                self.mutate(note, value)?;
                IntentOutcome::Done
            }
            Intent::SetTitle { note, title } => {
                self.set_title(note, title)?;
                IntentOutcome::Done
            }
            Intent::AddContent { note, kind } => {
                IntentOutcome::ContentAdded(self.add_content_block(note, kind)?)
            }
            Intent::ReplaceContent {
                note,
                content,
                block,
            } => {
                self.replace_content(note, content, block)?;
                IntentOutcome::Done
            }
            Intent::RemoveContent { note, content } => {
                self.remove_content(note, content)?;
                IntentOutcome::Done
            }
            Intent::MoveContentUp { note, content } => {
                IntentOutcome::Applied(self.move_content_up(note, content)?)
            }
            Intent::MoveContentDown { note, content } => {
                IntentOutcome::Applied(self.move_content_down(note, content)?)
            }
            Intent::AdjustMoney {
                note,
                content,
                adjustment,
            } => {
                self.adjust_money(note, content, adjustment)?;
                IntentOutcome::Done
            }
            Intent::Undo { note } => IntentOutcome::Applied(self.undo(note)?),
            Intent::Commit { note } => {
                self.commit(note)?;
                IntentOutcome::Done
            }
            Intent::Cancel { note } => {
                self.cancel_edit(note)?;
                IntentOutcome::Done
            }
            Intent::DeleteEditing { note } => {
                self.delete_edit(note)?;
                IntentOutcome::Done
            }
            Intent::EnterSelection => {
                self.enter_selection_mode()?;
                IntentOutcome::Done
            }
            Intent::ToggleSelect { note, selected } => {
                self.toggle_select(note, selected)?;
                IntentOutcome::Done
            }
            Intent::SelectAll { selected } => {
                self.select_all(selected)?;
                IntentOutcome::Done
            }
            Intent::ExitSelection => {
                self.exit_selection_mode();
                IntentOutcome::Done
            }
            Intent::DeleteSelected => IntentOutcome::Deleted(self.delete_selected()?),
            Intent::UndoDelete => IntentOutcome::Restored(self.undo_delete()?),
            Intent::Reload => {
                self.reload()?;
                IntentOutcome::Done
            }
        };
        Ok(outcome)
    }
}
