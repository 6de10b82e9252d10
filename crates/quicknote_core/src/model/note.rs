//! Note domain model.
//!
//! # Responsibility
//! - Define the titled, ordered collection of content blocks.
//! - Provide copy-on-write edit helpers used by the editing session.
//!
//! # Invariants
//! - `id` is `None` until the store assigns one on first insert.
//! - Every helper returns a new `Note` and preserves `id`.
//! - `contents` order is display order.

use crate::model::content::ContentBlock;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned integer primary key.
pub type NoteId = i64;

/// Index error for content-level edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteError {
    /// `index` is not a valid position in a list of `len` blocks.
    IndexOutOfRange { index: usize, len: usize },
    /// Reordering only swaps neighbours.
    NonAdjacentMove { from: usize, to: usize },
}

impl Display for NoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IndexOutOfRange { index, len } => {
                write!(f, "content index {index} out of range for {len} blocks")
            }
            Self::NonAdjacentMove { from, to } => {
                write!(f, "content move {from} -> {to} is not between neighbours")
            }
        }
    }
}

impl Error for NoteError {}

/// Titled, ordered collection of content blocks.
///
/// The persisted payload carries `title` and `contents` only; `id` lives in
/// the storage record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    #[serde(skip)]
    pub id: Option<NoteId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub contents: Vec<ContentBlock>,
}

impl Note {
    /// Creates an unsaved note.
    pub fn new(title: impl Into<String>, contents: Vec<ContentBlock>) -> Self {
        Self {
            id: None,
            title: title.into(),
            contents,
        }
    }

    /// Returns whether the store has assigned an id.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    pub fn with_id(&self, id: NoteId) -> Self {
        Self {
            id: Some(id),
            ..self.clone()
        }
    }

    pub fn without_id(&self) -> Self {
        Self {
            id: None,
            ..self.clone()
        }
    }

    pub fn with_title(&self, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..self.clone()
        }
    }

    pub fn with_contents(&self, contents: Vec<ContentBlock>) -> Self {
        Self {
            contents,
            ..self.clone()
        }
    }

    pub fn append_content(&self, block: ContentBlock) -> Self {
        let mut next = self.clone();
        next.contents.push(block);
        next
    }

    /// Replaces the block at `index`.
    pub fn replace_content_at(&self, index: usize, block: ContentBlock) -> Result<Self, NoteError> {
        self.check_index(index)?;
        let mut next = self.clone();
        next.contents[index] = block;
        Ok(next)
    }

    pub fn remove_content_at(&self, index: usize) -> Result<Self, NoteError> {
        self.check_index(index)?;
        let mut next = self.clone();
        next.contents.remove(index);
        Ok(next)
    }

    /// Swaps the block at `from` with its neighbour at `to`.
    ///
    /// # Errors
    /// - `IndexOutOfRange` when either index is outside `contents`.
    /// - `NonAdjacentMove` when `from` and `to` are not neighbours.
    pub fn move_content(&self, from: usize, to: usize) -> Result<Self, NoteError> {
        self.check_index(from)?;
        self.check_index(to)?;
        if from.abs_diff(to) != 1 {
            return Err(NoteError::NonAdjacentMove { from, to });
        }
        let mut next = self.clone();
        next.contents.swap(from, to);
        Ok(next)
    }

    fn check_index(&self, index: usize) -> Result<(), NoteError> {
        if index < self.contents.len() {
            Ok(())
        } else {
            Err(NoteError::IndexOutOfRange {
                index,
                len: self.contents.len(),
            })
        }
    }
}
