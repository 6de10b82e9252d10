//! Presentation-facing read projections.
//!
//! # Responsibility
//! - Provide the static content-type catalogue for "add content" actions.
//! - Project a session snapshot into a filtered, sorted display list.
//!
//! # Invariants
//! - Projections never mutate session state.
//! - Every projected item carries the session index it came from, so intents
//!   built from it address the right note.

use crate::model::content::ContentType;
use crate::model::note::NoteId;
use crate::session::state::NoteSessionState;

/// Catalogue entry for one content block type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentTypeDescriptor {
    pub kind: ContentType,
    pub icon_ref: &'static str,
    pub label: &'static str,
}

const CONTENT_TYPE_CATALOGUE: [ContentTypeDescriptor; 5] = [
    ContentTypeDescriptor {
        kind: ContentType::Text,
        icon_ref: "note_type_text",
        label: "Text",
    },
    ContentTypeDescriptor {
        kind: ContentType::Money,
        icon_ref: "note_type_money",
        label: "Money",
    },
    ContentTypeDescriptor {
        kind: ContentType::Date,
        icon_ref: "note_type_datetime",
        label: "Date",
    },
    ContentTypeDescriptor {
        kind: ContentType::Link,
        icon_ref: "note_type_link",
        label: "Link",
    },
    ContentTypeDescriptor {
        kind: ContentType::KeyCombination,
        icon_ref: "note_type_key_comb",
        label: "Key combination",
    },
];

/// Returns the five content block types in display order.
pub fn content_type_catalogue() -> &'static [ContentTypeDescriptor] {
    &CONTENT_TYPE_CATALOGUE
}

/// Sort order for the projected list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NoteSort {
    /// Keep session order.
    #[default]
    Session,
    /// Case-insensitive title, ties in session order.
    TitleAsc,
    /// Unsaved notes first, then highest id first.
    NewestFirst,
}

/// List projection options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteFilter {
    /// Case-insensitive match against title, text bodies, link urls and keys.
    pub text: Option<String>,
    pub sort: NoteSort,
}

/// One row of the projected list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteListItem {
    /// Position in the session list.
    pub index: usize,
    pub id: Option<NoteId>,
    pub title: String,
    pub block_count: usize,
    pub is_editing: bool,
    pub is_selected: bool,
}

/// Projects session notes through `filter`.
///
/// The editing note is always kept so an active edit never disappears from
/// view while typing.
pub fn project_notes(notes: &[NoteSessionState], filter: &NoteFilter) -> Vec<NoteListItem> {
    let needle = filter
        .text
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_lowercase);

    let mut items: Vec<NoteListItem> = notes
        .iter()
        .enumerate()
        .filter(|(_, entry)| match needle.as_deref() {
            None => true,
            Some(needle) => entry.is_editing || matches_note(entry, needle),
        })
        .map(|(index, entry)| NoteListItem {
            index,
            id: entry.note.id,
            title: entry.note.title.clone(),
            block_count: entry.note.contents.len(),
            is_editing: entry.is_editing,
            is_selected: entry.is_selected,
        })
        .collect();

    match filter.sort {
        NoteSort::Session => {}
        NoteSort::TitleAsc => {
            items.sort_by_cached_key(|item| (item.title.to_lowercase(), item.index));
        }
        NoteSort::NewestFirst => {
            items.sort_by(|a, b| match (a.id, b.id) {
                (None, None) => a.index.cmp(&b.index),
                (None, Some(_)) => std::cmp::Ordering::Less,
                (Some(_), None) => std::cmp::Ordering::Greater,
                (Some(left), Some(right)) => right.cmp(&left),
            });
        }
    }

    items
}

fn matches_note(entry: &NoteSessionState, needle: &str) -> bool {
    entry.note.title.to_lowercase().contains(needle)
        || entry
            .note
            .contents
            .iter()
            .any(|block| block.matches_text(needle))
}
