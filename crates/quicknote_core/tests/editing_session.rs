use chrono::NaiveDate;
use quicknote_core::db::{open_db_in_memory, DbError};
use quicknote_core::{
    ContentBlock, ContentType, Key, LoadReport, MoneyAdjustment, Note, NoteError, NoteRepository,
    NoteSession, RepoError, RepoResult, SessionError, SqliteNoteRepository,
};
use std::cell::{Cell, RefCell};

/// Sqlite repository that records calls and fails on demand.
struct FlakyRepository {
    inner: SqliteNoteRepository,
    fail_writes: Cell<bool>,
    fail_delete_titles: RefCell<Vec<String>>,
    inserted: RefCell<Vec<Note>>,
    restored: RefCell<Vec<Note>>,
    updated: RefCell<Vec<Note>>,
    deleted: RefCell<Vec<Note>>,
}

impl FlakyRepository {
    fn new() -> Self {
        let conn = open_db_in_memory().unwrap();
        Self {
            inner: SqliteNoteRepository::try_new(conn).unwrap(),
            fail_writes: Cell::new(false),
            fail_delete_titles: RefCell::new(Vec::new()),
            inserted: RefCell::new(Vec::new()),
            restored: RefCell::new(Vec::new()),
            updated: RefCell::new(Vec::new()),
            deleted: RefCell::new(Vec::new()),
        }
    }

    fn store_error() -> RepoError {
        RepoError::Db(DbError::Sqlite(rusqlite::Error::InvalidQuery))
    }

    fn stored(&self) -> Vec<Note> {
        self.inner.get_all().unwrap().notes
    }
}

impl NoteRepository for FlakyRepository {
    fn get_all(&self) -> RepoResult<LoadReport> {
        self.inner.get_all()
    }

    fn insert(&self, note: &Note) -> RepoResult<Note> {
        if self.fail_writes.get() {
            return Err(Self::store_error());
        }
        self.inserted.borrow_mut().push(note.clone());
        self.inner.insert(note)
    }

    fn restore(&self, note: &Note) -> RepoResult<Note> {
        if self.fail_writes.get() {
            return Err(Self::store_error());
        }
        self.restored.borrow_mut().push(note.clone());
        self.inner.restore(note)
    }

    fn update(&self, note: &Note) -> RepoResult<()> {
        if self.fail_writes.get() {
            return Err(Self::store_error());
        }
        self.updated.borrow_mut().push(note.clone());
        self.inner.update(note)
    }

    fn delete(&self, note: &Note) -> RepoResult<()> {
        if self.fail_writes.get() || self.fail_delete_titles.borrow().contains(&note.title) {
            return Err(Self::store_error());
        }
        self.deleted.borrow_mut().push(note.clone());
        self.inner.delete(note)
    }
}

fn fixed_today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

fn session_with(titles: &[&str]) -> NoteSession<FlakyRepository> {
    let repo = FlakyRepository::new();
    for title in titles {
        repo.inner.insert(&Note::new(*title, Vec::new())).unwrap();
    }
    NoteSession::load(repo).unwrap().with_today(fixed_today)
}

#[test]
fn add_edit_commit_inserts_once_and_assigns_id() {
    let mut session = session_with(&[]);

    let index = session.add_note().unwrap();
    assert!(session.notes()[index].is_editing);
    assert_eq!(session.notes()[index].note.id, None);

    session.set_title(index, "Shopping").unwrap();
    let hint = session.add_content_block(index, ContentType::Money).unwrap();
    assert_eq!(hint.content_index, 0);
    session
        .replace_content(index, 0, ContentBlock::Money { amount: 5000 })
        .unwrap();
    session.commit(index).unwrap();

    let inserted = session.repository().inserted.borrow().clone();
    assert_eq!(
        inserted,
        vec![Note::new("Shopping", vec![ContentBlock::Money { amount: 5000 }])]
    );
    let entry = &session.notes()[index];
    assert!(!entry.is_editing);
    assert!(entry.note.id.is_some());
    assert!(!session.can_undo());
    assert_eq!(session.repository().stored(), vec![entry.note.clone()]);
}

#[test]
fn undo_restores_previous_value_once() {
    let mut session = session_with(&["A"]);
    let original = session.notes()[0].note.clone();

    session.start_edit(0).unwrap();
    session.set_title(0, "B").unwrap();
    assert_eq!(session.notes()[0].note.title, "B");

    assert!(session.undo(0).unwrap());
    assert_eq!(session.notes()[0].note, original);
    assert!(session.undo_buffer().is_empty());
    assert!(session.notes()[0].is_editing);

    assert!(!session.undo(0).unwrap());
    assert_eq!(session.notes()[0].note, original);
}

#[test]
fn undo_holds_only_the_latest_pre_mutation_value() {
    let mut session = session_with(&["A"]);
    session.start_edit(0).unwrap();
    session.set_title(0, "B").unwrap();
    session.set_title(0, "C").unwrap();

    assert!(session.undo(0).unwrap());
    assert_eq!(session.notes()[0].note.title, "B");
    assert!(!session.undo(0).unwrap());
    assert_eq!(session.notes()[0].note.title, "B");
}

#[test]
fn mutate_then_undo_round_trips_contents_order() {
    let mut session = session_with(&[]);
    let index = session.add_note().unwrap();
    session.add_content_block(index, ContentType::Text).unwrap();
    session.add_content_block(index, ContentType::Link).unwrap();
    let before = session.notes()[index].note.clone();

    session.move_content(index, 0, 1).unwrap();
    assert_eq!(
        session.notes()[index].note.contents[0].content_type(),
        ContentType::Link
    );
    session.undo(index).unwrap();
    assert_eq!(session.notes()[index].note, before);
}

#[test]
fn mutate_rejects_identity_change_and_non_editing_notes() {
    let mut session = session_with(&["A"]);
    let note = session.notes()[0].note.clone();

    let err = session.mutate(0, note.with_title("x")).unwrap_err();
    assert!(matches!(err, SessionError::NotEditing(0)));

    session.start_edit(0).unwrap();
    let err = session.mutate(0, note.without_id()).unwrap_err();
    assert!(matches!(err, SessionError::IdentityChanged { .. }));
    assert_eq!(session.notes()[0].note, note);
}

#[test]
fn content_index_errors_leave_note_unchanged() {
    let mut session = session_with(&["A"]);
    session.start_edit(0).unwrap();
    session.add_content_block(0, ContentType::Text).unwrap();
    let before = session.notes()[0].note.clone();

    let err = session.remove_content(0, 3).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Note(NoteError::IndexOutOfRange { index: 3, len: 1 })
    ));
    assert!(!session.move_content_up(0, 0).unwrap());
    assert!(!session.move_content_down(0, 0).unwrap());
    assert_eq!(session.notes()[0].note, before);
}

#[test]
fn add_content_block_uses_defaults_and_sets_focus_hint() {
    let mut session = session_with(&[]);
    let index = session.add_note().unwrap();
    for kind in ContentType::ALL {
        session.add_content_block(index, kind).unwrap();
    }
    let contents = &session.notes()[index].note.contents;
    assert_eq!(
        contents,
        &vec![
            ContentBlock::Text {
                body: String::new()
            },
            ContentBlock::Money { amount: 0 },
            ContentBlock::Date {
                value: fixed_today()
            },
            ContentBlock::Link { url: String::new() },
            ContentBlock::KeyCombination { keys: Vec::new() },
        ]
    );
    let hint = session.take_focus_hint().unwrap();
    assert_eq!((hint.note_index, hint.content_index), (index, 4));
    assert!(session.focus_hint().is_none());
}

#[test]
fn focus_hint_is_dropped_by_later_mutations() {
    let mut session = session_with(&[]);
    let index = session.add_note().unwrap();

    session.add_content_block(index, ContentType::Text).unwrap();
    session.undo(index).unwrap();
    assert!(session.notes()[index].note.contents.is_empty());
    assert!(session.focus_hint().is_none());

    session.add_content_block(index, ContentType::Text).unwrap();
    session.remove_content(index, 0).unwrap();
    assert!(session.focus_hint().is_none());

    session.add_content_block(index, ContentType::Text).unwrap();
    session.add_content_block(index, ContentType::Money).unwrap();
    session.move_content_up(index, 1).unwrap();
    assert!(session.focus_hint().is_none());
}

#[test]
fn add_content_block_publishes_one_snapshot_with_hint() {
    let mut session = session_with(&[]);
    let index = session.add_note().unwrap();
    let snapshots = session.subscribe();
    snapshots.try_recv().unwrap();

    let hint = session.add_content_block(index, ContentType::Date).unwrap();
    let received: Vec<_> = snapshots.try_iter().collect();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].focus_hint, Some(hint));
    assert_eq!(received[0].notes[index].note.contents.len(), 1);
}

#[test]
fn adjust_money_is_integer_and_undoable() {
    let mut session = session_with(&[]);
    let index = session.add_note().unwrap();
    session.add_content_block(index, ContentType::Money).unwrap();
    session
        .adjust_money(index, 0, MoneyAdjustment::Subtract(1500))
        .unwrap();
    assert_eq!(
        session.notes()[index].note.contents[0],
        ContentBlock::Money { amount: -1500 }
    );

    session
        .replace_content(index, 0, ContentBlock::Money { amount: i64::MAX })
        .unwrap();
    let err = session
        .adjust_money(index, 0, MoneyAdjustment::Add(1))
        .unwrap_err();
    assert!(matches!(err, SessionError::Content(_)));

    session.undo(index).unwrap();
    assert_eq!(
        session.notes()[index].note.contents[0],
        ContentBlock::Money { amount: -1500 }
    );
}

#[test]
fn cancel_removes_unsaved_note() {
    let mut session = session_with(&["A"]);
    let index = session.add_note().unwrap();
    session.set_title(index, "draft").unwrap();

    session.cancel_edit(index).unwrap();
    assert_eq!(session.notes().len(), 1);
    assert!(session.repository().inserted.borrow().is_empty());
    assert!(!session.can_undo());
}

#[test]
fn cancel_reverts_persisted_note_without_touching_store() {
    let mut session = session_with(&["A"]);
    let stored_before = session.repository().stored();

    session.start_edit(0).unwrap();
    session.set_title(0, "changed").unwrap();
    session.add_content_block(0, ContentType::Text).unwrap();
    session.cancel_edit(0).unwrap();

    assert_eq!(session.repository().stored(), stored_before);
    assert_eq!(session.notes()[0].note, stored_before[0]);
    assert!(!session.notes()[0].is_editing);
    assert!(session.repository().updated.borrow().is_empty());
}

#[test]
fn failed_commit_keeps_edits_and_editing_state() {
    let mut session = session_with(&["A"]);
    session.start_edit(0).unwrap();
    session.set_title(0, "B").unwrap();

    session.repository().fail_writes.set(true);
    let err = session.commit(0).unwrap_err();
    assert!(matches!(err, SessionError::Repo(RepoError::Db(_))));
    assert!(session.notes()[0].is_editing);
    assert_eq!(session.notes()[0].note.title, "B");
    assert!(session.can_undo());

    session.repository().fail_writes.set(false);
    session.commit(0).unwrap();
    assert_eq!(session.repository().stored()[0].title, "B");
    assert_eq!(session.repository().updated.borrow().len(), 1);
}

#[test]
fn starting_another_edit_commits_the_current_one() {
    let mut session = session_with(&["A", "B"]);
    session.start_edit(0).unwrap();
    session.set_title(0, "A2").unwrap();

    session.start_edit(1).unwrap();
    assert!(!session.notes()[0].is_editing);
    assert!(session.notes()[1].is_editing);
    assert_eq!(session.editing_index(), Some(1));
    assert_eq!(session.repository().stored()[0].title, "A2");
}

#[test]
fn start_edit_is_blocked_when_current_commit_fails() {
    let mut session = session_with(&["A", "B"]);
    session.start_edit(0).unwrap();
    session.set_title(0, "A2").unwrap();

    session.repository().fail_writes.set(true);
    assert!(session.start_edit(1).is_err());
    assert_eq!(session.editing_index(), Some(0));
    assert_eq!(session.notes()[0].note.title, "A2");
}

#[test]
fn delete_edit_removes_from_store_and_list() {
    let mut session = session_with(&["A", "B"]);
    session.start_edit(0).unwrap();
    session.delete_edit(0).unwrap();

    assert_eq!(session.notes().len(), 1);
    assert_eq!(session.notes()[0].note.title, "B");
    assert_eq!(session.repository().stored().len(), 1);
    assert!(!session.can_undo());

    let index = session.add_note().unwrap();
    session.delete_edit(index).unwrap();
    assert!(session.repository().deleted.borrow().len() == 1);
}

#[test]
fn failed_delete_edit_keeps_note() {
    let mut session = session_with(&["A"]);
    session.start_edit(0).unwrap();
    session.repository().fail_writes.set(true);

    assert!(session.delete_edit(0).is_err());
    assert_eq!(session.notes().len(), 1);
    assert!(session.notes()[0].is_editing);
}

#[test]
fn selection_mode_excludes_editing() {
    let mut session = session_with(&["A"]);
    session.start_edit(0).unwrap();
    session.enter_selection_mode().unwrap();
    assert_eq!(session.editing_index(), None);

    assert!(matches!(
        session.start_edit(0),
        Err(SessionError::SelectionActive)
    ));
    assert!(matches!(
        session.add_note(),
        Err(SessionError::SelectionActive)
    ));

    session.exit_selection_mode();
    assert!(matches!(
        session.toggle_select(0, true),
        Err(SessionError::NotSelecting)
    ));
}

#[test]
fn toggle_and_select_all_maintain_aggregate() {
    let mut session = session_with(&["A", "B"]);
    session.enter_selection_mode().unwrap();
    assert!(!session.all_selected());

    session.toggle_select(0, true).unwrap();
    assert!(!session.all_selected());
    session.toggle_select(1, true).unwrap();
    assert!(session.all_selected());
    session.toggle_select(1, false).unwrap();
    assert!(!session.all_selected());

    session.select_all(true).unwrap();
    assert!(session.notes().iter().all(|entry| entry.is_selected));
    assert!(session.all_selected());

    session.exit_selection_mode();
    assert!(!session.is_selecting());
    assert!(session.notes().iter().all(|entry| !entry.is_selected));
}

#[test]
fn select_all_on_empty_list_reports_requested_state() {
    let mut session = session_with(&[]);
    session.enter_selection_mode().unwrap();
    assert!(!session.all_selected());

    session.select_all(false).unwrap();
    assert!(!session.all_selected());

    session.select_all(true).unwrap();
    assert!(session.all_selected());
    session.select_all(false).unwrap();
    assert!(!session.all_selected());
}

#[test]
fn deleting_every_note_clears_all_selected() {
    let mut session = session_with(&["A"]);
    session.enter_selection_mode().unwrap();
    session.select_all(true).unwrap();
    assert!(session.all_selected());

    session.delete_selected().unwrap();
    assert!(session.notes().is_empty());
    assert!(!session.all_selected());
}

#[test]
fn delete_selected_with_nothing_selected_is_noop() {
    let mut session = session_with(&["A", "B"]);
    session.enter_selection_mode().unwrap();
    let before = session.notes().to_vec();

    assert_eq!(session.delete_selected().unwrap(), 0);
    assert_eq!(session.notes(), before.as_slice());
    assert_eq!(session.undo_delete().unwrap(), 0);
    assert_eq!(session.repository().stored().len(), 2);
}

#[test]
fn delete_selected_then_undo_delete_restores_once() {
    let mut session = session_with(&["A", "B", "C"]);
    session.enter_selection_mode().unwrap();
    session.toggle_select(0, true).unwrap();
    session.toggle_select(2, true).unwrap();

    assert_eq!(session.delete_selected().unwrap(), 2);
    let titles: Vec<_> = session
        .notes()
        .iter()
        .map(|entry| entry.note.title.clone())
        .collect();
    assert_eq!(titles, vec!["B"]);
    assert_eq!(session.deleted_batch().len(), 2);
    assert_eq!(session.repository().stored().len(), 1);
    let deleted_ids: Vec<_> = session.deleted_batch().iter().map(|note| note.id).collect();

    assert_eq!(session.undo_delete().unwrap(), 2);
    assert!(session.deleted_batch().is_empty());
    let restored_ids: Vec<_> = session.notes()[1..].iter().map(|entry| entry.note.id).collect();
    assert_eq!(restored_ids, deleted_ids);
    assert!(session.repository().inserted.borrow().is_empty());
    assert_eq!(session.repository().restored.borrow().len(), 2);
    let mut stored: Vec<_> = session
        .repository()
        .stored()
        .into_iter()
        .map(|note| note.title)
        .collect();
    stored.sort();
    assert_eq!(stored, vec!["A", "B", "C"]);
    assert_eq!(session.notes().len(), 3);

    assert_eq!(session.undo_delete().unwrap(), 0);
    assert_eq!(session.repository().stored().len(), 3);
}

#[test]
fn new_batch_replaces_previous_batch() {
    let mut session = session_with(&["A", "B"]);
    session.enter_selection_mode().unwrap();
    session.toggle_select(0, true).unwrap();
    session.delete_selected().unwrap();
    session.toggle_select(0, true).unwrap();
    session.delete_selected().unwrap();

    assert_eq!(session.deleted_batch().len(), 1);
    assert_eq!(session.deleted_batch()[0].title, "B");
}

#[test]
fn partial_delete_failure_keeps_failed_note_selected() {
    let mut session = session_with(&["A", "B"]);
    session
        .repository()
        .fail_delete_titles
        .borrow_mut()
        .push("B".to_string());
    session.enter_selection_mode().unwrap();
    session.select_all(true).unwrap();

    let err = session.delete_selected().unwrap_err();
    match err {
        SessionError::BulkDelete {
            completed, failed, ..
        } => {
            assert_eq!(completed, 1);
            assert_eq!(failed, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(session.notes().len(), 1);
    assert_eq!(session.notes()[0].note.title, "B");
    assert!(session.notes()[0].is_selected);
    assert!(session.all_selected());
}

#[test]
fn failed_undo_delete_keeps_batch_for_retry() {
    let mut session = session_with(&["A"]);
    session.enter_selection_mode().unwrap();
    session.select_all(true).unwrap();
    session.delete_selected().unwrap();

    session.repository().fail_writes.set(true);
    assert!(session.undo_delete().is_err());
    assert_eq!(session.deleted_batch().len(), 1);

    session.repository().fail_writes.set(false);
    assert_eq!(session.undo_delete().unwrap(), 1);
    assert_eq!(session.notes()[0].note.title, "A");
}

#[test]
fn observers_receive_snapshot_per_transition() {
    let mut session = session_with(&["A"]);
    let snapshots = session.subscribe();

    let initial = snapshots.try_recv().unwrap();
    assert_eq!(initial.notes.len(), 1);

    session.start_edit(0).unwrap();
    session.set_title(0, "B").unwrap();
    session.commit(0).unwrap();

    let received: Vec<_> = snapshots.try_iter().collect();
    assert_eq!(received.len(), 3);
    assert!(received[0].notes[0].is_editing);
    assert!(received[1].can_undo);
    assert!(!received[2].notes[0].is_editing);
    assert_eq!(received[2].notes[0].note.title, "B");
}

#[test]
fn reload_is_refused_while_editing() {
    let mut session = session_with(&["A"]);
    session.start_edit(0).unwrap();
    assert!(matches!(
        session.reload(),
        Err(SessionError::EditInProgress(0))
    ));
    session.commit(0).unwrap();
    session.reload().unwrap();
    assert_eq!(session.notes().len(), 1);
}

#[test]
fn load_skips_malformed_records() {
    let repo = FlakyRepository::new();
    repo.inner.insert(&Note::new("ok", Vec::new())).unwrap();
    repo.inner
        .connection()
        .execute(
            "INSERT INTO notes (payload) VALUES (?1);",
            [r#"{"title":"bad","contents":[{"type":"hologram"}]}"#],
        )
        .unwrap();
    repo.inner
        .insert(&Note::new(
            "keys",
            vec![ContentBlock::KeyCombination {
                keys: vec![Key::label("Ctrl")],
            }],
        ))
        .unwrap();

    let session = NoteSession::load(repo).unwrap();
    assert_eq!(session.notes().len(), 2);
    assert_eq!(session.load_failures().len(), 1);
    assert_eq!(session.load_failures()[0].id, 2);
}

#[test]
fn dispatch_routes_intents() {
    use quicknote_core::{Intent, IntentOutcome};

    let mut session = session_with(&[]);
    let outcome = session.dispatch(Intent::AddNote).unwrap();
    assert_eq!(outcome, IntentOutcome::NoteAdded(0));

    session
        .dispatch(Intent::SetTitle {
            note: 0,
            title: "via intent".to_string(),
        })
        .unwrap();
    let outcome = session
        .dispatch(Intent::AddContent {
            note: 0,
            kind: ContentType::Link,
        })
        .unwrap();
    assert!(matches!(outcome, IntentOutcome::ContentAdded(hint) if hint.content_index == 0));
    assert_eq!(
        session.dispatch(Intent::Undo { note: 0 }).unwrap(),
        IntentOutcome::Applied(true)
    );
    session.dispatch(Intent::Commit { note: 0 }).unwrap();
    assert_eq!(session.repository().stored()[0].title, "via intent");
}
