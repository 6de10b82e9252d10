//! QuickNote command line entry point.
//!
//! # Responsibility
//! - Resolve configuration, start logging and open the note store.
//! - Drive a `NoteSession` for simple list and add commands.
//!
//! # Usage
//! - `quicknote_cli [list] [filter]` prints notes, optionally filtered.
//! - `quicknote_cli add <title>` creates and commits a note.
//! - `quicknote_cli version` prints the core version.

use chrono::Local;
use log::info;
use quicknote_core::db::open_db;
use quicknote_core::{
    core_version, format_absolute_date, format_amount, format_key_combination, init_logging,
    link_open_target, project_notes, ContentBlock, CoreConfig, NoteFilter, NoteSession,
    RelativeDay, SqliteNoteRepository,
};
use std::error::Error;
use std::process::ExitCode;

type CliResult<T> = Result<T, Box<dyn Error>>;

enum Command {
    List { filter: Option<String> },
    Add { title: String },
    Version,
}

fn main() -> ExitCode {
    match run(std::env::args().skip(1).collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Vec<String>) -> CliResult<()> {
    let command = parse_command(args)?;
    if let Command::Version = command {
        println!("quicknote_core version={}", core_version());
        return Ok(());
    }

    let config = CoreConfig::from_env()?;
    init_logging(config.log_level, &config.log_dir)?;
    info!(
        "event=cli_start module=cli status=ok db_path={}",
        config.db_path.display()
    );

    let repo = SqliteNoteRepository::try_new(open_db(&config.db_path)?)?;
    let mut session = NoteSession::load(repo)?;
    for failure in session.load_failures() {
        eprintln!("skipped unreadable note {}: {}", failure.id, failure.message);
    }

    match command {
        Command::List { filter } => print_notes(&session, filter),
        Command::Add { title } => {
            let index = session.add_note()?;
            session.set_title(index, title)?;
            session.commit(index)?;
            let id = session.note(index)?.note.id;
            println!("added note {}", id.map_or_else(|| "?".to_string(), |id| id.to_string()));
            Ok(())
        }
        Command::Version => Ok(()),
    }
}

fn parse_command(args: Vec<String>) -> CliResult<Command> {
    let mut args = args.into_iter();
    match args.next().as_deref() {
        None => Ok(Command::List { filter: None }),
        Some("list") => Ok(Command::List {
            filter: args.next(),
        }),
        Some("add") => {
            let title = args.collect::<Vec<_>>().join(" ");
            if title.trim().is_empty() {
                return Err("usage: quicknote_cli add <title>".into());
            }
            Ok(Command::Add { title })
        }
        Some("version") => Ok(Command::Version),
        Some(other) => Err(format!("unknown command `{other}`; expected list|add|version").into()),
    }
}

fn print_notes(
    session: &NoteSession<SqliteNoteRepository>,
    filter: Option<String>,
) -> CliResult<()> {
    let filter = NoteFilter {
        text: filter,
        ..NoteFilter::default()
    };
    let today = Local::now().date_naive();
    let items = project_notes(session.notes(), &filter);
    if items.is_empty() {
        println!("no notes");
        return Ok(());
    }

    for item in items {
        let note = &session.note(item.index)?.note;
        let id = item.id.map_or_else(|| "-".to_string(), |id| id.to_string());
        let title = if note.title.is_empty() { "(untitled)" } else { note.title.as_str() };
        println!("[{id}] {title}");
        for block in &note.contents {
            println!("    {}", describe_block(block, today));
        }
    }
    Ok(())
}

fn describe_block(block: &ContentBlock, today: chrono::NaiveDate) -> String {
    match block {
        ContentBlock::Text { body } => body.replace('\n', " "),
        ContentBlock::Money { amount } => format_amount(*amount),
        ContentBlock::Date { value } => format!(
            "{} ({})",
            RelativeDay::classify(today, *value),
            format_absolute_date(*value)
        ),
        ContentBlock::Link { url } => link_open_target(url),
        ContentBlock::KeyCombination { keys } => format_key_combination(keys),
    }
}
