//! Command-line interface for the Vellum journal.

mod prompt;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use log::debug;
use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use vellum_core::{Entry, Journal, VellumError};

/// Display format for entry timestamps, e.g. "Tue, 05 Aug 2025 09:14AM".
const TIME_FORMAT: &str = "%a, %d %b %Y %I:%M%p";

#[derive(Parser)]
#[command(name = "vellum", version, about = "An encrypted journal for your terminal")]
struct Cli {
    /// Path to the journal database (defaults to ~/.vellum/journal.db).
    #[arg(long, global = true)]
    path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the journal password.
    Init,
    /// Write a new entry, from the argument or stdin.
    Write { content: Option<String> },
    /// List all entries, newest first.
    List,
    /// Print a single entry.
    Show { id: u64 },
    /// Replace an entry's content, from the argument or stdin.
    Edit { id: u64, content: Option<String> },
    /// Delete an entry.
    Delete { id: u64 },
}

fn main() {
    env_logger::init();

    if let Err(err) = run() {
        match err.downcast_ref::<VellumError>() {
            Some(e) => eprintln!("{}", e.user_message()),
            None => eprintln!("{err:#}"),
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let path = resolve_db_path(cli.path)?;
    debug!("using journal at {}", path.display());

    let mut journal = Journal::open(&path)?;
    let result = dispatch(&mut journal, cli.command);
    let closed = journal.close();
    result?;
    closed?;
    Ok(())
}

fn dispatch(journal: &mut Journal, command: Command) -> Result<()> {
    match command {
        Command::Init => init(journal),
        Command::Write { content } => {
            unlock(journal)?;
            let content = content_or_stdin(content)?;
            let entry = journal.create_entry(&content)?;
            println!("Created entry #{}", entry.id);
            Ok(())
        }
        Command::List => {
            unlock(journal)?;
            let entries = journal.list_entries()?;
            if entries.is_empty() {
                println!("No entries yet — `vellum write` to add one.");
                return Ok(());
            }
            for entry in &entries {
                println!("{}", summary_line(entry));
            }
            Ok(())
        }
        Command::Show { id } => {
            unlock(journal)?;
            let entry = journal.get_entry(id)?;
            print_entry(&entry);
            Ok(())
        }
        Command::Edit { id, content } => {
            unlock(journal)?;
            let content = content_or_stdin(content)?;
            let entry = journal.edit_entry(id, &content)?;
            println!("Updated entry #{}", entry.id);
            Ok(())
        }
        Command::Delete { id } => {
            unlock(journal)?;
            journal.delete_entry(id)?;
            println!("Deleted entry #{id}");
            Ok(())
        }
    }
}

/// Creates the journal password. Refuses if one already exists.
fn init(journal: &mut Journal) -> Result<()> {
    if journal.is_initialized()? {
        bail!("this journal already has a password");
    }

    let password = prompt::new_password()?;
    journal.create_password(&password)?;
    journal.auth(&password)?;
    println!("Journal initialized.");
    Ok(())
}

/// Prompts for the password and authenticates the journal.
fn unlock(journal: &mut Journal) -> Result<()> {
    if !journal.is_initialized()? {
        bail!("this journal has no password yet — run `vellum init` first");
    }

    let password = prompt::password()?;
    journal.auth(&password)?;
    Ok(())
}

/// Uses the argument if given, otherwise reads the entry text from stdin.
fn content_or_stdin(arg: Option<String>) -> Result<String> {
    if let Some(content) = arg {
        return Ok(content);
    }

    if std::io::stdin().is_terminal() {
        eprintln!("Type your entry, then press ctrl-d:");
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("failed to read entry from stdin")?;

    let content = buf.trim_end_matches('\n').to_string();
    if content.is_empty() {
        bail!("refusing to save an empty entry");
    }
    Ok(content)
}

fn resolve_db_path(flag: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path);
    }
    let base = directories::BaseDirs::new().context("could not determine the home directory")?;
    Ok(base.home_dir().join(".vellum").join("journal.db"))
}

/// One-line listing form: id, creation time, first line of content.
fn summary_line(entry: &Entry) -> String {
    let first_line = entry.content.lines().next().unwrap_or("");
    let preview: String = first_line.chars().take(60).collect();
    let ellipsis = if preview.len() < first_line.len() || entry.content.lines().count() > 1 {
        "…"
    } else {
        ""
    };
    format!(
        "#{:<4} {}  {}{}",
        entry.id,
        entry
            .created_at
            .with_timezone(&Local)
            .format(TIME_FORMAT),
        preview,
        ellipsis
    )
}

fn print_entry(entry: &Entry) {
    println!("Entry #{}", entry.id);
    println!(
        "Created: {}",
        entry.created_at.with_timezone(&Local).format(TIME_FORMAT)
    );
    if entry.updated_at != entry.created_at {
        println!(
            "Updated: {}",
            entry.updated_at.with_timezone(&Local).format(TIME_FORMAT)
        );
    }
    println!();
    println!("{}", entry.content);
}
