//! notehub CLI - terminal client for the NoteHub notes API.

mod browse;
mod render;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use notehub_core::{
    CreateNote, Error, NoteService, NotesView, PageKey, QueryClient, QueryOptions, Tag,
};
use notehub_http::{HttpNotesApi, DEFAULT_BASE_URL};
use std::io::{self, BufRead, Read, Write};
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tracing::{debug, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "notehub", about = "Terminal client for the NoteHub notes API", version)]
struct Cli {
    /// Base URL of the notes API
    #[arg(long, global = true, env = "NOTEHUB_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,
    /// Bearer token sent with every request
    #[arg(long, global = true, env = "NOTEHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,
    /// Notes per page
    #[arg(long, global = true, default_value_t = notehub_core::DEFAULT_PER_PAGE)]
    per_page: u32,
    /// Request timeout in seconds
    #[arg(long, global = true, default_value_t = 15)]
    timeout_secs: u64,
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List one page of notes
    Ls {
        /// Page number, starting at 1
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Only show notes matching this text
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Create a note
    Add {
        /// Note title
        #[arg(long)]
        title: String,
        /// One of Todo, Work, Personal, Meeting, Shopping
        #[arg(long, value_parser = parse_tag)]
        tag: Tag,
        /// Note content (reads from stdin if not provided)
        #[arg(long)]
        content: Option<String>,
    },
    /// Delete one or more notes
    Rm {
        /// Comma-separated note IDs
        ids: String,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// List the tags a note can have
    Tags,
    /// Browse notes interactively
    Browse,
}

fn parse_tag(s: &str) -> Result<Tag, String> {
    s.parse::<Tag>().map_err(|e| e.to_string())
}

fn parse_ids(ids: &str) -> Vec<String> {
    ids.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read from stdin")?;
    Ok(buf)
}

fn is_stdin_tty() -> bool {
    atty::is(atty::Stream::Stdin)
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush().context("Failed to write prompt")?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read answer")?;
    Ok(render::is_yes(&answer))
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "notehub={0},notehub_core={0},notehub_http={0}",
            level
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Commands::Tags = cli.command {
        for tag in Tag::ALL {
            println!("{}", tag);
        }
        return Ok(());
    }

    // A missing token only fails once a request is made.
    let api = HttpNotesApi::with_timeout(
        &cli.base_url,
        cli.token.clone(),
        Duration::from_secs(cli.timeout_secs),
    )
    .context("Failed to set up API client")?;
    if !api.has_token() {
        warn!("NOTEHUB_TOKEN is not set; requests will be rejected");
    }
    debug!(base_url = %api.base_url(), "using notes API");

    let options = QueryOptions {
        per_page: cli.per_page,
        ..QueryOptions::default()
    };
    let client = QueryClient::with_options(NoteService::new(api), options);

    match cli.command {
        Commands::Tags => unreachable!(),

        Commands::Ls { page, search } => {
            let key = PageKey::new(page, search.trim());
            let result = client
                .query(&key)
                .await
                .context("Failed to list notes")?;

            if result.notes.is_empty() {
                let empty = if key.search().is_empty() {
                    notehub_core::EmptyState::NoNotes
                } else {
                    notehub_core::EmptyState::NoResults
                };
                println!("{}", empty.message());
            }
            for note in &result.notes {
                println!("{}", render::note_line(note));
            }
            if result.total_pages > 1 {
                println!("[Page {}/{}]", key.page(), result.total_pages);
            }
        }

        Commands::Add {
            title,
            tag,
            content,
        } => {
            let content = match content {
                Some(c) => c,
                None if is_stdin_tty() => String::new(),
                None => read_stdin()?,
            };
            let note = client
                .service()
                .create_note(CreateNote {
                    title,
                    content,
                    tag,
                })
                .await
                .context("Failed to create note")?;
            println!("Added note {}", note.id);
        }

        Commands::Rm { ids, yes } => {
            let ids = parse_ids(&ids);
            if ids.is_empty() {
                bail!("No note IDs provided");
            }
            if !yes && !is_stdin_tty() {
                bail!("Refusing to delete without --yes when stdin is not a terminal");
            }

            let mut not_found = Vec::new();
            for id in &ids {
                if !yes && !confirm(&format!("Delete note {}?", id))? {
                    println!("Skipped note {}", id);
                    continue;
                }
                match client.service().delete_note(id).await {
                    Ok(()) => println!("Deleted note {}", id),
                    Err(Error::NotFound(_)) => not_found.push(id.clone()),
                    Err(e) => {
                        return Err(e).context(format!("Failed to delete note {}", id));
                    }
                }
            }

            if !not_found.is_empty() {
                for id in &not_found {
                    eprintln!("Note {} not found", id);
                }
                std::process::exit(1);
            }
        }

        Commands::Browse => {
            let mut view = NotesView::new(client);
            let input = tokio::io::BufReader::new(tokio::io::stdin()).lines();
            browse::run(&mut view, input).await?;
        }
    }

    Ok(())
}
