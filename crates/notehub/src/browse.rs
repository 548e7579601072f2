//! Interactive browse session.
//!
//! Reads one command per line and redraws the list after every change.
//! Loads run alongside input, so commands keep working while a page is
//! fetched and the older page stays on screen until the new one arrives.
//! Search input is debounced: the list follows the typed term once no
//! further `/term` line has arrived for the debounce delay.

use anyhow::{Context, Result};
use futures_util::future::{FutureExt, LocalBoxFuture};
use futures_util::stream::{FuturesUnordered, StreamExt};
use notehub_core::{CreateNote, Loaded, NotesApi, NotesView, Tag};
use std::io::Write;
use tokio::io::{AsyncBufRead, Lines};
use tokio::time::Instant;

use crate::render;

const HELP: &str = "\
Commands:
  /TEXT   search (empty '/' clears)
  n, p    next / previous page
  g N     go to page N
  new     create a note
  rm ID   delete a note
  r       refresh
  q       quit";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Search(String),
    Next,
    Prev,
    Goto(u32),
    New,
    Delete(String),
    Refresh,
    Help,
    Quit,
    Unknown(String),
}

fn parse_command(line: &str) -> Command {
    if let Some(term) = line.trim_start().strip_prefix('/') {
        return Command::Search(term.trim_end().to_string());
    }

    let line = line.trim();
    let (word, arg) = match line.split_once(char::is_whitespace) {
        Some((w, a)) => (w, a.trim()),
        None => (line, ""),
    };
    match (word, arg) {
        ("n" | "next", "") => Command::Next,
        ("p" | "prev", "") => Command::Prev,
        ("g" | "goto", n) => match n.parse::<u32>() {
            Ok(n) if n >= 1 => Command::Goto(n),
            _ => Command::Unknown(line.to_string()),
        },
        ("new", "") => Command::New,
        ("rm", id) if !id.is_empty() => Command::Delete(id.to_string()),
        ("r" | "refresh", "") => Command::Refresh,
        ("?" | "h" | "help", "") => Command::Help,
        ("q" | "quit" | "exit", "") => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    }
}

fn draw<A: NotesApi + 'static>(view: &NotesView<A>) {
    println!();
    for line in render::screen_lines(&view.render(), view.state()) {
        println!("{}", line);
    }
}

fn prompt(text: &str) -> Result<()> {
    print!("{}", text);
    std::io::stdout().flush().context("Failed to write prompt")
}

async fn ask<R: AsyncBufRead + Unpin>(input: &mut Lines<R>, text: &str) -> Result<Option<String>> {
    prompt(text)?;
    input.next_line().await.context("Failed to read input")
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Read the create form. `None` means the user cancelled.
async fn read_form<R: AsyncBufRead + Unpin>(input: &mut Lines<R>) -> Result<Option<CreateNote>> {
    let title = match ask(input, "Title (blank to cancel): ").await? {
        Some(t) if !t.trim().is_empty() => t,
        _ => return Ok(None),
    };
    let content = ask(input, "Content: ").await?.unwrap_or_default();

    let tags: Vec<&str> = Tag::ALL.iter().map(|t| t.as_str()).collect();
    let tag = loop {
        let Some(answer) = ask(input, &format!("Tag ({}): ", tags.join("/"))).await? else {
            return Ok(None);
        };
        match answer.parse::<Tag>() {
            Ok(tag) => break tag,
            Err(e) => eprintln!("{}", e),
        }
    };

    Ok(Some(CreateNote {
        title,
        content,
        tag,
    }))
}

async fn create<A, R>(view: &mut NotesView<A>, input: &mut Lines<R>) -> Result<()>
where
    A: NotesApi + 'static,
    R: AsyncBufRead + Unpin,
{
    view.open_create();
    draw(view);

    // The form stays open until a submit succeeds or the user cancels.
    while view.state().modal_open {
        let Some(note) = read_form(input).await? else {
            view.cancel_create();
            println!("Cancelled");
            break;
        };
        match view.submit_create(note).await {
            Ok(note) => println!("Created note {}", note.id),
            Err(e) => eprintln!("Could not create note: {}", e),
        }
    }
    Ok(())
}

async fn delete<A, R>(view: &mut NotesView<A>, input: &mut Lines<R>, id: &str) -> Result<()>
where
    A: NotesApi + 'static,
    R: AsyncBufRead + Unpin,
{
    let answer = ask(input, &format!("Delete note {}? [y/N] ", id)).await?;
    let confirmed = answer.as_deref().is_some_and(render::is_yes);

    match view.delete_note(id, confirmed).await {
        Ok(true) => println!("Deleted note {}", id),
        Ok(false) => println!("Cancelled"),
        Err(e) => eprintln!("Could not delete note {}: {}", id, e),
    }
    Ok(())
}

/// Run a session on `input` until it ends or the user quits.
pub async fn run<A, R>(view: &mut NotesView<A>, mut input: Lines<R>) -> Result<()>
where
    A: NotesApi + 'static,
    R: AsyncBufRead + Unpin,
{
    let mut loads: FuturesUnordered<LocalBoxFuture<'static, Loaded>> = FuturesUnordered::new();

    println!("{}", HELP);
    loop {
        if view.needs_load() {
            loads.push(view.load().boxed_local());
            draw(view);
        }

        let deadline = view.search_deadline();
        tokio::select! {
            Some(loaded) = loads.next(), if !loads.is_empty() => {
                if view.apply(loaded) {
                    draw(view);
                }
            }
            _ = until(deadline) => {
                view.settle_search();
            }
            line = input.next_line() => {
                let Some(line) = line.context("Failed to read input")? else { break };
                match parse_command(&line) {
                    Command::Search(term) => view.input_search(term),
                    Command::Next => {
                        if !view.next_page() {
                            println!("Already on the last page");
                        }
                    }
                    Command::Prev => {
                        if !view.prev_page() {
                            println!("Already on the first page");
                        }
                    }
                    Command::Goto(n) => view.select_page(n - 1),
                    Command::Refresh => view.reload(),
                    Command::New => {
                        create(view, &mut input).await?;
                        if !view.needs_load() {
                            draw(view);
                        }
                    }
                    Command::Delete(id) => delete(view, &mut input, &id).await?,
                    Command::Help => println!("{}", HELP),
                    Command::Quit => break,
                    Command::Unknown(line) if line.is_empty() => {}
                    Command::Unknown(line) => println!("Unknown command: {} (? for help)", line),
                }
            }
        }
    }

    Ok(())
}
