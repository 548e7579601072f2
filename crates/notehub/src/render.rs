//! Plain-text rendering of notes and session screens.

use notehub_core::{Body, Note, Screen, ViewState};

const PREVIEW_LEN: usize = 60;

/// Single-line content preview: newlines become spaces, long text is cut.
pub fn preview(content: &str, max_len: usize) -> String {
    let normalized: String = content
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    let trimmed = normalized.trim();

    if trimmed.chars().count() > max_len {
        let cut: String = trimmed.chars().take(max_len).collect();
        format!("{}...", cut.trim_end())
    } else {
        trimmed.to_string()
    }
}

pub fn note_line(note: &Note) -> String {
    let content = preview(&note.content, PREVIEW_LEN);
    if content.is_empty() {
        format!("{}: {} [{}]", note.id, note.title, note.tag)
    } else {
        format!("{}: {} [{}] -- {}", note.id, note.title, note.tag, content)
    }
}

pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Lines for one screen of the browse session.
pub fn screen_lines(screen: &Screen<'_>, state: &ViewState) -> Vec<String> {
    let (body, pagination, modal_open, refreshing) = match screen {
        Screen::Error => return vec!["Error loading notes. Please try again later.".to_string()],
        Screen::Ready {
            body,
            pagination,
            modal_open,
            refreshing,
        } => (body, pagination, *modal_open, *refreshing),
    };

    let mut lines = Vec::new();
    let mut header = String::new();
    if !state.raw_search.is_empty() {
        header.push_str(&format!("Search: {:?}", state.raw_search));
    }
    if let Some(p) = pagination {
        if !header.is_empty() {
            header.push_str("  ");
        }
        header.push_str(&format!("Page {}/{}", p.selected + 1, p.page_count));
    }
    if refreshing {
        if !header.is_empty() {
            header.push_str("  ");
        }
        header.push_str("(refreshing)");
    }
    if !header.is_empty() {
        lines.push(header);
    }

    match body {
        Body::Loading => lines.push("Loading notes...".to_string()),
        Body::Empty(empty) => lines.push(empty.message().to_string()),
        Body::Notes(notes) => lines.extend(notes.iter().map(note_line)),
    }

    if modal_open {
        lines.push("[Create note]".to_string());
    }
    lines
}
