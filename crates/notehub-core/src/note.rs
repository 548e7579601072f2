use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Namespace shared by every notes list cache key.
pub const NOTES_NAMESPACE: &str = "notes";

/// Notes per page when the caller does not ask for a specific size.
pub const DEFAULT_PER_PAGE: u32 = 12;

pub const TITLE_MIN_LEN: usize = 3;
pub const TITLE_MAX_LEN: usize = 50;
pub const CONTENT_MAX_LEN: usize = 500;

/// The fixed set of tags the API accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    Todo,
    Work,
    Personal,
    Meeting,
    Shopping,
}

impl Tag {
    pub const ALL: [Tag; 5] = [
        Tag::Todo,
        Tag::Work,
        Tag::Personal,
        Tag::Meeting,
        Tag::Shopping,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Todo => "Todo",
            Tag::Work => "Work",
            Tag::Personal => "Personal",
            Tag::Meeting => "Meeting",
            Tag::Shopping => "Shopping",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Tag::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let allowed: Vec<&str> = Tag::ALL.iter().map(|t| t.as_str()).collect();
                Error::Validation(format!(
                    "unknown tag '{}' (expected one of {})",
                    wanted,
                    allowed.join(", ")
                ))
            })
    }
}

/// A note as returned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub tag: Tag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Parameters for creating a new note.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateNote {
    pub title: String,
    pub content: String,
    pub tag: Tag,
}

impl CreateNote {
    /// Check the payload against the limits the server enforces.
    pub fn validate(&self) -> Result<(), Error> {
        let title_len = self.title.trim().chars().count();
        if title_len < TITLE_MIN_LEN {
            return Err(Error::Validation(format!(
                "title must be at least {} characters",
                TITLE_MIN_LEN
            )));
        }
        if title_len > TITLE_MAX_LEN {
            return Err(Error::Validation(format!(
                "title must be at most {} characters",
                TITLE_MAX_LEN
            )));
        }
        if self.content.chars().count() > CONTENT_MAX_LEN {
            return Err(Error::Validation(format!(
                "content must be at most {} characters",
                CONTENT_MAX_LEN
            )));
        }
        Ok(())
    }
}

/// One page of the notes list.
#[derive(Debug, Clone, PartialEq)]
pub struct NotesPage {
    pub notes: Vec<Note>,
    pub total_pages: u32,
    /// Only present when the server reports it.
    pub current_page: Option<u32>,
    pub per_page: Option<u32>,
    pub total: Option<u64>,
}

/// Query parameters for listing notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteQuery {
    pub page: u32,
    pub per_page: u32,
    pub search: String,
}

impl Default for NoteQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            search: String::new(),
        }
    }
}

/// Cache identity of a notes list query.
///
/// Two keys are the same logical query only when page and search are
/// exactly equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    page: u32,
    search: String,
}

impl PageKey {
    /// Pages below 1 are clamped to 1.
    pub fn new(page: u32, search: impl Into<String>) -> Self {
        Self {
            page: page.max(1),
            search: search.into(),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn namespace(&self) -> &'static str {
        NOTES_NAMESPACE
    }

    /// Whether this key lives under `prefix`. An empty prefix matches all.
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        prefix.is_empty() || prefix == self.namespace()
    }

    pub fn to_query(&self, per_page: u32) -> NoteQuery {
        NoteQuery {
            page: self.page,
            per_page,
            search: self.search.clone(),
        }
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{:?}", self.namespace(), self.page, self.search)
    }
}
