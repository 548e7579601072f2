//! notehub core library - shared types, the notes API trait, the query
//! cache and the browsing session state.
//!
//! This crate does no network I/O; an implementation of [`NotesApi`] is
//! plugged in by the caller.

mod api;
mod error;
mod note;
mod service;

pub mod debounce;
pub mod query;
pub mod retry;
pub mod view;

#[cfg(test)]
mod testing;

pub use api::NotesApi;
pub use error::Error;
pub use note::{
    CreateNote, Note, NoteQuery, NotesPage, PageKey, Tag, CONTENT_MAX_LEN, DEFAULT_PER_PAGE,
    NOTES_NAMESPACE, TITLE_MAX_LEN, TITLE_MIN_LEN,
};
pub use query::{QueryClient, QueryOptions};
pub use retry::RetryPolicy;
pub use service::{NoteService, MAX_PER_PAGE};
pub use view::{Body, EmptyState, Loaded, NotesView, Pagination, Screen, ViewState};
