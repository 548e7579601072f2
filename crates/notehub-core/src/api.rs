use crate::{CreateNote, Error, Note, NoteQuery, NotesPage};

/// Remote notes API abstraction.
///
/// Uses `async_trait` with `?Send`: the client runs on a single-threaded
/// event loop and the query cache shares state through `Rc`.
#[async_trait::async_trait(?Send)]
pub trait NotesApi {
    /// Fetch one page of notes, optionally filtered by a search term.
    async fn list_notes(&self, query: NoteQuery) -> Result<NotesPage, Error>;

    /// Create a note and return it with its server-assigned ID.
    async fn create_note(&self, note: CreateNote) -> Result<Note, Error>;

    /// Delete a note by ID. Fails with `NotFound` if it does not exist.
    async fn delete_note(&self, id: &str) -> Result<(), Error>;
}
