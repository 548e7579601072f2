use crate::{CreateNote, Error, Note, NoteQuery, NotesApi, NotesPage};

/// Largest page size the client will ask the server for.
pub const MAX_PER_PAGE: u32 = 100;

/// Business rules applied before anything reaches the remote API.
/// Generic over the API implementation.
pub struct NoteService<A: NotesApi> {
    api: A,
}

impl<A: NotesApi> NoteService<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// List one page of notes.
    pub async fn list_notes(&self, query: NoteQuery) -> Result<NotesPage, Error> {
        let query = NoteQuery {
            page: query.page.max(1),
            per_page: query.per_page.clamp(1, MAX_PER_PAGE),
            search: query.search.trim().to_string(),
        };
        self.api.list_notes(query).await
    }

    /// Create a new note.
    pub async fn create_note(&self, note: CreateNote) -> Result<Note, Error> {
        let note = CreateNote {
            title: note.title.trim().to_string(),
            content: note.content.trim_end().to_string(),
            tag: note.tag,
        };
        note.validate()?;

        self.api.create_note(note).await
    }

    /// Delete a note by ID.
    pub async fn delete_note(&self, id: &str) -> Result<(), Error> {
        let id = id.trim();
        if id.is_empty() {
            return Err(Error::Validation("note id cannot be empty".into()));
        }
        self.api.delete_note(id).await
    }
}
