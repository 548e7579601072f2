//! In-memory `NotesApi` used by the unit tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use crate::{CreateNote, Error, Note, NoteQuery, NotesApi, NotesPage, Tag};

#[derive(Default)]
struct State {
    notes: RefCell<Vec<Note>>,
    next_id: Cell<u64>,
    list_calls: RefCell<Vec<NoteQuery>>,
    list_failures: RefCell<VecDeque<Error>>,
    create_count: Cell<usize>,
    create_failure: RefCell<Option<Error>>,
    delete_calls: RefCell<Vec<String>>,
    latency: Cell<Option<Duration>>,
}

/// Cloning shares the same backing state, so a test can keep a handle
/// after moving one into the code under test.
#[derive(Clone, Default)]
pub struct FakeApi {
    state: Rc<State>,
}

pub fn note(id: &str, title: &str) -> Note {
    Note {
        id: id.to_string(),
        title: title.to_string(),
        content: format!("content of {}", title),
        tag: Tag::Todo,
        created_at: None,
        updated_at: None,
    }
}

impl FakeApi {
    pub fn with_notes(count: usize) -> Self {
        let api = Self::default();
        for i in 1..=count {
            api.push(note(&i.to_string(), &format!("Note {}", i)));
        }
        api
    }

    pub fn push(&self, note: Note) {
        self.state.notes.borrow_mut().push(note);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.state.latency.set(Some(latency));
    }

    /// Queue errors returned by the next list calls, in order.
    pub fn fail_list(&self, errors: impl IntoIterator<Item = Error>) {
        self.state.list_failures.borrow_mut().extend(errors);
    }

    pub fn fail_create(&self, error: Error) {
        *self.state.create_failure.borrow_mut() = Some(error);
    }

    pub fn list_calls(&self) -> Vec<NoteQuery> {
        self.state.list_calls.borrow().clone()
    }

    pub fn list_count(&self) -> usize {
        self.state.list_calls.borrow().len()
    }

    pub fn create_count(&self) -> usize {
        self.state.create_count.get()
    }

    pub fn delete_calls(&self) -> Vec<String> {
        self.state.delete_calls.borrow().clone()
    }

    async fn wait(&self) {
        if let Some(latency) = self.state.latency.get() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait::async_trait(?Send)]
impl NotesApi for FakeApi {
    async fn list_notes(&self, query: NoteQuery) -> Result<NotesPage, Error> {
        self.state.list_calls.borrow_mut().push(query.clone());
        self.wait().await;

        if let Some(error) = self.state.list_failures.borrow_mut().pop_front() {
            return Err(error);
        }

        let needle = query.search.to_lowercase();
        let matching: Vec<Note> = self
            .state
            .notes
            .borrow()
            .iter()
            .filter(|n| {
                needle.is_empty()
                    || n.title.to_lowercase().contains(&needle)
                    || n.content.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();

        let per_page = query.per_page.max(1) as usize;
        let total = matching.len();
        let total_pages = total.div_ceil(per_page) as u32;
        let notes = matching
            .into_iter()
            .skip((query.page.max(1) as usize - 1) * per_page)
            .take(per_page)
            .collect();

        Ok(NotesPage {
            notes,
            total_pages,
            current_page: Some(query.page),
            per_page: Some(query.per_page),
            total: Some(total as u64),
        })
    }

    async fn create_note(&self, note: CreateNote) -> Result<Note, Error> {
        self.wait().await;
        if let Some(error) = self.state.create_failure.borrow_mut().take() {
            return Err(error);
        }

        self.state.create_count.set(self.state.create_count.get() + 1);
        let id = self.state.next_id.get() + 1000;
        self.state.next_id.set(self.state.next_id.get() + 1);

        let created = Note {
            id: id.to_string(),
            title: note.title,
            content: note.content,
            tag: note.tag,
            created_at: None,
            updated_at: None,
        };
        self.state.notes.borrow_mut().insert(0, created.clone());
        Ok(created)
    }

    async fn delete_note(&self, id: &str) -> Result<(), Error> {
        self.state.delete_calls.borrow_mut().push(id.to_string());
        self.wait().await;

        let mut notes = self.state.notes.borrow_mut();
        let before = notes.len();
        notes.retain(|n| n.id != id);
        if notes.len() == before {
            return Err(Error::NotFound(format!("note {}", id)));
        }
        Ok(())
    }
}
