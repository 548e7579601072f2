//! Session state of the notes browser and what it shows.
//!
//! `NotesView` owns the page number, the raw and debounced search term and
//! the create-form flag. It reads pages through the [`QueryClient`] and
//! keeps the last displayed page on screen while a new one loads.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::debounce::{Debouncer, DEFAULT_DEBOUNCE};
use crate::{CreateNote, Error, Note, NotesApi, NotesPage, PageKey, QueryClient, NOTES_NAMESPACE};

/// User-controlled state of one browsing session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    /// 1-based.
    pub page: u32,
    pub raw_search: String,
    pub debounced_search: String,
    pub modal_open: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            page: 1,
            raw_search: String::new(),
            debounced_search: String::new(),
            modal_open: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyState {
    NoResults,
    NoNotes,
}

impl EmptyState {
    pub fn message(&self) -> &'static str {
        match self {
            EmptyState::NoResults => "No notes found for your search.",
            EmptyState::NoNotes => "No notes yet. Create your first note!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page_count: u32,
    /// 0-based index of the selected page.
    pub selected: u32,
}

#[derive(Debug, PartialEq)]
pub enum Body<'a> {
    Loading,
    Empty(EmptyState),
    Notes(&'a [Note]),
}

/// What the session shows right now.
#[derive(Debug, PartialEq)]
pub enum Screen<'a> {
    /// The list could not be loaded. Nothing else is shown.
    Error,
    Ready {
        body: Body<'a>,
        pagination: Option<Pagination>,
        modal_open: bool,
        /// A fetch is running while older data is displayed.
        refreshing: bool,
    },
}

/// Result of a list fetch, tagged with the key it was issued for.
pub struct Loaded {
    pub key: PageKey,
    pub result: Result<NotesPage, Error>,
}

struct Displayed {
    key: PageKey,
    page: NotesPage,
}

pub struct NotesView<A: NotesApi + 'static> {
    client: QueryClient<A>,
    state: ViewState,
    search: Debouncer<String>,
    displayed: Option<Displayed>,
    pending: Option<PageKey>,
    /// Last key handed to `load`.
    requested: Option<PageKey>,
    /// Set by `reload`; the list must be loaded again even if the key is
    /// unchanged.
    dirty: bool,
    /// Failure of the most recent load, with the key it was for.
    error: Option<(PageKey, Error)>,
}

impl<A: NotesApi + 'static> NotesView<A> {
    pub fn new(client: QueryClient<A>) -> Self {
        Self::with_debounce(client, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(client: QueryClient<A>, delay: Duration) -> Self {
        Self {
            client,
            state: ViewState::default(),
            search: Debouncer::new(delay),
            displayed: None,
            pending: None,
            requested: None,
            dirty: false,
            error: None,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn client(&self) -> &QueryClient<A> {
        &self.client
    }

    /// Key of the query the session currently wants on screen.
    pub fn active_key(&self) -> PageKey {
        PageKey::new(self.state.page, self.state.debounced_search.clone())
    }

    /// Total pages of the displayed result, 0 before anything loaded.
    pub fn total_pages(&self) -> u32 {
        self.displayed.as_ref().map_or(0, |d| d.page.total_pages)
    }

    /// Error of the last load for the active key, if it failed.
    pub fn last_error(&self) -> Option<&Error> {
        match &self.error {
            Some((key, e)) if *key == self.active_key() => Some(e),
            _ => None,
        }
    }

    /// Record a keystroke. The search term used for queries follows after
    /// the debounce delay; see [`settle_search`](Self::settle_search).
    pub fn input_search(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.state.raw_search = text.clone();
        self.search.push(text, Instant::now());
    }

    pub fn search_deadline(&self) -> Option<Instant> {
        self.search.deadline()
    }

    /// Commit the typed search term if it has been quiet long enough.
    /// A changed term resets the page to 1. Returns whether the active key
    /// changed.
    pub fn settle_search(&mut self) -> bool {
        match self.search.poll(Instant::now()) {
            Some(term) => self.commit_search(term),
            None => false,
        }
    }

    /// Sleep until the pending search term is due, then commit it.
    pub async fn wait_for_search(&mut self) -> bool {
        if let Some(deadline) = self.search.deadline() {
            tokio::time::sleep_until(deadline).await;
        }
        self.settle_search()
    }

    fn commit_search(&mut self, term: String) -> bool {
        if term == self.state.debounced_search {
            return false;
        }
        debug!(search = %term, "search term committed");
        self.state.debounced_search = term;
        self.state.page = 1;
        true
    }

    /// Select a page by its 0-based index in the pagination control.
    pub fn select_page(&mut self, index: u32) {
        self.state.page = index.saturating_add(1);
    }

    /// Returns false when already on the last known page.
    pub fn next_page(&mut self) -> bool {
        if self.state.page >= self.total_pages() {
            return false;
        }
        self.state.page += 1;
        true
    }

    pub fn prev_page(&mut self) -> bool {
        if self.state.page <= 1 {
            return false;
        }
        self.state.page -= 1;
        true
    }

    /// Start loading the active key. The returned future may be awaited
    /// while the session keeps changing; pass its output to
    /// [`apply`](Self::apply).
    pub fn load(&mut self) -> impl std::future::Future<Output = Loaded> + 'static {
        let key = self.active_key();
        self.pending = Some(key.clone());
        self.requested = Some(key.clone());
        self.dirty = false;
        let client = self.client.clone();
        async move {
            let result = client.query(&key).await;
            Loaded { key, result }
        }
    }

    /// Apply a finished load. Results for a key that is no longer active
    /// stay in the cache but are not displayed. Returns whether the
    /// displayed state changed.
    pub fn apply(&mut self, loaded: Loaded) -> bool {
        if self.pending.as_ref() == Some(&loaded.key) {
            self.pending = None;
        }
        if loaded.key != self.active_key() {
            debug!(key = %loaded.key, "discarding superseded result");
            return false;
        }

        match loaded.result {
            Ok(page) => {
                self.error = None;
                self.displayed = Some(Displayed {
                    key: loaded.key,
                    page,
                });
            }
            Err(e) => {
                error!(key = %loaded.key, error = %e, "failed to load notes");
                self.error = Some((loaded.key, e));
            }
        }
        true
    }

    /// Load the active key and display it.
    pub async fn refresh(&mut self) {
        let loaded = self.load().await;
        self.apply(loaded);
    }

    /// Mark the notes cache stale and ask for the active key again.
    pub fn reload(&mut self) {
        self.client.invalidate(NOTES_NAMESPACE);
        self.dirty = true;
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether the active key changed since the last `load`, or a mutation
    /// made the list out of date.
    pub fn needs_load(&self) -> bool {
        self.dirty || self.requested.as_ref() != Some(&self.active_key())
    }

    pub fn open_create(&mut self) {
        self.state.modal_open = true;
    }

    pub fn cancel_create(&mut self) {
        self.state.modal_open = false;
    }

    /// Submit the create form. On success the form closes and the notes
    /// cache is invalidated; the list then needs a load. On failure the
    /// form stays open.
    pub async fn submit_create(&mut self, note: CreateNote) -> Result<Note, Error> {
        if !self.state.modal_open {
            return Err(Error::Validation("create form is not open".into()));
        }

        let result = self.client.service().create_note(note).await;
        match result {
            Ok(created) => {
                info!(id = %created.id, title = %created.title, "created note");
                self.state.modal_open = false;
                self.reload();
                Ok(created)
            }
            Err(e) => {
                error!(error = %e, "failed to create note");
                Err(e)
            }
        }
    }

    /// Delete a note the user confirmed. Unconfirmed requests do nothing
    /// and return `Ok(false)`. Success invalidates the notes cache.
    pub async fn delete_note(&mut self, id: &str, confirmed: bool) -> Result<bool, Error> {
        if !confirmed {
            return Ok(false);
        }

        let result = self.client.service().delete_note(id).await;
        match result {
            Ok(()) => {
                info!(%id, "deleted note");
                self.reload();
                Ok(true)
            }
            Err(e) => {
                error!(%id, error = %e, "failed to delete note");
                Err(e)
            }
        }
    }

    pub fn render(&self) -> Screen<'_> {
        if self.last_error().is_some() {
            return Screen::Error;
        }

        let loading = self.is_loading();
        let body = match &self.displayed {
            None if loading => Body::Loading,
            Some(d) if !d.page.notes.is_empty() => Body::Notes(&d.page.notes),
            _ if self.state.raw_search.is_empty() => Body::Empty(EmptyState::NoNotes),
            _ => Body::Empty(EmptyState::NoResults),
        };

        let pagination = match self.total_pages() {
            n if n > 1 => Some(Pagination {
                page_count: n,
                selected: self.state.page - 1,
            }),
            _ => None,
        };

        Screen::Ready {
            body,
            pagination,
            modal_open: self.state.modal_open,
            refreshing: loading && self.displayed.is_some(),
        }
    }

    /// Key of the data on screen, which may lag the active key while a
    /// load is running.
    pub fn displayed_key(&self) -> Option<&PageKey> {
        self.displayed.as_ref().map(|d| &d.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{note, FakeApi};
    use crate::{NoteService, Tag};

    fn view(api: &FakeApi) -> NotesView<FakeApi> {
        NotesView::new(QueryClient::new(NoteService::new(api.clone())))
    }

    fn shown_ids(view: &NotesView<FakeApi>) -> Vec<String> {
        match view.render() {
            Screen::Ready {
                body: Body::Notes(notes),
                ..
            } => notes.iter().map(|n| n.id.clone()).collect(),
            _ => Vec::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_render_is_loading() {
        let api = FakeApi::with_notes(3);
        let mut view = view(&api);

        let _pending = view.load();
        assert_eq!(
            view.render(),
            Screen::Ready {
                body: Body::Loading,
                pagination: None,
                modal_open: false,
                refreshing: false,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_debounces_and_resets_page() {
        let api = FakeApi::with_notes(30);
        let mut view = view(&api);
        view.refresh().await;
        view.select_page(2);
        assert_eq!(view.state().page, 3);

        view.input_search("Note");
        tokio::time::advance(Duration::from_millis(300)).await;
        view.input_search("Note 1");
        assert_eq!(view.state().raw_search, "Note 1");
        assert_eq!(view.state().debounced_search, "");

        tokio::time::advance(Duration::from_millis(300)).await;
        assert!(!view.settle_search());
        assert_eq!(view.state().page, 3);

        tokio::time::advance(Duration::from_millis(200)).await;
        assert!(view.settle_search());
        assert_eq!(view.state().debounced_search, "Note 1");
        assert_eq!(view.state().page, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_search_only_fires_latest() {
        let api = FakeApi::with_notes(3);
        let mut view = view(&api);

        view.input_search("m");
        view.input_search("me");
        view.input_search("meeting");
        assert!(view.wait_for_search().await);
        assert_eq!(view.state().debounced_search, "meeting");
        assert!(!view.settle_search());
    }

    #[tokio::test(start_paused = true)]
    async fn test_meeting_search_shows_three_pages() {
        let api = FakeApi::default();
        for i in 0..30 {
            api.push(note(&i.to_string(), &format!("meeting {}", i)));
        }
        api.push(note("other", "groceries"));
        let mut view = view(&api);

        view.input_search("meeting");
        view.wait_for_search().await;
        view.refresh().await;

        let last = api.list_calls().pop().unwrap();
        assert_eq!(last.search, "meeting");
        assert_eq!(last.page, 1);
        match view.render() {
            Screen::Ready { pagination, .. } => assert_eq!(
                pagination,
                Some(Pagination {
                    page_count: 3,
                    selected: 0
                })
            ),
            Screen::Error => panic!("unexpected error screen"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_page_hides_pagination() {
        let api = FakeApi::with_notes(4);
        let mut view = view(&api);
        view.refresh().await;

        match view.render() {
            Screen::Ready {
                body, pagination, ..
            } => {
                assert!(matches!(body, Body::Notes(notes) if notes.len() == 4));
                assert_eq!(pagination, None);
            }
            Screen::Error => panic!("unexpected error screen"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_states() {
        let api = FakeApi::default();
        let mut view = view(&api);
        view.refresh().await;
        assert!(matches!(
            view.render(),
            Screen::Ready {
                body: Body::Empty(EmptyState::NoNotes),
                ..
            }
        ));

        api.push(note("1", "groceries"));
        view.input_search("zzz");
        view.wait_for_search().await;
        view.refresh().await;
        assert!(matches!(
            view.render(),
            Screen::Ready {
                body: Body::Empty(EmptyState::NoResults),
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_previous_data_stays_visible_while_loading() {
        let api = FakeApi::with_notes(30);
        api.set_latency(Duration::from_millis(100));
        let mut view = view(&api);
        view.refresh().await;
        let first_page = shown_ids(&view);

        view.select_page(1);
        let pending = view.load();
        match view.render() {
            Screen::Ready {
                body: Body::Notes(notes),
                refreshing,
                ..
            } => {
                assert!(refreshing);
                assert_eq!(notes[0].id, first_page[0]);
            }
            other => panic!("unexpected screen: {:?}", other),
        }

        let loaded = pending.await;
        assert!(view.apply(loaded));
        assert_ne!(shown_ids(&view), first_page);
        assert_eq!(view.displayed_key(), Some(&PageKey::new(2, "")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_result_is_cached_not_displayed() {
        let api = FakeApi::with_notes(30);
        let mut view = view(&api);
        view.refresh().await;

        view.select_page(1);
        let stale = view.load();
        view.select_page(2);
        let current = view.load();

        let current = current.await;
        let stale = stale.await;
        assert!(view.apply(current));
        assert!(!view.apply(stale));

        assert_eq!(view.displayed_key(), Some(&PageKey::new(3, "")));
        assert!(view.client().peek(&PageKey::new(2, "")).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_closes_modal_and_refetches() {
        let api = FakeApi::with_notes(2);
        let mut view = view(&api);
        view.refresh().await;
        assert_eq!(api.list_count(), 1);

        view.open_create();
        assert!(view.state().modal_open);
        let created = view
            .submit_create(CreateNote {
                title: "Buy milk".to_string(),
                content: String::new(),
                tag: Tag::Shopping,
            })
            .await
            .unwrap();

        assert!(!view.state().modal_open);
        assert!(view.needs_load());
        assert_eq!(api.list_count(), 1);

        view.refresh().await;
        assert!(!view.needs_load());
        assert_eq!(api.list_count(), 2);
        assert!(shown_ids(&view).contains(&created.id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_create_keeps_modal_open() {
        let api = FakeApi::with_notes(2);
        api.fail_create(Error::Validation("title taken".into()));
        let mut view = view(&api);
        view.refresh().await;

        view.open_create();
        let result = view
            .submit_create(CreateNote {
                title: "Duplicate".to_string(),
                content: String::new(),
                tag: Tag::Work,
            })
            .await;

        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(view.state().modal_open);
        assert!(!view.needs_load());
        assert_eq!(api.list_count(), 1);
        assert!(matches!(view.render(), Screen::Ready { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_create() {
        let api = FakeApi::default();
        let mut view = view(&api);
        view.open_create();
        view.cancel_create();
        assert!(!view.state().modal_open);
        assert_eq!(api.create_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_delete_removes_note() {
        let api = FakeApi::default();
        api.push(note("41", "first"));
        api.push(note("42", "second"));
        let mut view = view(&api);
        view.refresh().await;
        assert!(shown_ids(&view).contains(&"42".to_string()));

        assert_eq!(view.delete_note("42", true).await, Ok(true));
        assert_eq!(api.delete_calls(), vec!["42".to_string()]);
        assert!(view.needs_load());

        view.refresh().await;
        assert_eq!(shown_ids(&view), vec!["41".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconfirmed_delete_is_noop() {
        let api = FakeApi::with_notes(1);
        let mut view = view(&api);
        assert_eq!(view.delete_note("1", false).await, Ok(false));
        assert!(api.delete_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_delete_keeps_view() {
        let api = FakeApi::with_notes(2);
        let mut view = view(&api);
        view.refresh().await;

        let result = view.delete_note("missing", true).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(shown_ids(&view).len(), 2);
        assert!(view.last_error().is_none());
        assert!(!view.needs_load());
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_failure_shows_error_screen() {
        let api = FakeApi::with_notes(2);
        api.fail_list((0..4).map(|_| Error::Network("unreachable".into())));
        let mut view = view(&api);

        view.refresh().await;
        assert_eq!(view.render(), Screen::Error);
        assert_eq!(api.list_count(), 4);

        tokio::time::advance(Duration::from_secs(120)).await;
        assert_eq!(api.list_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_screen_only_for_failed_key() {
        let api = FakeApi::with_notes(30);
        api.fail_list((0..4).map(|_| Error::Network("unreachable".into())));
        let mut view = view(&api);

        view.refresh().await;
        assert_eq!(view.render(), Screen::Error);
        assert!(view.last_error().is_some());

        view.select_page(1);
        assert!(view.needs_load());
        let pending = view.load();
        assert!(view.last_error().is_none());
        assert_eq!(
            view.render(),
            Screen::Ready {
                body: Body::Loading,
                pagination: None,
                modal_open: false,
                refreshing: false,
            }
        );

        view.apply(pending.await);
        assert_eq!(view.displayed_key(), Some(&PageKey::new(2, "")));
        assert_eq!(shown_ids(&view).len(), 12);

        view.select_page(0);
        assert_ne!(view.render(), Screen::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_needs_load_tracks_active_key() {
        let api = FakeApi::with_notes(30);
        let mut view = view(&api);
        assert!(view.needs_load());

        let pending = view.load();
        assert!(!view.needs_load());
        view.select_page(1);
        assert!(view.needs_load());

        view.apply(pending.await);
        view.refresh().await;
        assert!(!view.needs_load());

        view.input_search("Note 2");
        assert!(!view.needs_load());
        assert!(view.wait_for_search().await);
        assert!(view.needs_load());
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_navigation_bounds() {
        let api = FakeApi::with_notes(13);
        let mut view = view(&api);
        view.refresh().await;

        assert!(!view.prev_page());
        assert!(view.next_page());
        assert_eq!(view.state().page, 2);
        assert!(!view.next_page());
    }
}
