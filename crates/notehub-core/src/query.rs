//! Query cache for notes list pages.
//!
//! Results are cached per [`PageKey`] for a freshness window. Concurrent
//! queries for the same key share one fetch. Invalidation marks entries
//! stale so the next query refetches.
//!
//! Everything lives on one thread: state is shared through `Rc<RefCell<_>>`
//! and borrows are never held across an `.await`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use futures_util::future::{FutureExt, LocalBoxFuture, Shared};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::retry::RetryPolicy;
use crate::{Error, NoteService, NotesApi, NotesPage, PageKey, DEFAULT_PER_PAGE};

/// How long a fetched page is served without refetching.
pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    pub stale_time: Duration,
    pub per_page: u32,
    pub retry: RetryPolicy,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            stale_time: DEFAULT_STALE_TIME,
            per_page: DEFAULT_PER_PAGE,
            retry: RetryPolicy::default(),
        }
    }
}

type SharedFetch = Shared<LocalBoxFuture<'static, Result<NotesPage, Error>>>;

struct CacheEntry {
    page: NotesPage,
    expires_at: Instant,
    invalidated: bool,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        !self.invalidated && now < self.expires_at
    }
}

struct InFlight {
    id: u64,
    fetch: SharedFetch,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<PageKey, CacheEntry>,
    in_flight: HashMap<PageKey, InFlight>,
    /// Bumped by every invalidation.
    generation: u64,
    next_fetch_id: u64,
}

/// Caching, de-duplicating front of [`NoteService::list_notes`].
pub struct QueryClient<A: NotesApi + 'static> {
    service: Rc<NoteService<A>>,
    options: QueryOptions,
    state: Rc<RefCell<CacheState>>,
}

impl<A: NotesApi + 'static> Clone for QueryClient<A> {
    fn clone(&self) -> Self {
        Self {
            service: Rc::clone(&self.service),
            options: self.options,
            state: Rc::clone(&self.state),
        }
    }
}

impl<A: NotesApi + 'static> QueryClient<A> {
    pub fn new(service: NoteService<A>) -> Self {
        Self::with_options(service, QueryOptions::default())
    }

    pub fn with_options(service: NoteService<A>, options: QueryOptions) -> Self {
        Self {
            service: Rc::new(service),
            options,
            state: Rc::new(RefCell::new(CacheState::default())),
        }
    }

    pub fn service(&self) -> &NoteService<A> {
        &self.service
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Return the page for `key`, from cache when fresh, otherwise by
    /// fetching (or joining a fetch already in flight for the same key).
    pub async fn query(&self, key: &PageKey) -> Result<NotesPage, Error> {
        self.evict_expired();
        if let Some(page) = self.fresh(key) {
            trace!(%key, "cache hit");
            return Ok(page);
        }
        let fetch = self.join_or_start(key);
        fetch.await
    }

    /// Cached data for `key` regardless of freshness. Never fetches.
    pub fn peek(&self, key: &PageKey) -> Option<NotesPage> {
        self.state
            .borrow()
            .entries
            .get(key)
            .map(|entry| entry.page.clone())
    }

    /// Whether `key` has cached data that a query would return as-is.
    pub fn is_fresh(&self, key: &PageKey) -> bool {
        self.fresh(key).is_some()
    }

    pub fn is_fetching(&self, key: &PageKey) -> bool {
        self.state.borrow().in_flight.contains_key(key)
    }

    /// Mark every entry under `prefix` stale. Fetches in flight for those
    /// keys are detached: their results are stored as stale and later
    /// queries start over. Returns the number of cached entries marked.
    pub fn invalidate(&self, prefix: &str) -> usize {
        let mut state = self.state.borrow_mut();
        state.generation += 1;

        let mut marked = 0;
        for (_, entry) in state
            .entries
            .iter_mut()
            .filter(|(key, _)| key.matches_prefix(prefix))
        {
            entry.invalidated = true;
            marked += 1;
        }
        state.in_flight.retain(|key, _| !key.matches_prefix(prefix));

        debug!(%prefix, marked, "invalidated cache entries");
        marked
    }

    /// Drop entries whose freshness window has passed.
    pub fn evict_expired(&self) {
        let now = Instant::now();
        self.state
            .borrow_mut()
            .entries
            .retain(|_, entry| now < entry.expires_at);
    }

    fn fresh(&self, key: &PageKey) -> Option<NotesPage> {
        let now = Instant::now();
        self.state
            .borrow()
            .entries
            .get(key)
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| entry.page.clone())
    }

    fn join_or_start(&self, key: &PageKey) -> SharedFetch {
        let mut state = self.state.borrow_mut();
        if let Some(in_flight) = state.in_flight.get(key) {
            trace!(%key, "joining fetch in flight");
            return in_flight.fetch.clone();
        }

        state.next_fetch_id += 1;
        let id = state.next_fetch_id;
        let generation = state.generation;

        let service = Rc::clone(&self.service);
        let cache = Rc::clone(&self.state);
        let retry = self.options.retry;
        let stale_time = self.options.stale_time;
        let query = key.to_query(self.options.per_page);
        let key_owned = key.clone();

        debug!(%key, id, "fetching notes page");
        let fetch = async move {
            let label = key_owned.to_string();
            let result = retry
                .run(&label, || service.list_notes(query.clone()))
                .await;

            let mut state = cache.borrow_mut();
            if state.in_flight.get(&key_owned).map(|f| f.id) == Some(id) {
                state.in_flight.remove(&key_owned);
            }
            if let Ok(page) = &result {
                let invalidated = generation != state.generation;
                if invalidated {
                    debug!(key = %key_owned, id, "storing result of detached fetch as stale");
                }
                state.entries.insert(
                    key_owned,
                    CacheEntry {
                        page: page.clone(),
                        expires_at: Instant::now() + stale_time,
                        invalidated,
                    },
                );
            }
            result
        }
        .boxed_local()
        .shared();

        state.in_flight.insert(
            key.clone(),
            InFlight {
                id,
                fetch: fetch.clone(),
            },
        );
        fetch
    }
}
