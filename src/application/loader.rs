//! Incremental page loading for one browsing session.
//!
//! [`PagedLoader`] fetches pages strictly in order, at most one at a time, and
//! publishes a single [`LoaderState`] through a watch channel. Failures past
//! the first page do not disturb the accumulated items; they are reported as
//! a transient [`LoaderNotice`] instead.

use std::{
    fmt,
    sync::{Arc, Mutex},
    time::Instant,
};

use metrics::{counter, histogram};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::{
    application::{error::FetchError, pagination::Page, sources::PageSource},
    util::lock::mutex_lock,
};

const SOURCE: &str = "application::loader";
const NOTICE_CHANNEL_CAPACITY: usize = 16;

/// Rows from the end of the list at which the next page is requested.
pub const DEFAULT_PREFETCH_DISTANCE: usize = 3;

pub(crate) const METRIC_LOADER_PAGE_FETCH_MS: &str = "vitrine_loader_page_fetch_ms";
pub(crate) const METRIC_LOADER_PAGE_FAILED: &str = "vitrine_loader_page_failed_total";

/// Observable state of a loader. Exactly one is current at any time.
#[derive(Debug, Clone, PartialEq)]
pub enum LoaderState<T> {
    Idle,
    LoadingFirst,
    LoadingMore { accumulated: Vec<T> },
    Error { message: String, accumulated: Vec<T> },
    Loaded { items: Vec<T>, has_more: bool },
    Empty,
}

impl<T> LoaderState<T> {
    /// Items a consumer should currently display.
    pub fn items(&self) -> &[T] {
        match self {
            LoaderState::LoadingMore { accumulated } | LoaderState::Error { accumulated, .. } => {
                accumulated
            }
            LoaderState::Loaded { items, .. } => items,
            LoaderState::Idle | LoaderState::LoadingFirst | LoaderState::Empty => &[],
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(
            self,
            LoaderState::LoadingFirst | LoaderState::LoadingMore { .. }
        )
    }
}

/// One-shot notification that does not change the loader state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderNotice {
    /// A page after the first failed; accumulated items are untouched and the
    /// same page is fetched again on the next request.
    PageAppendFailed { page: u32, error: FetchError },
}

impl fmt::Display for LoaderNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderNotice::PageAppendFailed { error, .. } => {
                write!(f, "Failed to load more products: {error}")
            }
        }
    }
}

/// What a single request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Nothing was fetched: a fetch is in flight, the end was reached, or the
    /// loader is closed.
    Skipped,
    Loaded { page: u32, has_more: bool },
    Empty,
    /// The first page failed; the state is now [`LoaderState::Error`].
    Failed { page: u32 },
    /// A later page failed; a [`LoaderNotice`] was emitted.
    AppendFailed { page: u32 },
    /// The result arrived after the loader was closed and was dropped.
    Discarded { page: u32 },
    /// The loader was closed while the fetch was in flight.
    Cancelled { page: u32 },
}

struct Progress<T> {
    current_page: u32,
    items: Vec<T>,
    has_more_pages: bool,
    is_loading: bool,
    closed: bool,
}

impl<T: Clone> Progress<T> {
    /// State to publish when a fetch ends without a result.
    fn settled_state(&self) -> LoaderState<T> {
        if self.current_page == 0 {
            LoaderState::Idle
        } else if self.items.is_empty() {
            LoaderState::Empty
        } else {
            LoaderState::Loaded {
                items: self.items.clone(),
                has_more: self.has_more_pages,
            }
        }
    }
}

impl<T> Default for Progress<T> {
    fn default() -> Self {
        Self {
            current_page: 0,
            items: Vec::new(),
            has_more_pages: true,
            is_loading: false,
            closed: false,
        }
    }
}

pub struct PagedLoader<T> {
    source: Arc<dyn PageSource<T>>,
    progress: Mutex<Progress<T>>,
    state: watch::Sender<LoaderState<T>>,
    notices: broadcast::Sender<LoaderNotice>,
    closed: watch::Sender<bool>,
    prefetch_distance: usize,
}

impl<T> PagedLoader<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(source: Arc<dyn PageSource<T>>) -> Self {
        let (state, _) = watch::channel(LoaderState::Idle);
        let (notices, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        let (closed, _) = watch::channel(false);
        Self {
            source,
            progress: Mutex::new(Progress::default()),
            state,
            notices,
            closed,
            prefetch_distance: DEFAULT_PREFETCH_DISTANCE,
        }
    }

    pub fn with_prefetch_distance(mut self, distance: usize) -> Self {
        self.prefetch_distance = distance;
        self
    }

    /// Fetch the next page unless one is already in flight or the end has
    /// been reached.
    pub async fn request_next_page(&self) -> RequestOutcome {
        let page = {
            let mut progress = mutex_lock(&self.progress, SOURCE, "request_next_page");
            if progress.closed || progress.is_loading || !progress.has_more_pages {
                return RequestOutcome::Skipped;
            }
            progress.is_loading = true;
            let next = if progress.current_page == 0 {
                LoaderState::LoadingFirst
            } else {
                LoaderState::LoadingMore {
                    accumulated: progress.items.clone(),
                }
            };
            self.state.send_replace(next);
            progress.current_page
        };

        debug!(page, "requesting page");
        let started = Instant::now();
        let mut closed = self.closed.subscribe();
        let result = tokio::select! {
            biased;
            _ = closed.wait_for(|closed| *closed) => {
                debug!(page, "page fetch cancelled by close");
                return RequestOutcome::Cancelled { page };
            }
            result = self.source.fetch_page(page) => result,
        };
        histogram!(METRIC_LOADER_PAGE_FETCH_MS).record(started.elapsed().as_secs_f64() * 1000.0);

        self.apply(page, result)
    }

    /// Start over from the first page. A no-op while a fetch is in flight,
    /// so at most one fetch is ever outstanding.
    pub async fn retry(&self) -> RequestOutcome {
        {
            let mut progress = mutex_lock(&self.progress, SOURCE, "retry");
            if progress.closed || progress.is_loading {
                return RequestOutcome::Skipped;
            }
            *progress = Progress::default();
        }
        info!("retrying from the first page");
        self.request_next_page().await
    }

    /// End the session: the fetch in flight is dropped and later requests
    /// are ignored. A loading state is replaced by the last settled one.
    pub fn close(&self) {
        let settled = {
            let mut progress = mutex_lock(&self.progress, SOURCE, "close");
            if progress.closed {
                return;
            }
            progress.closed = true;
            let settled = progress.is_loading.then(|| progress.settled_state());
            progress.is_loading = false;
            settled
        };
        self.closed.send_replace(true);
        if let Some(state) = settled {
            self.state.send_replace(state);
        }
        info!("loader closed");
    }

    /// Whether a row at `visible_index` is close enough to the end of the
    /// list that the next page should be requested.
    pub fn should_prefetch(&self, visible_index: usize) -> bool {
        let progress = mutex_lock(&self.progress, SOURCE, "should_prefetch");
        progress.has_more_pages
            && !progress.items.is_empty()
            && visible_index.saturating_add(self.prefetch_distance) >= progress.items.len()
    }

    /// Near-end trigger: call whenever a row becomes visible.
    pub async fn on_item_visible(&self, visible_index: usize) -> RequestOutcome {
        if !self.should_prefetch(visible_index) {
            return RequestOutcome::Skipped;
        }
        self.request_next_page().await
    }

    pub fn state(&self) -> LoaderState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LoaderState<T>> {
        self.state.subscribe()
    }

    pub fn notices(&self) -> broadcast::Receiver<LoaderNotice> {
        self.notices.subscribe()
    }

    pub fn items(&self) -> Vec<T> {
        mutex_lock(&self.progress, SOURCE, "items").items.clone()
    }

    /// Clone of the item at `index`, if loaded.
    pub fn item(&self, index: usize) -> Option<T> {
        mutex_lock(&self.progress, SOURCE, "item")
            .items
            .get(index)
            .cloned()
    }

    pub fn current_page(&self) -> u32 {
        mutex_lock(&self.progress, SOURCE, "current_page").current_page
    }

    pub fn has_more_pages(&self) -> bool {
        mutex_lock(&self.progress, SOURCE, "has_more_pages").has_more_pages
    }

    pub fn is_loading(&self) -> bool {
        mutex_lock(&self.progress, SOURCE, "is_loading").is_loading
    }

    pub fn is_closed(&self) -> bool {
        mutex_lock(&self.progress, SOURCE, "is_closed").closed
    }

    fn apply(&self, page: u32, result: Result<Page<T>, FetchError>) -> RequestOutcome {
        let mut progress = mutex_lock(&self.progress, SOURCE, "apply");
        if progress.closed {
            debug!(page, "discarding page result after close");
            return RequestOutcome::Discarded { page };
        }
        progress.is_loading = false;

        match result {
            Ok(fetched) => {
                let has_more = fetched.has_more();
                if progress.current_page == 0 {
                    progress.items = fetched.items;
                } else {
                    progress.items.extend(fetched.items);
                }
                progress.has_more_pages = has_more;
                progress.current_page += 1;

                if progress.items.is_empty() {
                    info!(page, "catalog returned no items");
                    self.state.send_replace(LoaderState::Empty);
                    RequestOutcome::Empty
                } else {
                    info!(page, items = progress.items.len(), has_more, "page loaded");
                    self.state.send_replace(LoaderState::Loaded {
                        items: progress.items.clone(),
                        has_more,
                    });
                    RequestOutcome::Loaded { page, has_more }
                }
            }
            Err(error) => {
                counter!(METRIC_LOADER_PAGE_FAILED, "kind" => error.kind()).increment(1);
                if progress.current_page == 0 {
                    warn!(page, kind = error.kind(), error = %error, "first page failed");
                    self.state.send_replace(LoaderState::Error {
                        message: error.to_string(),
                        accumulated: Vec::new(),
                    });
                    RequestOutcome::Failed { page }
                } else {
                    warn!(page, kind = error.kind(), error = %error, "page append failed");
                    self.state.send_replace(LoaderState::Loaded {
                        items: progress.items.clone(),
                        has_more: progress.has_more_pages,
                    });
                    let _ = self
                        .notices
                        .send(LoaderNotice::PageAppendFailed { page, error });
                    RequestOutcome::AppendFailed { page }
                }
            }
        }
    }
}
