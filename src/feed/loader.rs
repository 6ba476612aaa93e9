//! Paginated feed loader.
//!
//! [`FeedLoader`] drives a [`FeedSource`] page by page and keeps one
//! de-duplicated, filterable list of items. All state sits in a single
//! mutex-guarded container so UI code can read it synchronously while
//! fetches run on background tasks.

use super::cursor::{FetchPage, PageCursor};
use super::source::{FeedSource, FetchError, ItemKey};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

/// Consecutive fetches whose filtered result was empty before giving up.
///
/// Bounds the request loop when the ingestion filter discards every page.
pub const MAX_REQUEST_LOOP: u32 = 20;

/// Default page size (Lemmy's maximum `limit`).
pub const DEFAULT_LIMIT: usize = 50;

/// Rows from the end of the visible list at which infinite scroll fetches.
pub const SCROLL_FETCH_DISTANCE: usize = 10;

pub type KeyFn<I> = Arc<dyn Fn(&I) -> ItemKey + Send + Sync>;
pub type ItemFilter<I> = Arc<dyn Fn(&I) -> bool + Send + Sync>;

/// Tri-state loading flag.
///
/// `Uninitialized` distinguishes "never loaded" from "finished loading an
/// empty feed".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Uninitialized,
    Loading,
    Idle,
}

/// Why [`FeedLoader::fetch_more`] did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another request is still outstanding
    InFlight,
    /// The feed is exhausted; only a refresh fetches again
    AtEnd,
    /// `replace_source` was given the source already installed
    SameSource,
}

/// Result of a successful call to [`FeedLoader::fetch_more`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A page was applied. `received` counts raw items, `added` the ones
    /// that survived filtering and de-duplication.
    Loaded { received: usize, added: usize },
    Skipped(SkipReason),
    /// The request was cancelled or superseded; state was not touched.
    Cancelled,
}

/// Trailing row shown after the items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Footer {
    /// Last fetch failed; offer a retry.
    LoadFailed,
    /// Nothing more to load.
    End { empty: bool },
    /// Infinite scrolling is off; offer a manual "load more".
    FetchMore { page: u32 },
    None,
}

/// What changed when the rendered row range moved.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeOutcome<I> {
    /// Items that scrolled off the top while the user scrolled down.
    pub removed_from_top: Vec<I>,
    /// The viewport is close enough to the end that another page is wanted.
    pub fetch_more: bool,
}

/// Snapshot-able pagination state of one feed.
#[derive(Debug, Clone)]
pub struct FeedState<I> {
    items: Vec<I>,
    cursor: PageCursor,
    numbered_page: u32,
    phase: LoadPhase,
    at_end: bool,
    load_failed: bool,
    last_error: Option<String>,
    request_loop: u32,
}

impl<I> FeedState<I> {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            cursor: PageCursor::default(),
            numbered_page: 0,
            phase: LoadPhase::Uninitialized,
            at_end: false,
            load_failed: false,
            last_error: None,
            request_loop: 0,
        }
    }

    /// All retained items, before the display filter.
    pub fn items(&self) -> &[I] {
        &self.items
    }

    /// Cursor of the last page applied.
    pub fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    /// Number of pages loaded since the last refresh.
    pub fn numbered_page(&self) -> u32 {
        self.numbered_page
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    pub fn is_at_end(&self) -> bool {
        self.at_end
    }

    pub fn load_failed(&self) -> bool {
        self.load_failed
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Consecutive fetches that came back empty after the ingestion filter.
    pub fn request_loop(&self) -> u32 {
        self.request_loop
    }
}

struct InFlight {
    generation: u64,
    cancel: CancellationToken,
}

struct Shared<I> {
    state: FeedState<I>,
    source: Arc<dyn FeedSource<I>>,
    in_flight: Option<InFlight>,
    generation: u64,
    key: Option<KeyFn<I>>,
    ingest_filter: Option<ItemFilter<I>>,
    display_filter: Option<ItemFilter<I>>,
    infinite_scrolling: bool,
    start_range: usize,
}

impl<I> Shared<I> {
    fn visible(&self) -> impl Iterator<Item = &I> + '_ {
        let filter = self.display_filter.as_deref();
        self.state
            .items
            .iter()
            .filter(move |item: &&I| filter.map_or(true, |f| f(*item)))
    }

    fn cancel_in_flight(&mut self) {
        if let Some(previous) = self.in_flight.take() {
            tracing::debug!(generation = previous.generation, "Cancelling in-flight feed request");
            previous.cancel.cancel();
        }
    }

    /// Merge a freshly fetched page into state.
    ///
    /// A first-page response replaces the items instead of extending them.
    fn apply_page(&mut self, page: FetchPage<I>, cursor: PageCursor) -> FetchOutcome {
        let first_page = cursor.is_first_page();
        let (raw, next_page) = page.into_parts();
        // A token-addressed page without a successor token is the last one
        let token_exhausted = matches!(cursor, PageCursor::Token(_)) && next_page.is_none();
        let cursor = match next_page {
            Some(token) => PageCursor::Token(token),
            None => cursor,
        };

        let received = raw.len();
        let fresh: Vec<I> = match &self.ingest_filter {
            Some(filter) => raw.into_iter().filter(|item| filter(item)).collect(),
            None => raw,
        };
        let kept = fresh.len();

        self.state.phase = LoadPhase::Idle;
        self.state.load_failed = false;
        self.state.last_error = None;

        if first_page {
            self.state.at_end = false;
            self.state.request_loop = 0;
            self.state.items.clear();
        }

        let added = self.append_unique(fresh);

        if kept == 0 {
            self.state.request_loop += 1;
        } else {
            self.state.request_loop = 0;
        }

        if received == 0 || token_exhausted || self.state.request_loop > MAX_REQUEST_LOOP {
            tracing::debug!(
                received,
                token_exhausted,
                request_loop = self.state.request_loop,
                "Reached end of feed"
            );
            self.state.at_end = true;
        }

        self.state.numbered_page = if first_page {
            1
        } else {
            self.state.numbered_page.saturating_add(1)
        };
        self.state.cursor = cursor;

        FetchOutcome::Loaded { received, added }
    }

    /// Append items whose key is not already present. Returns how many were added.
    fn append_unique(&mut self, fresh: Vec<I>) -> usize {
        let Some(key) = self.key.clone() else {
            let added = fresh.len();
            self.state.items.extend(fresh);
            return added;
        };

        let mut seen: HashSet<ItemKey> = self.state.items.iter().map(|item| key(item)).collect();
        let before = self.state.items.len();
        self.state
            .items
            .extend(fresh.into_iter().filter(|item| seen.insert(key(item))));
        self.state.items.len() - before
    }
}

struct Inner<I> {
    shared: Mutex<Shared<I>>,
    limit: usize,
    header_rows: usize,
}

/// Handle to a paginated feed.
///
/// Clones share the same state; hand one to each background fetch task.
pub struct FeedLoader<I> {
    inner: Arc<Inner<I>>,
}

impl<I> Clone for FeedLoader<I> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Builder for [`FeedLoader`].
pub struct FeedLoaderBuilder<I> {
    source: Arc<dyn FeedSource<I>>,
    limit: usize,
    key: Option<KeyFn<I>>,
    ingest_filter: Option<ItemFilter<I>>,
    display_filter: Option<ItemFilter<I>>,
    infinite_scrolling: bool,
    header_rows: usize,
}

impl<I> FeedLoaderBuilder<I> {
    /// Page size the source is queried with; the auto-fetch threshold is half of it.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Key extractor used for de-duplication. Without one, items are never de-duplicated.
    pub fn key(mut self, key: impl Fn(&I) -> ItemKey + Send + Sync + 'static) -> Self {
        self.key = Some(Arc::new(key));
        self
    }

    /// Filter applied once to freshly fetched items. Rejected items are gone
    /// until the next refresh.
    pub fn ingest_filter(mut self, filter: impl Fn(&I) -> bool + Send + Sync + 'static) -> Self {
        self.ingest_filter = Some(Arc::new(filter));
        self
    }

    /// Filter applied on every read. Rejected items are kept and reappear
    /// when the filter changes.
    pub fn display_filter(mut self, filter: impl Fn(&I) -> bool + Send + Sync + 'static) -> Self {
        self.display_filter = Some(Arc::new(filter));
        self
    }

    pub fn infinite_scrolling(mut self, enabled: bool) -> Self {
        self.infinite_scrolling = enabled;
        self
    }

    /// Rows rendered above the first item (they count toward range indexes).
    pub fn header_rows(mut self, rows: usize) -> Self {
        self.header_rows = rows;
        self
    }

    pub fn build(self) -> FeedLoader<I> {
        FeedLoader {
            inner: Arc::new(Inner {
                shared: Mutex::new(Shared {
                    state: FeedState::new(),
                    source: self.source,
                    in_flight: None,
                    generation: 0,
                    key: self.key,
                    ingest_filter: self.ingest_filter,
                    display_filter: self.display_filter,
                    infinite_scrolling: self.infinite_scrolling,
                    start_range: 0,
                }),
                limit: self.limit,
                header_rows: self.header_rows,
            }),
        }
    }
}

impl<I> FeedLoader<I> {
    pub fn builder(source: impl FeedSource<I> + 'static) -> FeedLoaderBuilder<I> {
        Self::builder_shared(Arc::new(source))
    }

    pub fn builder_shared(source: Arc<dyn FeedSource<I>>) -> FeedLoaderBuilder<I> {
        FeedLoaderBuilder {
            source,
            limit: DEFAULT_LIMIT,
            key: None,
            ingest_filter: None,
            display_filter: None,
            infinite_scrolling: true,
            header_rows: 0,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared<I>> {
        self.inner
            .shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn limit(&self) -> usize {
        self.inner.limit
    }

    /// Load the next page, or the first page again when `refresh` is set.
    ///
    /// A non-refresh call while a request is outstanding, or once the feed
    /// is exhausted, returns `Skipped` without touching the source. A
    /// refresh cancels any outstanding request first.
    ///
    /// # Errors
    ///
    /// Source errors other than cancellation mark the feed as failed and
    /// are then returned so the caller can log them.
    pub async fn fetch_more(&self, refresh: bool) -> Result<FetchOutcome, FetchError> {
        let (source, cursor, cancel, generation) = {
            let mut shared = self.lock();

            if shared.in_flight.is_some() && !refresh {
                return Ok(FetchOutcome::Skipped(SkipReason::InFlight));
            }
            if shared.state.at_end && !refresh {
                return Ok(FetchOutcome::Skipped(SkipReason::AtEnd));
            }

            shared.cancel_in_flight();
            shared.state.phase = LoadPhase::Loading;

            let cursor = if refresh {
                PageCursor::FIRST
            } else {
                shared.state.cursor.next()
            };

            shared.generation = shared.generation.wrapping_add(1);
            let generation = shared.generation;
            let cancel = CancellationToken::new();
            shared.in_flight = Some(InFlight {
                generation,
                cancel: cancel.clone(),
            });

            (Arc::clone(&shared.source), cursor, cancel, generation)
        };

        tracing::debug!(%cursor, refresh, generation, "Fetching feed page");

        let fetch = source.fetch(cursor.clone(), cancel.clone());
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = fetch => result,
        };

        let mut shared = self.lock();

        // Superseded by a refresh, a new source, or abort()
        if shared.in_flight.as_ref().map(|f| f.generation) != Some(generation) {
            tracing::debug!(generation, "Discarding superseded feed response");
            return Ok(FetchOutcome::Cancelled);
        }
        shared.in_flight = None;

        match result {
            Ok(page) => Ok(shared.apply_page(page, cursor)),
            Err(e) if e.is_cancelled() => Ok(FetchOutcome::Cancelled),
            Err(e) => {
                tracing::warn!(%cursor, error = %e, "Feed page failed to load");
                shared.state.phase = LoadPhase::Idle;
                shared.state.load_failed = true;
                shared.state.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Cancel the outstanding request, if any.
    ///
    /// Fetch tasks hold their own handle, so dropping a loader does not stop
    /// them; call this on teardown.
    pub fn abort(&self) {
        self.lock().cancel_in_flight();
    }

    /// Install a different source and reload from the first page.
    ///
    /// Handing back the source that is already installed is a no-op.
    pub async fn replace_source(
        &self,
        source: Arc<dyn FeedSource<I>>,
    ) -> Result<FetchOutcome, FetchError> {
        {
            let mut shared = self.lock();
            if Arc::ptr_eq(&shared.source, &source) {
                return Ok(FetchOutcome::Skipped(SkipReason::SameSource));
            }
            shared.cancel_in_flight();
            shared.source = source;
            shared.state = FeedState::new();
            shared.start_range = 0;
        }
        self.fetch_more(true).await
    }

    pub fn source(&self) -> Arc<dyn FeedSource<I>> {
        Arc::clone(&self.lock().source)
    }

    pub fn set_display_filter(&self, filter: Option<ItemFilter<I>>) {
        self.lock().display_filter = filter;
    }

    /// Only affects pages fetched from now on.
    pub fn set_ingest_filter(&self, filter: Option<ItemFilter<I>>) {
        self.lock().ingest_filter = filter;
    }

    pub fn set_infinite_scrolling(&self, enabled: bool) {
        self.lock().infinite_scrolling = enabled;
    }

    pub fn infinite_scrolling(&self) -> bool {
        self.lock().infinite_scrolling
    }

    /// Read the state under the lock.
    pub fn with_state<R>(&self, f: impl FnOnce(&FeedState<I>) -> R) -> R {
        f(&self.lock().state)
    }

    pub fn phase(&self) -> LoadPhase {
        self.lock().state.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase() == LoadPhase::Loading
    }

    pub fn is_at_end(&self) -> bool {
        self.lock().state.at_end
    }

    pub fn load_failed(&self) -> bool {
        self.lock().state.load_failed
    }

    pub fn numbered_page(&self) -> u32 {
        self.lock().state.numbered_page
    }

    pub fn cursor(&self) -> PageCursor {
        self.lock().state.cursor.clone()
    }

    /// Number of items passing the display filter.
    pub fn visible_len(&self) -> usize {
        self.lock().visible().count()
    }

    /// Whether the renderer should show a full-screen spinner instead of the list.
    pub fn shows_spinner(&self) -> bool {
        let shared = self.lock();
        match shared.state.phase {
            LoadPhase::Uninitialized => true,
            LoadPhase::Loading => shared.visible().next().is_none(),
            LoadPhase::Idle => false,
        }
    }

    /// Whether too few items are visible and another page should be requested.
    pub fn wants_more(&self) -> bool {
        let shared = self.lock();
        let threshold = self.inner.limit / 2;
        shared.state.phase != LoadPhase::Loading
            && shared.in_flight.is_none()
            && !shared.state.load_failed
            && !shared.state.at_end
            && shared.visible().count() <= threshold
    }

    pub fn footer(&self) -> Footer {
        let shared = self.lock();
        if shared.state.load_failed {
            Footer::LoadFailed
        } else if shared.state.at_end {
            Footer::End {
                empty: shared.state.items.is_empty(),
            }
        } else if !shared.infinite_scrolling {
            Footer::FetchMore {
                page: shared.state.numbered_page,
            }
        } else {
            Footer::None
        }
    }
}

impl<I: Clone> FeedLoader<I> {
    /// Items passing the display filter, in feed order.
    pub fn visible_items(&self) -> Vec<I> {
        self.lock().visible().cloned().collect()
    }

    /// A window of the visible items (`start..end`, clamped).
    pub fn visible_slice(&self, start: usize, end: usize) -> Vec<I> {
        self.lock()
            .visible()
            .skip(start)
            .take(end.saturating_sub(start))
            .cloned()
            .collect()
    }

    /// Report the rendered row range `start..=end` (header rows included).
    ///
    /// `scrolling` is true while the user is actively scrolling; only then
    /// are rows leaving the top reported.
    pub fn range_changed(&self, start: usize, end: usize, scrolling: bool) -> RangeOutcome<I> {
        let mut shared = self.lock();
        let mut outcome = RangeOutcome {
            removed_from_top: Vec::new(),
            fetch_more: false,
        };

        // Nothing rendered
        if start == 0 && end == 0 {
            return outcome;
        }

        let header = self.inner.header_rows;
        if scrolling && start > header && start > shared.start_range {
            let from = shared.start_range.saturating_sub(header);
            let to = start - header;
            outcome.removed_from_top = shared
                .visible()
                .skip(from)
                .take(to - from)
                .cloned()
                .collect();
        }
        shared.start_range = start;

        let visible = shared.visible().count();
        outcome.fetch_more = end + SCROLL_FETCH_DISTANCE > visible
            && !shared.state.load_failed
            && shared.infinite_scrolling;

        outcome
    }
}
