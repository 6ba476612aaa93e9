use crate::config::Config;
use crate::feed::{FeedLoader, FetchOutcome, ItemFilter};
use crate::filters::{BlockList, HiddenPosts};
use crate::lemmy::{FeedItem, FeedKind, LemmyClient, ListingType, SortType};
use crate::positions::PositionStore;
use crate::storage::{Database, PostMetadata, SettingScope};
use anyhow::Result;
use std::borrow::Cow;
use std::collections::HashSet;
use std::ops::Range;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Settings key under which the sort of each listing is stored.
pub const POST_SORT_KEY: &str = "post_sort";

/// Task name reported when a fetch task panics.
pub const FETCH_TASK: &str = "feed fetch";

/// How long a status message stays up.
const STATUS_TTL_SECS: u64 = 3;

// ============================================================================
// Events
// ============================================================================

/// Events from background tasks
#[derive(Debug)]
pub enum AppEvent {
    /// A loader fetch finished.
    ///
    /// `feed` is the feed that was showing when the fetch was spawned; the
    /// loader itself already discards superseded responses.
    FetchFinished {
        feed: FeedKind,
        result: Result<FetchOutcome, String>,
    },
    /// A hide/unhide was written to the database.
    HideSaved { post_id: i64, hidden: bool },
    /// Posts scrolled past were checked and the listed ones stored as hidden.
    AutoHidden { result: Result<Vec<i64>, String> },
    /// Persisting a hide/unhide failed; the in-memory change is reverted.
    HideFailed {
        post_id: i64,
        hidden: bool,
        error: String,
    },
    /// A background task panicked.
    TaskPanicked { task: &'static str, error: String },
}

// ============================================================================
// Application State
// ============================================================================

/// Central application state
pub struct App {
    pub db: Database,
    pub client: LemmyClient,
    pub config: Config,
    /// Scope under which settings and post flags are stored, e.g. `guest@lemmy.world`.
    pub user_handle: String,

    // Feed
    pub kind: FeedKind,
    pub sort: SortType,
    pub loader: FeedLoader<FeedItem>,
    pub hidden: HiddenPosts,
    /// Posts scrolled past while `auto_hide_read` is on. Persisted right away,
    /// folded into `hidden` on the next refresh so the list does not jump.
    pub auto_hidden: Vec<i64>,
    /// Posts already considered for auto-hiding this session.
    pub auto_hide_seen: HashSet<i64>,
    pub positions: PositionStore,
    /// Fetch tasks spawned and not yet reported back.
    pub fetches_in_progress: usize,
    /// Selection to restore once the first page of a switched-to feed arrives.
    pub pending_selection: Option<usize>,

    // UI State
    pub selected: usize,
    pub scroll_offset: usize,
    /// Rows available for items, updated on every render.
    pub viewport_height: usize,
    /// The last movement was downward (rows may have left the top).
    pub scrolling_down: bool,
    /// Item rows materialized by the last render.
    pub rendered_range: Option<Range<usize>>,
    /// Row range reported to the loader last.
    pub last_range: Option<Range<usize>>,
    pub show_help: bool,

    /// Status message with its creation time
    pub status_message: Option<(Cow<'static, str>, Instant)>,
    /// Only render when state has changed
    pub needs_redraw: bool,
    pub spinner_frame: usize,
}

impl App {
    /// Build the app for the configured listing. Call [`App::load_persisted`]
    /// before the first fetch.
    pub fn new(db: Database, client: LemmyClient, config: Config) -> Self {
        let user_handle = user_handle(&client);

        let kind = FeedKind::Posts(config.default_listing);
        let sort = config.default_sort;
        let hidden = HiddenPosts::default();
        hidden.set_show_hidden(config.show_hidden);

        let loader = build_loader(&client, &config, &hidden, kind, sort);

        Self {
            db,
            client,
            config,
            user_handle,
            kind,
            sort,
            loader,
            hidden,
            auto_hidden: Vec::new(),
            auto_hide_seen: HashSet::new(),
            positions: PositionStore::default(),
            fetches_in_progress: 0,
            pending_selection: None,
            selected: 0,
            scroll_offset: 0,
            viewport_height: 0,
            scrolling_down: false,
            rendered_range: None,
            last_range: None,
            show_help: false,
            status_message: None,
            needs_redraw: true,
            spinner_frame: 0,
        }
    }

    /// Load hidden posts and the stored sort of the starting listing.
    pub async fn load_persisted(&mut self) -> Result<()> {
        let ids = self.db.get_hidden_post_ids(&self.user_handle).await?;
        tracing::debug!(count = ids.len(), "Loaded hidden posts");
        let hidden = HiddenPosts::from_ids(ids);
        hidden.set_show_hidden(self.hidden.show_hidden());
        self.hidden = hidden;
        self.loader.set_display_filter(Some(self.hidden.display_filter()));

        if let FeedKind::Posts(listing) = self.kind {
            if let Some(sort) = self.stored_sort(listing).await {
                self.sort = sort;
                self.loader = build_loader(&self.client, &self.config, &self.hidden, self.kind, sort);
            }
        }
        Ok(())
    }

    fn sort_scope(&self, listing: ListingType) -> SettingScope {
        SettingScope::user(&self.user_handle).community(listing.as_str())
    }

    async fn stored_sort(&self, listing: ListingType) -> Option<SortType> {
        match self
            .db
            .get_setting::<SortType>(POST_SORT_KEY, &self.sort_scope(listing))
            .await
        {
            Ok(sort) => sort,
            Err(e) => {
                tracing::warn!(error = %e, %listing, "Failed to read stored sort");
                None
            }
        }
    }

    // ========================================================================
    // Fetching
    // ========================================================================

    /// Fetch the next page (or the first again, on refresh) in the background.
    pub fn spawn_fetch(&mut self, refresh: bool, event_tx: &mpsc::Sender<AppEvent>) {
        if refresh {
            self.absorb_auto_hidden();
        }
        let loader = self.loader.clone();
        self.spawn_loader_task(event_tx, async move { loader.fetch_more(refresh).await });
    }

    /// Point the loader at `kind` with `sort` and reload from the first page.
    fn spawn_replace_source(&mut self, event_tx: &mpsc::Sender<AppEvent>) {
        self.absorb_auto_hidden();
        let source = self
            .kind
            .source(&self.client, self.sort, self.config.page_limit);
        let loader = self.loader.clone();
        self.spawn_loader_task(event_tx, async move { loader.replace_source(source).await });
    }

    fn spawn_loader_task<F>(&mut self, event_tx: &mpsc::Sender<AppEvent>, fetch: F)
    where
        F: std::future::Future<Output = Result<FetchOutcome, crate::feed::FetchError>>
            + Send
            + 'static,
    {
        self.fetches_in_progress += 1;
        let feed = self.kind;
        let tx = event_tx.clone();
        tokio::spawn(async move {
            let event = match crate::ui::catch_task_panic(fetch).await {
                Ok(result) => AppEvent::FetchFinished {
                    feed,
                    result: result.map_err(|e| e.to_string()),
                },
                Err(error) => AppEvent::TaskPanicked {
                    task: FETCH_TASK,
                    error,
                },
            };
            if let Err(e) = tx.send(event).await {
                tracing::warn!(error = %e, "Failed to send fetch result (receiver dropped)");
            }
        });
    }

    /// Whether the loop should ask for another page on its own.
    pub fn should_auto_fetch(&self) -> bool {
        self.fetches_in_progress == 0 && self.loader.wants_more()
    }

    // ========================================================================
    // Feed Switching
    // ========================================================================

    /// Show another feed, remembering where we were in the current one.
    pub async fn switch_feed(&mut self, kind: FeedKind, event_tx: &mpsc::Sender<AppEvent>) {
        if kind == self.kind {
            return;
        }
        if matches!(kind, FeedKind::Inbox) && !self.client.is_authenticated() {
            self.set_status("Log in (set LEMMY_JWT) to see your inbox");
            return;
        }

        self.positions.save(&self.kind.to_string(), self.selected);
        self.kind = kind;

        if let FeedKind::Posts(listing) = kind {
            self.sort = self
                .stored_sort(listing)
                .await
                .unwrap_or(self.config.default_sort);
        }

        self.pending_selection = self.positions.restore(&kind.to_string());
        self.reset_view();
        tracing::info!(feed = %kind, sort = %self.sort, "Switching feed");
        self.spawn_replace_source(event_tx);
    }

    /// Advance to the next sort and store it for the current listing.
    pub async fn cycle_sort(&mut self, event_tx: &mpsc::Sender<AppEvent>) {
        let FeedKind::Posts(listing) = self.kind else {
            self.set_status("This feed has a fixed order");
            return;
        };

        self.sort = self.sort.cycle();
        let scope = self.sort_scope(listing);
        // Back at the configured default: stop overriding it
        let stored = if self.sort == self.config.default_sort {
            self.db.delete_setting(POST_SORT_KEY, &scope).await
        } else {
            self.db.set_setting(POST_SORT_KEY, &self.sort, &scope).await
        };
        if let Err(e) = stored {
            tracing::warn!(error = %e, "Failed to store sort");
        }

        self.positions.forget(&self.kind.to_string());
        self.pending_selection = None;
        self.reset_view();
        self.set_status(format!("Sort: {}", self.sort));
        self.spawn_replace_source(event_tx);
    }

    pub fn reset_view(&mut self) {
        self.selected = 0;
        self.scroll_offset = 0;
        self.last_range = None;
        self.scrolling_down = false;
    }

    // ========================================================================
    // Hiding
    // ========================================================================

    /// Hide or unhide the selected post; persisted in the background.
    pub fn toggle_hide_selected(&mut self, event_tx: &mpsc::Sender<AppEvent>) {
        let Some(post_id) = self.selected_item().and_then(|item| item.post_id()) else {
            self.set_status("Only posts can be hidden");
            return;
        };

        let hidden = self.hidden.toggle(post_id);
        self.set_status(if hidden { "Post hidden" } else { "Post unhidden" });
        self.clamp_selection();
        self.persist_hidden(post_id, hidden, event_tx);
    }

    fn persist_hidden(&self, post_id: i64, hidden: bool, event_tx: &mpsc::Sender<AppEvent>) {
        let db = self.db.clone();
        let metadata = PostMetadata::hidden(post_id, &self.user_handle, hidden);
        let tx = event_tx.clone();
        tokio::spawn(async move {
            let event = match db.upsert_post_metadata(&metadata).await {
                Ok(()) => AppEvent::HideSaved { post_id, hidden },
                Err(e) => AppEvent::HideFailed {
                    post_id,
                    hidden,
                    error: e.to_string(),
                },
            };
            if let Err(e) = tx.send(event).await {
                tracing::warn!(error = %e, "Failed to send hide result (receiver dropped)");
            }
        });
    }

    /// Hide posts that scrolled off the top while `auto_hide_read` is on.
    ///
    /// Posts with a stored flag are left alone, so a post the user unhid is
    /// not hidden again. The rest are stored as hidden in the background and
    /// reported back with [`AppEvent::AutoHidden`].
    pub fn auto_hide(&mut self, items: &[FeedItem], event_tx: &mpsc::Sender<AppEvent>) {
        if !self.config.auto_hide_read {
            return;
        }
        let candidates: Vec<i64> = items
            .iter()
            .filter_map(FeedItem::post_id)
            .filter(|id| !self.hidden.contains(*id) && self.auto_hide_seen.insert(*id))
            .collect();
        if candidates.is_empty() {
            return;
        }

        let db = self.db.clone();
        let user_handle = self.user_handle.clone();
        let tx = event_tx.clone();
        tokio::spawn(async move {
            let result = store_auto_hidden(&db, &user_handle, candidates)
                .await
                .map_err(|e| e.to_string());
            if let Err(e) = tx.send(AppEvent::AutoHidden { result }).await {
                tracing::warn!(error = %e, "Failed to send auto-hide result (receiver dropped)");
            }
        });
    }

    fn absorb_auto_hidden(&mut self) {
        for post_id in self.auto_hidden.drain(..) {
            self.hidden.hide(post_id);
        }
    }

    pub fn toggle_show_hidden(&mut self) {
        let show = !self.hidden.show_hidden();
        self.hidden.set_show_hidden(show);
        self.clamp_selection();
        self.last_range = None;
        self.set_status(if show {
            "Showing hidden posts"
        } else {
            "Hiding hidden posts"
        });
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    pub fn selected_item(&self) -> Option<FeedItem> {
        self.loader
            .visible_slice(self.selected, self.selected + 1)
            .into_iter()
            .next()
    }

    pub fn nav_down(&mut self, rows: usize) {
        let len = self.loader.visible_len();
        if len == 0 {
            return;
        }
        self.selected = (self.selected + rows).min(len - 1);
        self.scrolling_down = true;
    }

    pub fn nav_up(&mut self, rows: usize) {
        self.selected = self.selected.saturating_sub(rows);
        self.scrolling_down = false;
    }

    pub fn nav_top(&mut self) {
        self.selected = 0;
        self.scrolling_down = false;
    }

    pub fn nav_bottom(&mut self) {
        self.selected = self.loader.visible_len().saturating_sub(1);
        self.scrolling_down = true;
    }

    /// Keep the selection inside the visible list.
    pub fn clamp_selection(&mut self) {
        let len = self.loader.visible_len();
        self.selected = self.selected.min(len.saturating_sub(1));
    }

    /// Apply a remembered position once the feed has items.
    pub fn apply_pending_selection(&mut self) {
        if let Some(selected) = self.pending_selection.take() {
            self.selected = selected;
            self.clamp_selection();
        }
    }

    // ========================================================================
    // Status
    // ========================================================================

    /// Set status message (will auto-expire after 3 seconds)
    pub fn set_status(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.status_message = Some((msg.into(), Instant::now()));
    }

    /// Clear status message if expired. Returns true if a message was cleared.
    pub fn clear_expired_status(&mut self) -> bool {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed().as_secs() >= STATUS_TTL_SECS {
                self.status_message = None;
                return true;
            }
        }
        false
    }
}

/// Store `candidates` as hidden unless the user already flagged them. Returns
/// the ids that were hidden.
async fn store_auto_hidden(
    db: &Database,
    user_handle: &str,
    candidates: Vec<i64>,
) -> Result<Vec<i64>> {
    let flagged: HashSet<i64> = db
        .get_post_metadatas(&candidates, user_handle)
        .await?
        .into_iter()
        .map(|m| m.post_id)
        .collect();

    let mut hidden = Vec::new();
    for post_id in candidates {
        if flagged.contains(&post_id) {
            continue;
        }
        db.upsert_post_metadata(&PostMetadata::hidden(post_id, user_handle, true))
            .await?;
        hidden.push(post_id);
    }
    tracing::debug!(count = hidden.len(), "Auto-hid posts");
    Ok(hidden)
}

/// Scope under which settings and post flags are stored: `me@host` when
/// logged in, `guest@host` otherwise.
pub fn user_handle(client: &LemmyClient) -> String {
    let host = client.api_base().host_str().unwrap_or("local");
    let who = if client.is_authenticated() { "me" } else { "guest" };
    format!("{}@{}", who, host)
}

/// Build a loader for `kind` with the block list and hidden-post filters installed.
pub fn build_loader(
    client: &LemmyClient,
    config: &Config,
    hidden: &HiddenPosts,
    kind: FeedKind,
    sort: SortType,
) -> FeedLoader<FeedItem> {
    let loader = FeedLoader::builder_shared(kind.source(client, sort, config.page_limit))
        .key(FeedItem::key)
        .limit(config.page_limit)
        .infinite_scrolling(config.infinite_scrolling)
        .build();

    let blocks: Option<ItemFilter<FeedItem>> =
        BlockList::new(&config.filtered_keywords, &config.filtered_websites).into_filter();
    loader.set_ingest_filter(blocks);
    loader.set_display_filter(Some(hidden.display_filter()));
    loader
}
