//! Generic paginated feed loading.
//!
//! This module is independent of Lemmy: anything that can produce pages of
//! items can back a feed.
//!
//! - **Addressing**: numbered pages or server continuation tokens ([`PageCursor`])
//! - **Sources**: the [`FeedSource`] contract, with cancellation
//! - **Loading**: [`FeedLoader`] de-duplicates, filters, detects the end of
//!   the feed and keeps at most one request in flight
//! - **Windowing**: which rows a renderer needs to materialize
//!
//! # Example
//!
//! ```ignore
//! use voyager::feed::{source_fn, FeedLoader, FetchPage, ItemKey};
//!
//! let loader = FeedLoader::builder(source_fn(|cursor, _cancel| async move {
//!     Ok(FetchPage::Items(vec![format!("item on {}", cursor)]))
//! }))
//! .key(|item: &String| ItemKey::from(item.as_str()))
//! .build();
//!
//! loader.fetch_more(false).await?;
//! ```

mod cursor;
mod loader;
mod source;
pub mod window;

pub use cursor::{FetchPage, PageCursor};
pub use loader::{
    FeedLoader, FeedLoaderBuilder, FeedState, FetchOutcome, Footer, ItemFilter, KeyFn,
    LoadPhase, RangeOutcome, SkipReason, DEFAULT_LIMIT, MAX_REQUEST_LOOP, SCROLL_FETCH_DISTANCE,
};
pub use source::{source_fn, FeedSource, FetchError, FnSource, ItemKey};
