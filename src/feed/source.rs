use super::cursor::{FetchPage, PageCursor};
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors a feed source can report.
///
/// `Cancelled` is special: the loader treats it as an expected outcome of
/// superseding or tearing down a request and never surfaces it to the user.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request's cancellation token fired
    #[error("Request cancelled")]
    Cancelled,
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the 30-second timeout
    #[error("Request timed out")]
    Timeout,
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Lemmy returned an `{"error": "..."}` body
    #[error("Server error: {0}")]
    Api(String),
    /// Response body was not the JSON we expected
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}

/// Stable identity of a feed item, used for de-duplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemKey {
    Id(i64),
    Name(String),
}

impl From<i64> for ItemKey {
    fn from(id: i64) -> Self {
        ItemKey::Id(id)
    }
}

impl From<String> for ItemKey {
    fn from(name: String) -> Self {
        ItemKey::Name(name)
    }
}

impl From<&str> for ItemKey {
    fn from(name: &str) -> Self {
        ItemKey::Name(name.to_string())
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKey::Id(id) => write!(f, "{}", id),
            ItemKey::Name(name) => f.write_str(name),
        }
    }
}

/// A paginated source of feed items.
///
/// Implementations must honor `cancel` by resolving to
/// [`FetchError::Cancelled`] once it fires. The loader also races the token,
/// so a source that ignores it is still never applied after cancellation.
pub trait FeedSource<I>: Send + Sync {
    fn fetch(
        &self,
        cursor: PageCursor,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<FetchPage<I>, FetchError>>;
}

/// Adapter turning an async closure into a [`FeedSource`].
pub struct FnSource<F>(F);

/// Wrap a closure `(cursor, cancel) -> Future<Output = Result<FetchPage<I>, FetchError>>`
/// as a feed source.
pub fn source_fn<I, F, Fut>(f: F) -> FnSource<F>
where
    F: Fn(PageCursor, CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = Result<FetchPage<I>, FetchError>> + Send + 'static,
{
    FnSource(f)
}

impl<I, F, Fut> FeedSource<I> for FnSource<F>
where
    F: Fn(PageCursor, CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = Result<FetchPage<I>, FetchError>> + Send + 'static,
{
    fn fetch(
        &self,
        cursor: PageCursor,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<FetchPage<I>, FetchError>> {
        Box::pin((self.0)(cursor, cancel))
    }
}
