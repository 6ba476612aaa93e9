use std::fmt;

/// Address of a page in a paginated feed.
///
/// Lemmy endpoints are either page-numbered (1-based) or return an opaque
/// `next_page` continuation token. A feed starts numbered and switches to
/// tokens as soon as the server hands one back.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PageCursor {
    /// 1-based page number. `Page(0)` means nothing has been loaded yet.
    Page(u32),
    /// Opaque continuation token supplied by the server.
    Token(String),
}

impl PageCursor {
    /// Cursor used for every refresh.
    pub const FIRST: PageCursor = PageCursor::Page(1);

    /// Cursor for the page after this one.
    ///
    /// Numbered pages advance by one. Tokens are reused as-is: the token
    /// stored after a fetch already points at the next page.
    pub fn next(&self) -> PageCursor {
        match self {
            PageCursor::Page(n) => PageCursor::Page(n.saturating_add(1)),
            PageCursor::Token(token) => PageCursor::Token(token.clone()),
        }
    }

    /// Whether this cursor addresses the first page of the feed.
    pub fn is_first_page(&self) -> bool {
        match self {
            PageCursor::Page(n) => *n == 1,
            PageCursor::Token(token) => token.is_empty(),
        }
    }
}

impl Default for PageCursor {
    fn default() -> Self {
        PageCursor::Page(0)
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageCursor::Page(n) => write!(f, "page {}", n),
            PageCursor::Token(token) => write!(f, "cursor {}", token),
        }
    }
}

/// What a feed source returns for one page.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchPage<I> {
    /// A plain list of items (page-numbered endpoints).
    Items(Vec<I>),
    /// Items plus an optional continuation token for the next page.
    Paged {
        data: Vec<I>,
        next_page: Option<String>,
    },
}

impl<I> FetchPage<I> {
    /// Split into the raw items and the continuation token, if any.
    ///
    /// An empty token is treated as absent.
    pub fn into_parts(self) -> (Vec<I>, Option<String>) {
        match self {
            FetchPage::Items(items) => (items, None),
            FetchPage::Paged { data, next_page } => {
                (data, next_page.filter(|token| !token.is_empty()))
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FetchPage::Items(items) => items.len(),
            FetchPage::Paged { data, .. } => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert the item type, keeping the continuation token.
    pub fn map<U>(self, f: impl FnMut(I) -> U) -> FetchPage<U> {
        match self {
            FetchPage::Items(items) => FetchPage::Items(items.into_iter().map(f).collect()),
            FetchPage::Paged { data, next_page } => FetchPage::Paged {
                data: data.into_iter().map(f).collect(),
                next_page,
            },
        }
    }
}

impl<I> From<Vec<I>> for FetchPage<I> {
    fn from(items: Vec<I>) -> Self {
        FetchPage::Items(items)
    }
}
