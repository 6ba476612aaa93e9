use super::client::{GetModlog, GetPosts, GetReplies, LemmyClient};
use super::types::{CommentReplyView, ListingType, ModlogEntry, PostView, SortType};
use crate::feed::{FeedSource, FetchError, FetchPage, ItemKey, PageCursor};
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Anything a Lemmy feed can show.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedItem {
    Post(PostView),
    Reply(CommentReplyView),
    Modlog(ModlogEntry),
}

impl FeedItem {
    pub fn key(&self) -> ItemKey {
        match self {
            FeedItem::Post(view) => ItemKey::Id(view.post.id),
            FeedItem::Reply(view) => ItemKey::Id(view.comment_reply.id),
            FeedItem::Modlog(entry) => ItemKey::Name(entry.key()),
        }
    }

    pub fn as_post(&self) -> Option<&PostView> {
        match self {
            FeedItem::Post(view) => Some(view),
            _ => None,
        }
    }

    pub fn post_id(&self) -> Option<i64> {
        self.as_post().map(|view| view.post.id)
    }
}

/// Which feed the user is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    Posts(ListingType),
    Inbox,
    Modlog,
}

impl FeedKind {
    pub fn title(&self) -> String {
        match self {
            FeedKind::Posts(listing) => listing.title().to_string(),
            FeedKind::Inbox => "Inbox".to_string(),
            FeedKind::Modlog => "Mod Logs".to_string(),
        }
    }

    /// Build the source for this feed.
    pub fn source(
        &self,
        client: &LemmyClient,
        sort: SortType,
        limit: usize,
    ) -> Arc<dyn FeedSource<FeedItem>> {
        match self {
            FeedKind::Posts(listing) => Arc::new(PostFeed {
                client: client.clone(),
                listing: *listing,
                sort,
                limit,
                community_name: None,
            }),
            FeedKind::Inbox => Arc::new(RepliesFeed {
                client: client.clone(),
                limit,
                unread_only: false,
            }),
            FeedKind::Modlog => Arc::new(ModlogFeed {
                client: client.clone(),
                limit,
                community_id: None,
            }),
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedKind::Posts(listing) => write!(f, "posts/{}", listing),
            FeedKind::Inbox => f.write_str("inbox"),
            FeedKind::Modlog => f.write_str("modlog"),
        }
    }
}

/// Posts of a listing (or one community), cursor-paginated when the server supports it.
pub struct PostFeed {
    pub client: LemmyClient,
    pub listing: ListingType,
    pub sort: SortType,
    pub limit: usize,
    pub community_name: Option<String>,
}

impl FeedSource<FeedItem> for PostFeed {
    fn fetch(
        &self,
        cursor: PageCursor,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<FetchPage<FeedItem>, FetchError>> {
        let client = self.client.clone();
        let params = GetPosts {
            listing: self.listing,
            sort: self.sort,
            limit: self.limit,
            cursor,
            community_name: self.community_name.clone(),
        };

        Box::pin(async move {
            let response = client.get_posts(&params, &cancel).await?;
            Ok(FetchPage::Paged {
                data: response.posts.into_iter().map(FeedItem::Post).collect(),
                next_page: response.next_page,
            })
        })
    }
}

/// Replies to the logged-in user.
pub struct RepliesFeed {
    pub client: LemmyClient,
    pub limit: usize,
    pub unread_only: bool,
}

impl FeedSource<FeedItem> for RepliesFeed {
    fn fetch(
        &self,
        cursor: PageCursor,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<FetchPage<FeedItem>, FetchError>> {
        let client = self.client.clone();
        let limit = self.limit;
        let unread_only = self.unread_only;

        Box::pin(async move {
            let params = GetReplies {
                page: page_number(&cursor)?,
                limit,
                unread_only,
            };
            let response = client.get_replies(&params, &cancel).await?;
            Ok(FetchPage::Items(
                response.replies.into_iter().map(FeedItem::Reply).collect(),
            ))
        })
    }
}

/// Moderation log, site-wide or for one community.
pub struct ModlogFeed {
    pub client: LemmyClient,
    pub limit: usize,
    pub community_id: Option<i64>,
}

impl FeedSource<FeedItem> for ModlogFeed {
    fn fetch(
        &self,
        cursor: PageCursor,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<FetchPage<FeedItem>, FetchError>> {
        let client = self.client.clone();
        let limit = self.limit;
        let community_id = self.community_id;

        Box::pin(async move {
            let params = GetModlog {
                page: page_number(&cursor)?,
                limit,
                community_id,
                ..Default::default()
            };
            let entries = client.get_modlog(&params, &cancel).await?;
            Ok(FetchPage::Items(
                entries.into_iter().map(FeedItem::Modlog).collect(),
            ))
        })
    }
}

/// Page-numbered endpoints never hand out tokens, so seeing one is a bug upstream.
fn page_number(cursor: &PageCursor) -> Result<u32, FetchError> {
    match cursor {
        PageCursor::Page(page) => Ok(*page),
        PageCursor::Token(token) => Err(FetchError::Decode(format!(
            "endpoint does not support page cursors (got {})",
            token
        ))),
    }
}
