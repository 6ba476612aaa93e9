//! Lemmy API access.
//!
//! - [`client`] - HTTP client for the v3 API with retries and cancellation
//! - [`types`] - serde models for the responses we consume
//! - [`sources`] - feed sources that plug the client into the feed loader

mod client;
mod sources;
mod types;

pub use client::{GetModlog, GetPosts, GetReplies, LemmyClient};
pub use sources::{FeedItem, FeedKind, ModlogFeed, PostFeed, RepliesFeed};
pub use types::{
    parse_lemmy_date, Comment, CommentAggregates, CommentReply, CommentReplyView, Community,
    GetPostsResponse, GetRepliesResponse, ListingType, ModlogEntry, Person, Post, PostAggregates,
    PostView, ReplyPost, SortType,
};

/// Default page size requested from Lemmy.
pub const LIMIT: usize = 50;
