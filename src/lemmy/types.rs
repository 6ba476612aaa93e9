use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

// ============================================================================
// Listing and Sort
// ============================================================================

/// Which posts a listing shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListingType {
    All,
    Local,
    Subscribed,
    ModeratorView,
}

impl ListingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingType::All => "All",
            ListingType::Local => "Local",
            ListingType::Subscribed => "Subscribed",
            ListingType::ModeratorView => "ModeratorView",
        }
    }

    /// Heading shown for the listing.
    pub fn title(&self) -> &'static str {
        match self {
            ListingType::All => "All",
            ListingType::Local => "Local",
            ListingType::Subscribed => "Home",
            ListingType::ModeratorView => "Moderator View",
        }
    }
}

impl fmt::Display for ListingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(ListingType::All),
            "local" => Ok(ListingType::Local),
            "subscribed" | "home" => Ok(ListingType::Subscribed),
            "moderatorview" | "moderator" => Ok(ListingType::ModeratorView),
            other => Err(format!("unknown listing type '{}'", other)),
        }
    }
}

/// Post sort order, named as the Lemmy API names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortType {
    Active,
    Hot,
    New,
    Old,
    TopDay,
    TopWeek,
    TopMonth,
    TopYear,
    TopAll,
    MostComments,
    NewComments,
    Scaled,
    Controversial,
}

impl SortType {
    const ALL: [SortType; 13] = [
        SortType::Active,
        SortType::Hot,
        SortType::New,
        SortType::Old,
        SortType::TopDay,
        SortType::TopWeek,
        SortType::TopMonth,
        SortType::TopYear,
        SortType::TopAll,
        SortType::MostComments,
        SortType::NewComments,
        SortType::Scaled,
        SortType::Controversial,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortType::Active => "Active",
            SortType::Hot => "Hot",
            SortType::New => "New",
            SortType::Old => "Old",
            SortType::TopDay => "TopDay",
            SortType::TopWeek => "TopWeek",
            SortType::TopMonth => "TopMonth",
            SortType::TopYear => "TopYear",
            SortType::TopAll => "TopAll",
            SortType::MostComments => "MostComments",
            SortType::NewComments => "NewComments",
            SortType::Scaled => "Scaled",
            SortType::Controversial => "Controversial",
        }
    }

    /// The sort after this one, wrapping around.
    pub fn cycle(&self) -> SortType {
        let index = Self::ALL.iter().position(|s| s == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for SortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortType::ALL
            .iter()
            .find(|sort| sort.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown sort '{}'", s))
    }
}

// ============================================================================
// Objects
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Person {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub actor_id: Option<String>,
}

impl Person {
    /// `name@instance`, or just `name` when the actor id is missing.
    pub fn handle(&self) -> String {
        handle_for(&self.name, self.actor_id.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Community {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub actor_id: Option<String>,
}

impl Community {
    pub fn handle(&self) -> String {
        handle_for(&self.name, self.actor_id.as_deref())
    }
}

fn handle_for(name: &str, actor_id: Option<&str>) -> String {
    match actor_id
        .and_then(|id| Url::parse(id).ok())
        .and_then(|url| url.host_str().map(str::to_string))
    {
        Some(host) => format!("{}@{}", name, host),
        None => name.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Post {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    pub published: String,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub featured_community: bool,
    #[serde(default)]
    pub featured_local: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PostAggregates {
    pub comments: i64,
    pub score: i64,
    pub upvotes: i64,
    pub downvotes: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PostView {
    pub post: Post,
    pub creator: Person,
    pub community: Community,
    #[serde(default)]
    pub counts: PostAggregates,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub saved: bool,
    #[serde(default)]
    pub my_vote: Option<i8>,
}

impl PostView {
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        parse_lemmy_date(&self.post.published)
    }

    /// Host of the post's link, if it has one.
    pub fn link_host(&self) -> Option<String> {
        self.post
            .url
            .as_deref()
            .and_then(|u| Url::parse(u).ok())
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommentReply {
    pub id: i64,
    #[serde(default)]
    pub read: bool,
    pub published: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub published: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReplyPost {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CommentAggregates {
    pub score: i64,
    pub child_count: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommentReplyView {
    pub comment_reply: CommentReply,
    pub comment: Comment,
    pub creator: Person,
    pub post: ReplyPost,
    pub community: Community,
    #[serde(default)]
    pub counts: CommentAggregates,
}

/// One moderation log action, flattened from the per-category lists Lemmy returns.
#[derive(Debug, Clone, PartialEq)]
pub struct ModlogEntry {
    /// Action name as the API spells it, e.g. `mod_remove_post`.
    pub kind: String,
    pub id: i64,
    pub when: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub moderator: Option<String>,
    /// Title of the affected post, community name or person name, when present.
    pub target: Option<String>,
}

impl ModlogEntry {
    /// Unique across categories: ids are only unique within one kind.
    pub fn key(&self) -> String {
        format!("{}-{}", self.kind, self.id)
    }

    /// Human label for the action.
    pub fn label(&self) -> String {
        self.kind
            .trim_start_matches("mod_")
            .trim_start_matches("admin_")
            .replace('_', " ")
    }
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct GetPostsResponse {
    pub posts: Vec<PostView>,
    #[serde(default)]
    pub next_page: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetRepliesResponse {
    pub replies: Vec<CommentReplyView>,
}

/// Lemmy error body: `{"error": "not_logged_in"}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
}

/// Parse a Lemmy timestamp.
///
/// Older servers omit the timezone; those timestamps are UTC.
pub fn parse_lemmy_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
