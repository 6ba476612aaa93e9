//! Feed filters.
//!
//! [`BlockList`] runs at ingestion: posts it rejects are dropped for good
//! (until the next refresh). [`HiddenPosts`] runs at display time and can be
//! toggled without refetching.

use crate::feed::ItemFilter;
use crate::lemmy::FeedItem;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

// ============================================================================
// Block List
// ============================================================================

/// User-configured keyword and website blocks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockList {
    keywords: Vec<String>,
    websites: Vec<String>,
}

impl BlockList {
    pub fn new(keywords: &[String], websites: &[String]) -> Self {
        let keywords = keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        let websites = websites
            .iter()
            .map(|w| normalize_site(w))
            .filter(|w| !w.is_empty())
            .collect();
        Self { keywords, websites }
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty() && self.websites.is_empty()
    }

    /// Whether the item survives the block list. Only posts are ever blocked.
    pub fn allows(&self, item: &FeedItem) -> bool {
        let Some(view) = item.as_post() else {
            return true;
        };

        if !self.keywords.is_empty() {
            let title = view.post.name.to_lowercase();
            if self.keywords.iter().any(|k| title.contains(k.as_str())) {
                return false;
            }
        }

        if let Some(host) = view.link_host() {
            let host = host.trim_start_matches("www.");
            if self.websites.iter().any(|site| host_matches(host, site)) {
                return false;
            }
        }

        true
    }

    /// Ingestion filter for the feed loader, or `None` when nothing is blocked.
    pub fn into_filter(self) -> Option<ItemFilter<FeedItem>> {
        if self.is_empty() {
            return None;
        }
        Some(Arc::new(move |item: &FeedItem| self.allows(item)))
    }
}

/// Lowercase, strip scheme, `www.` and any path.
fn normalize_site(site: &str) -> String {
    let site = site.trim().to_lowercase();
    let site = site
        .strip_prefix("https://")
        .or_else(|| site.strip_prefix("http://"))
        .unwrap_or(&site);
    let site = site.split('/').next().unwrap_or_default();
    site.trim_start_matches("www.").to_string()
}

fn host_matches(host: &str, site: &str) -> bool {
    host == site
        || host
            .strip_suffix(site)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

// ============================================================================
// Hidden Posts
// ============================================================================

/// Post ids the user hid, shared between the app and the loader's display filter.
#[derive(Debug, Clone, Default)]
pub struct HiddenPosts {
    ids: Arc<RwLock<HashSet<i64>>>,
    show_hidden: Arc<AtomicBool>,
}

impl HiddenPosts {
    pub fn from_ids(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            ids: Arc::new(RwLock::new(ids.into_iter().collect())),
            show_hidden: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }

    /// Flip the hidden state of a post. Returns true if it is now hidden.
    pub fn toggle(&self, id: i64) -> bool {
        let mut ids = self.ids.write().unwrap_or_else(PoisonError::into_inner);
        if ids.remove(&id) {
            false
        } else {
            ids.insert(id);
            true
        }
    }

    /// Returns true if the post was not hidden before.
    pub fn hide(&self, id: i64) -> bool {
        self.ids
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id)
    }

    pub fn len(&self) -> usize {
        self.ids.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn show_hidden(&self) -> bool {
        self.show_hidden.load(Ordering::Relaxed)
    }

    pub fn set_show_hidden(&self, show: bool) {
        self.show_hidden.store(show, Ordering::Relaxed);
    }

    /// Display filter that hides hidden posts unless "show hidden" is on.
    pub fn display_filter(&self) -> ItemFilter<FeedItem> {
        let hidden = self.clone();
        Arc::new(move |item: &FeedItem| {
            if hidden.show_hidden() {
                return true;
            }
            item.post_id().map_or(true, |id| !hidden.contains(id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lemmy::{Community, ModlogEntry, Person, Post, PostAggregates, PostView};

    fn post(id: i64, title: &str, url: Option<&str>) -> FeedItem {
        FeedItem::Post(PostView {
            post: Post {
                id,
                name: title.to_string(),
                url: url.map(str::to_string),
                body: None,
                published: "2024-01-01T00:00:00Z".to_string(),
                nsfw: false,
                featured_community: false,
                featured_local: false,
            },
            creator: Person {
                id: 1,
                name: "alice".into(),
                display_name: None,
                actor_id: None,
            },
            community: Community {
                id: 2,
                name: "rust".into(),
                title: "Rust".into(),
                actor_id: None,
            },
            counts: PostAggregates::default(),
            read: false,
            saved: false,
            my_vote: None,
        })
    }

    fn modlog(id: i64) -> FeedItem {
        FeedItem::Modlog(ModlogEntry {
            kind: "mod_remove_post".into(),
            id,
            when: None,
            reason: Some("crypto spam".into()),
            moderator: None,
            target: Some("Buy crypto".into()),
        })
    }

    #[test]
    fn test_keyword_block_is_case_insensitive() {
        let blocks = BlockList::new(&["Crypto".into()], &[]);
        assert!(!blocks.allows(&post(1, "Why CRYPTO is back", None)));
        assert!(blocks.allows(&post(2, "Rust 1.80 released", None)));
    }

    #[test]
    fn test_website_block_matches_subdomains() {
        let blocks = BlockList::new(&[], &["https://www.Example.com/".into()]);
        assert!(!blocks.allows(&post(1, "a", Some("https://example.com/x"))));
        assert!(!blocks.allows(&post(2, "b", Some("https://news.example.com/y"))));
        assert!(!blocks.allows(&post(3, "c", Some("https://www.example.com/z"))));
        assert!(blocks.allows(&post(4, "d", Some("https://notexample.com/"))));
        assert!(blocks.allows(&post(5, "e", None)));
    }

    #[test]
    fn test_non_posts_always_pass() {
        let blocks = BlockList::new(&["crypto".into()], &[]);
        assert!(blocks.allows(&modlog(1)));
    }

    #[test]
    fn test_empty_block_list_has_no_filter() {
        let blocks = BlockList::new(&["  ".into()], &[]);
        assert!(blocks.is_empty());
        assert!(blocks.into_filter().is_none());
    }

    #[test]
    fn test_hidden_display_filter_is_reversible() {
        let hidden = HiddenPosts::from_ids([1]);
        let filter = hidden.display_filter();

        assert!(!filter(&post(1, "a", None)));
        assert!(filter(&post(2, "b", None)));
        assert!(filter(&modlog(1)));

        hidden.set_show_hidden(true);
        assert!(filter(&post(1, "a", None)));

        hidden.set_show_hidden(false);
        assert!(hidden.toggle(2));
        assert!(!filter(&post(2, "b", None)));
        assert!(!hidden.toggle(2));
        assert!(filter(&post(2, "b", None)));
    }
}
