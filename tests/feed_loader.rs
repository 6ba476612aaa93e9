//! Integration tests for the feed loader through its public API.
//!
//! Sources are plain closures serving canned pages, so every test is
//! deterministic and needs no network.

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use voyager::feed::{
    source_fn, FeedLoader, FetchError, FetchOutcome, FetchPage, Footer, ItemKey, LoadPhase,
    PageCursor, SkipReason,
};

fn id_key(id: &u32) -> ItemKey {
    ItemKey::Id(i64::from(*id))
}

/// Loader over numbered pages; page `n` is `pages[n - 1]`, missing pages are empty.
fn paged_loader(pages: Vec<Vec<u32>>, limit: usize) -> FeedLoader<u32> {
    let pages = Arc::new(pages);
    FeedLoader::builder(source_fn(move |cursor: PageCursor, _cancel: CancellationToken| {
        let pages = Arc::clone(&pages);
        async move {
            let PageCursor::Page(n) = cursor else {
                return Err(FetchError::Decode("unexpected token".into()));
            };
            let page = pages
                .get((n as usize).saturating_sub(1))
                .cloned()
                .unwrap_or_default();
            Ok(FetchPage::Items(page))
        }
    }))
    .key(id_key)
    .limit(limit)
    .build()
}

// ============================================================================
// De-duplication Property
// ============================================================================

fn expected_items(pages: &[Vec<u32>]) -> Vec<u32> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for page in pages {
        if page.is_empty() {
            break;
        }
        for id in page {
            if seen.insert(*id) {
                out.push(*id);
            }
        }
    }
    out
}

proptest! {
    #[test]
    fn prop_items_are_unique_and_in_first_seen_order(
        pages in prop::collection::vec(prop::collection::vec(0u32..20, 0..8), 1..6)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let loader = paged_loader(pages.clone(), 8);
        runtime.block_on(async {
            for _ in 0..=pages.len() {
                loader.fetch_more(false).await.unwrap();
            }
        });

        let items = loader.visible_items();
        let unique: HashSet<u32> = items.iter().copied().collect();
        prop_assert_eq!(unique.len(), items.len());
        prop_assert_eq!(items, expected_items(&pages));
        prop_assert!(loader.is_at_end());
    }
}

// ============================================================================
// Lifecycle Scenarios
// ============================================================================

#[tokio::test]
async fn test_empty_feed_ends_without_error() {
    let loader = paged_loader(vec![], 10);
    assert!(loader.shows_spinner());

    let outcome = loader.fetch_more(false).await.unwrap();

    assert_eq!(outcome, FetchOutcome::Loaded { received: 0, added: 0 });
    assert!(loader.is_at_end());
    assert!(!loader.load_failed());
    assert!(!loader.shows_spinner());
    assert_eq!(loader.footer(), Footer::End { empty: true });
    assert!(!loader.wants_more());
}

#[tokio::test]
async fn test_end_of_feed_only_refresh_fetches_again() {
    let loader = paged_loader(vec![vec![1, 2]], 10);
    loader.fetch_more(false).await.unwrap();
    loader.fetch_more(false).await.unwrap();
    assert!(loader.is_at_end());

    assert_eq!(
        loader.fetch_more(false).await.unwrap(),
        FetchOutcome::Skipped(SkipReason::AtEnd)
    );

    loader.fetch_more(true).await.unwrap();
    assert!(!loader.is_at_end());
    assert_eq!(loader.visible_items(), vec![1, 2]);
    assert_eq!(loader.numbered_page(), 1);
}

#[tokio::test]
async fn test_failure_then_retry() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let loader = FeedLoader::builder(source_fn(
        move |_cursor: PageCursor, _cancel: CancellationToken| {
            let call = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if call == 0 {
                    Err(FetchError::HttpStatus(502))
                } else {
                    Ok(FetchPage::Items(vec![1u32, 2, 3]))
                }
            }
        },
    ))
    .key(id_key)
    .build();

    let err = loader.fetch_more(false).await.unwrap_err();
    assert!(matches!(err, FetchError::HttpStatus(502)));
    assert!(loader.load_failed());
    assert_eq!(loader.phase(), LoadPhase::Idle);
    assert_eq!(loader.footer(), Footer::LoadFailed);
    assert!(!loader.wants_more(), "failed feeds wait for a manual retry");

    loader.fetch_more(false).await.unwrap();
    assert!(!loader.load_failed());
    assert_eq!(loader.visible_items(), vec![1, 2, 3]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_refresh_supersedes_request_in_flight() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let loader = FeedLoader::builder(source_fn(
        move |_cursor: PageCursor, _cancel: CancellationToken| {
            let call = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if call == 0 {
                    // Ignores cancellation entirely
                    std::future::pending::<()>().await;
                }
                Ok(FetchPage::Items(vec![10u32, 11]))
            }
        },
    ))
    .key(id_key)
    .build();

    let stale = tokio::spawn({
        let loader = loader.clone();
        async move { loader.fetch_more(false).await }
    });
    while calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }
    assert!(loader.is_loading());

    let fresh = loader.fetch_more(true).await.unwrap();
    assert_eq!(fresh, FetchOutcome::Loaded { received: 2, added: 2 });
    assert_eq!(stale.await.unwrap().unwrap(), FetchOutcome::Cancelled);
    assert_eq!(loader.visible_items(), vec![10, 11]);
}

#[tokio::test]
async fn test_server_cursor_is_followed() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let loader = FeedLoader::builder(source_fn(
        move |cursor: PageCursor, _cancel: CancellationToken| {
            log.lock().unwrap().push(cursor.clone());
            async move {
                Ok(match cursor {
                    PageCursor::Page(1) => FetchPage::Paged {
                        data: vec![1u32, 2],
                        next_page: Some("Pa2".into()),
                    },
                    PageCursor::Token(t) if t == "Pa2" => FetchPage::Paged {
                        data: vec![3],
                        next_page: None,
                    },
                    _ => FetchPage::Items(vec![]),
                })
            }
        },
    ))
    .key(id_key)
    .build();

    loader.fetch_more(false).await.unwrap();
    assert_eq!(loader.cursor(), PageCursor::Token("Pa2".into()));
    loader.fetch_more(false).await.unwrap();

    assert_eq!(loader.visible_items(), vec![1, 2, 3]);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![PageCursor::Page(1), PageCursor::Token("Pa2".into())]
    );
}

#[tokio::test]
async fn test_ingest_filter_exhaustion_stops_request_loop() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let loader = FeedLoader::builder(source_fn(
        move |cursor: PageCursor, _cancel: CancellationToken| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                let PageCursor::Page(n) = cursor else {
                    return Ok(FetchPage::Items(vec![]));
                };
                Ok(FetchPage::Items(vec![n * 100, n * 100 + 1]))
            }
        },
    ))
    .key(id_key)
    .ingest_filter(|_: &u32| false)
    .build();

    while !loader.is_at_end() {
        loader.fetch_more(false).await.unwrap();
        assert!(calls.load(Ordering::SeqCst) <= 25, "request loop did not terminate");
    }

    assert_eq!(calls.load(Ordering::SeqCst), 21);
    assert!(loader.visible_items().is_empty());
}

#[tokio::test]
async fn test_auto_fetch_stops_when_cursor_runs_out() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let loader = FeedLoader::builder(source_fn(
        move |cursor: PageCursor, _cancel: CancellationToken| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok(match cursor {
                    PageCursor::Page(_) => FetchPage::Paged {
                        data: vec![1u32, 2],
                        next_page: Some("Pa2".into()),
                    },
                    PageCursor::Token(_) => FetchPage::Paged {
                        data: vec![3],
                        next_page: None,
                    },
                })
            }
        },
    ))
    .key(id_key)
    .build();

    // Few items are visible, so the loader keeps asking for more
    while loader.wants_more() {
        loader.fetch_more(false).await.unwrap();
        assert!(calls.load(Ordering::SeqCst) <= 5, "same cursor requested repeatedly");
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(loader.is_at_end());
    assert_eq!(loader.footer(), Footer::End { empty: false });
    assert_eq!(loader.visible_items(), vec![1, 2, 3]);
    assert_eq!(
        loader.fetch_more(false).await.unwrap(),
        FetchOutcome::Skipped(SkipReason::AtEnd)
    );
}
