use super::*;
use std::collections::VecDeque;

use album_cache::AlbumCacheStore;
use async_trait::async_trait;
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{EventPage, GroupMembership, ImageRef},
};
use tokio::sync::{Mutex as AsyncMutex, Notify};

use crate::new_album_cache;

struct ScriptedListing {
    responses: AsyncMutex<VecDeque<Result<Vec<EventPage>, ClientError>>>,
    requests: Arc<AsyncMutex<Vec<PageRequest>>>,
}

impl ScriptedListing {
    fn new(responses: Vec<Result<Vec<EventPage>, ClientError>>) -> Self {
        Self {
            responses: AsyncMutex::new(responses.into()),
            requests: Arc::new(AsyncMutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl ImageListing for ScriptedListing {
    async fn list_images(&self, request: &PageRequest) -> Result<Vec<EventPage>, ClientError> {
        self.requests.lock().await.push(request.clone());
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

struct GatedListing {
    entered: Arc<Notify>,
    release: Arc<Notify>,
    calls: Arc<AsyncMutex<u32>>,
}

#[async_trait]
impl ImageListing for GatedListing {
    async fn list_images(&self, _request: &PageRequest) -> Result<Vec<EventPage>, ClientError> {
        *self.calls.lock().await += 1;
        self.entered.notify_one();
        self.release.notified().await;
        Ok(vec![page("Trip", "2024-01-01", "g", 0..4, 10)])
    }
}

/// Clears the shared cache while the page is on the wire.
struct ClearingListing {
    cache: AlbumCache,
}

#[async_trait]
impl ImageListing for ClearingListing {
    async fn list_images(&self, _request: &PageRequest) -> Result<Vec<EventPage>, ClientError> {
        self.cache.write().await.clear();
        Ok(vec![page("Trip", "2024-01-01", "t", 0..4, 8)])
    }
}

fn with_ids(event: &str, date: &str, ids: &[&str], total: u64) -> EventPage {
    EventPage {
        event: event.to_string(),
        date: date.to_string(),
        images: ids.iter().map(|id| ImageRef::new(*id)).collect(),
        total: Some(total),
    }
}

fn page(event: &str, date: &str, prefix: &str, ids: std::ops::Range<u32>, total: u64) -> EventPage {
    EventPage {
        event: event.to_string(),
        date: date.to_string(),
        images: ids.map(|i| ImageRef::new(format!("{prefix}{i}"))).collect(),
        total: Some(total),
    }
}

fn unavailable() -> ClientError {
    ClientError::Status {
        status: 503,
        error: ApiError::new(ErrorCode::Internal, "maintenance"),
    }
}

fn driver_with(listing: ScriptedListing) -> (PaginationDriver, Arc<AsyncMutex<Vec<PageRequest>>>) {
    let requests = Arc::clone(&listing.requests);
    let driver = PaginationDriver::new(Arc::new(listing), new_album_cache(AlbumCacheStore::new()));
    (driver, requests)
}

#[tokio::test]
async fn load_more_sends_cached_count_as_offset() {
    let (driver, requests) = driver_with(ScriptedListing::new(vec![
        Ok(vec![page("Birthday", "2024-05-01", "i", 1..5, 10)]),
        Ok(vec![page("Birthday", "2024-05-01", "i", 5..9, 10)]),
    ]));
    let album = AlbumId::from("A1");

    let first = driver.load_more(&album, "Main Album", 4).await;
    let second = driver.load_more(&album, "Main Album", 4).await;

    assert_eq!(
        first,
        PageOutcome::Fetched {
            before: 0,
            after: 4,
            received: 4,
            requested: 4
        }
    );
    assert_eq!(second.delta(), 4);
    let requests = requests.lock().await;
    assert_eq!(requests.len(), 2);
    assert_eq!((requests[0].loaded, requests[0].n), (0, 4));
    assert_eq!((requests[1].loaded, requests[1].n), (4, 4));
    assert_eq!(requests[1].album_id, album);
}

#[tokio::test]
async fn short_page_marks_album_exhausted() {
    let (driver, _requests) = driver_with(ScriptedListing::new(vec![Ok(vec![page(
        "Trip",
        "2024-01-01",
        "t",
        0..3,
        3,
    )])]));

    let outcome = driver.load_more(&AlbumId::from("A1"), "Main Album", 8).await;

    assert_eq!(outcome.delta(), 3);
    assert!(!outcome.has_more());
}

#[tokio::test]
async fn has_more_follows_delta_not_bucket_totals() {
    // Bucket totals say more exist, but the page came back short.
    let (driver, _requests) = driver_with(ScriptedListing::new(vec![Ok(vec![page(
        "Trip",
        "2024-01-01",
        "t",
        0..2,
        50,
    )])]));

    let outcome = driver.load_more(&AlbumId::from("A1"), "Main Album", 4).await;

    assert!(!outcome.has_more());
    let cache = driver.cache().read().await;
    assert!(cache.album("Main Album").expect("album").buckets()[0].load_more());
}

#[tokio::test]
async fn end_to_end_birthday_scenario() {
    let (driver, _requests) = driver_with(ScriptedListing::new(vec![
        Ok(vec![page("Birthday", "2024-05-01", "i", 1..5, 10)]),
        Ok(vec![page("Birthday", "2024-05-01", "i", 5..9, 10)]),
        Ok(vec![page("Birthday", "2024-05-01", "i", 9..11, 10)]),
    ]));
    driver.cache().write().await.declare_album("Main Album", Vec::new());
    let album = AlbumId::from("A1");

    let first = driver.load_more(&album, "Main Album", 4).await;
    {
        let cache = driver.cache().read().await;
        let bucket = cache
            .album("Main Album")
            .and_then(|a| a.bucket("Birthday", "2024-05-01"))
            .expect("bucket");
        assert_eq!((bucket.loaded(), bucket.total(), bucket.load_more()), (4, 10, true));
    }
    assert!(first.has_more());

    let second = driver.load_more(&album, "Main Album", 4).await;
    assert!(second.has_more());
    assert_eq!(driver.cache().read().await.loaded_count("Main Album"), 8);

    let third = driver.load_more(&album, "Main Album", 4).await;
    assert_eq!(third.delta(), 2);
    assert!(!third.has_more());
    let cache = driver.cache().read().await;
    let bucket = cache
        .album("Main Album")
        .and_then(|a| a.bucket("Birthday", "2024-05-01"))
        .expect("bucket");
    assert_eq!(bucket.loaded(), 10);
    assert!(!bucket.load_more());
}

#[tokio::test]
async fn failures_are_reported_as_exhaustion() {
    let (driver, _requests) = driver_with(ScriptedListing::new(vec![Err(unavailable())]));

    let outcome = driver.load_more(&AlbumId::from("A1"), "Main Album", 4).await;

    match &outcome {
        PageOutcome::Failed { reason } => assert!(reason.contains("503"), "reason: {reason}"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(!outcome.has_more());
    // The album is still declared so the view can render it empty.
    assert!(driver.cache().read().await.contains("Main Album"));
}

#[tokio::test]
async fn zero_batch_is_rejected_without_request() {
    let (driver, requests) = driver_with(ScriptedListing::new(Vec::new()));

    let outcome = driver.load_more(&AlbumId::from("A1"), "Main Album", 0).await;

    assert!(matches!(outcome, PageOutcome::Failed { .. }));
    assert!(requests.lock().await.is_empty());
}

#[tokio::test]
async fn overlapping_loads_for_one_album_fetch_once() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let calls = Arc::new(AsyncMutex::new(0));
    let listing = GatedListing {
        entered: Arc::clone(&entered),
        release: Arc::clone(&release),
        calls: Arc::clone(&calls),
    };
    let driver = Arc::new(PaginationDriver::new(
        Arc::new(listing),
        new_album_cache(AlbumCacheStore::new()),
    ));

    let background = Arc::clone(&driver);
    let first = tokio::spawn(async move {
        background
            .load_more(&AlbumId::from("A1"), "Main Album", 4)
            .await
    });
    entered.notified().await;

    let second = driver.load_more(&AlbumId::from("A1"), "Main Album", 4).await;
    assert_eq!(second, PageOutcome::AlreadyLoading);
    assert!(second.has_more());

    release.notify_one();
    let first = first.await.expect("join first load");
    assert_eq!(first.delta(), 4);
    assert_eq!(*calls.lock().await, 1);
    assert_eq!(driver.cache().read().await.loaded_count("Main Album"), 4);
}

#[tokio::test]
async fn in_flight_marker_is_released_after_failure() {
    let (driver, requests) = driver_with(ScriptedListing::new(vec![
        Err(unavailable()),
        Ok(vec![page("Trip", "2024-01-01", "t", 0..2, 2)]),
    ]));
    let album = AlbumId::from("A1");

    let _ = driver.load_more(&album, "Main Album", 2).await;
    let retry = driver.load_more(&album, "Main Album", 2).await;

    assert_eq!(retry.delta(), 2);
    assert_eq!(requests.lock().await.len(), 2);
}

#[tokio::test]
async fn initialize_albums_declares_main_and_group_albums() {
    let (driver, requests) = driver_with(ScriptedListing::new(Vec::new()));
    let profile = UserProfile {
        main_album: Some(AlbumId::from("1")),
        groups: vec![
            GroupMembership {
                album_id: Some(AlbumId::from("7")),
                group_name: Some("Family".into()),
            },
            GroupMembership {
                album_id: Some(AlbumId::from("8")),
                group_name: None,
            },
            GroupMembership {
                album_id: None,
                group_name: Some("Pending".into()),
            },
        ],
    };

    let albums = driver.initialize_albums(&profile).await;
    driver.initialize_albums(&profile).await;

    let names: Vec<_> = albums.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["Main Album", "Family", "Album-8"]);
    let cache = driver.cache().read().await;
    assert_eq!(cache.albums().len(), 3);
    assert!(cache.albums().iter().all(|a| a.buckets().is_empty()));
    assert!(requests.lock().await.is_empty());
}

#[test]
fn hidden_album_matches_group_name_case_insensitively() {
    let profile = UserProfile {
        main_album: None,
        groups: vec![
            GroupMembership {
                album_id: Some(AlbumId::from("3")),
                group_name: Some("Friends".into()),
            },
            GroupMembership {
                album_id: Some(AlbumId::from("4")),
                group_name: Some("Hidden".into()),
            },
        ],
    };

    let hidden = hidden_album(&profile).expect("hidden album");
    assert_eq!(hidden.id, AlbumId::from("4"));
    assert_eq!(hidden.name, "Hidden");
    assert!(hidden_album(&UserProfile::default()).is_none());
}

#[tokio::test]
async fn pager_stops_after_short_page() {
    let (driver, requests) = driver_with(ScriptedListing::new(vec![
        Ok(vec![page("Trip", "2024-01-01", "t", 0..5, 7)]),
        Ok(vec![page("Trip", "2024-01-01", "t", 5..7, 7)]),
    ]));
    let mut pager = AlbumPager::new(AlbumRef {
        id: AlbumId::from("A1"),
        name: "Main Album".into(),
    });
    assert_eq!(pager.state(), PagerState::Unloaded);

    assert!(pager.load_next(&driver, 5).await.is_some());
    assert_eq!(pager.state(), PagerState::Partial);
    assert!(pager.load_next(&driver, 5).await.is_some());
    assert_eq!(pager.state(), PagerState::Exhausted);
    assert!(pager.load_next(&driver, 5).await.is_none());
    assert_eq!(requests.lock().await.len(), 2);
}

#[test]
fn pager_resume_reads_cached_progress() {
    let mut store = AlbumCacheStore::new();
    store.declare_album("Empty", Vec::new());
    store.declare_album("Half", Vec::new());
    store
        .append_page("Half", "Trip", "2024-01-01", vec![ImageRef::new("a")], 2)
        .expect("append");
    store.declare_album("Done", Vec::new());
    store
        .append_page("Done", "Trip", "2024-01-01", vec![ImageRef::new("b")], 1)
        .expect("append");

    let album = |name: &str| AlbumRef {
        id: AlbumId::from(name),
        name: name.to_string(),
    };
    assert_eq!(AlbumPager::resume(album("Empty"), &store).state(), PagerState::Unloaded);
    assert_eq!(AlbumPager::resume(album("Half"), &store).state(), PagerState::Partial);
    assert_eq!(AlbumPager::resume(album("Done"), &store).state(), PagerState::Exhausted);
    assert_eq!(AlbumPager::resume(album("Unknown"), &store).state(), PagerState::Unloaded);
}

#[tokio::test]
async fn redelivered_images_do_not_end_the_album_early() {
    let (driver, requests) = driver_with(ScriptedListing::new(vec![
        Ok(vec![with_ids("Trip", "2024-01-01", &["a", "b", "b", "c"], 8)]),
        Ok(vec![with_ids("Trip", "2024-01-01", &["d", "e", "f", "g"], 8)]),
    ]));
    let album = AlbumId::from("A1");

    let first = driver.load_more(&album, "Main Album", 4).await;
    assert_eq!(
        first,
        PageOutcome::Fetched {
            before: 0,
            after: 3,
            received: 4,
            requested: 4
        }
    );
    assert!(first.has_more());

    let second = driver.load_more(&album, "Main Album", 4).await;
    assert_eq!(second.delta(), 4);
    let offsets: Vec<_> = requests.lock().await.iter().map(|r| r.loaded).collect();
    assert_eq!(offsets, vec![0, 4]);
    assert_eq!(driver.cache().read().await.loaded_count("Main Album"), 7);
}

#[tokio::test]
async fn album_cleared_mid_fetch_reports_failure() {
    let cache = new_album_cache(AlbumCacheStore::new());
    let listing = ClearingListing {
        cache: Arc::clone(&cache),
    };
    let driver = PaginationDriver::new(Arc::new(listing), cache);

    let outcome = driver.load_more(&AlbumId::from("A1"), "Main Album", 4).await;

    match &outcome {
        PageOutcome::Failed { reason } => {
            assert!(reason.contains("not in the cache"), "reason: {reason}")
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(!outcome.has_more());
    assert!(driver.cache().read().await.albums().is_empty());
}

#[tokio::test]
async fn albums_sharing_a_name_share_the_in_flight_marker() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let calls = Arc::new(AsyncMutex::new(0));
    let listing = GatedListing {
        entered: Arc::clone(&entered),
        release: Arc::clone(&release),
        calls: Arc::clone(&calls),
    };
    let driver = Arc::new(PaginationDriver::new(
        Arc::new(listing),
        new_album_cache(AlbumCacheStore::new()),
    ));

    let background = Arc::clone(&driver);
    let first = tokio::spawn(async move {
        background
            .load_more(&AlbumId::from("7"), "Family", 4)
            .await
    });
    entered.notified().await;

    let second = driver.load_more(&AlbumId::from("9"), "Family", 4).await;
    assert_eq!(second, PageOutcome::AlreadyLoading);

    release.notify_one();
    first.await.expect("join first load");
    assert_eq!(*calls.lock().await, 1);
}

#[test]
fn album_options_suffix_repeated_names() {
    let profile = UserProfile {
        main_album: Some(AlbumId::from("1")),
        groups: vec![
            GroupMembership {
                album_id: Some(AlbumId::from("7")),
                group_name: Some("Family".into()),
            },
            GroupMembership {
                album_id: Some(AlbumId::from("9")),
                group_name: Some("Family".into()),
            },
        ],
    };

    let names: Vec<_> = album_options(&profile).into_iter().map(|a| a.name).collect();
    assert_eq!(names, vec!["Main Album", "Family", "Family (9)"]);
}

#[test]
fn visible_options_leave_out_the_hidden_group() {
    let profile = UserProfile {
        main_album: Some(AlbumId::from("1")),
        groups: vec![
            GroupMembership {
                album_id: Some(AlbumId::from("4")),
                group_name: Some("HIDDEN".into()),
            },
            GroupMembership {
                album_id: Some(AlbumId::from("5")),
                group_name: Some("Friends".into()),
            },
        ],
    };

    let names: Vec<_> = visible_album_options(&profile)
        .into_iter()
        .map(|a| a.name)
        .collect();
    assert_eq!(names, vec!["Main Album", "Friends"]);
    assert_eq!(album_options(&profile).len(), 3);
}

#[test]
fn pager_resume_treats_zero_total_as_complete() {
    let mut store = AlbumCacheStore::new();
    store.declare_album("Zero", Vec::new());
    store
        .append_page("Zero", "Trip", "2024-01-01", vec![ImageRef::new("a")], 0)
        .expect("append");

    let pager = AlbumPager::resume(
        AlbumRef {
            id: AlbumId::from("Z"),
            name: "Zero".into(),
        },
        &store,
    );
    assert_eq!(pager.state(), PagerState::Exhausted);
}
