use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard},
};

use album_cache::AlbumCacheStore;
use serde::Serialize;
use shared::{
    domain::AlbumId,
    protocol::{PageRequest, UserProfile},
};
use tracing::{debug, info, warn};

use crate::{AlbumCache, ClientError, ImageListing};

pub const MAIN_ALBUM_NAME: &str = "Main Album";
const HIDDEN_GROUP_NAME: &str = "hidden";

/// An album the user can open: server id plus the display name the cache keys on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlbumRef {
    pub id: AlbumId,
    pub name: String,
}

/// Albums reachable from a profile: the main album first, then every group
/// that has an album attached. The cache keys albums by name, so a repeated
/// name gets the album id appended.
pub fn album_options(profile: &UserProfile) -> Vec<AlbumRef> {
    let main = profile.main_album.clone().map(|id| AlbumRef {
        id,
        name: MAIN_ALBUM_NAME.to_string(),
    });
    let groups = profile.groups.iter().filter_map(|group| {
        let id = group.album_id.clone()?;
        let name = match group.group_name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("Album-{id}"),
        };
        Some(AlbumRef { id, name })
    });

    let mut taken = HashSet::new();
    main.into_iter()
        .chain(groups)
        .map(|mut album| {
            if !taken.insert(album.name.clone()) {
                album.name = format!("{} ({})", album.name, album.id);
                taken.insert(album.name.clone());
            }
            album
        })
        .collect()
}

/// [`album_options`] without the hidden group, which only opens through
/// [`hidden_album`].
pub fn visible_album_options(profile: &UserProfile) -> Vec<AlbumRef> {
    album_options(profile)
        .into_iter()
        .filter(|album| !is_hidden_name(&album.name))
        .collect()
}

pub fn hidden_album(profile: &UserProfile) -> Option<AlbumRef> {
    profile.groups.iter().find_map(|group| {
        let name = group.group_name.as_deref()?;
        if !is_hidden_name(name) {
            return None;
        }
        Some(AlbumRef {
            id: group.album_id.clone()?,
            name: name.to_string(),
        })
    })
}

fn is_hidden_name(name: &str) -> bool {
    name.eq_ignore_ascii_case(HIDDEN_GROUP_NAME)
}

/// Result of one `load_more` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// `before`/`after` count cached images; `received` counts what the
    /// server sent, duplicates included.
    Fetched {
        before: u64,
        after: u64,
        received: u64,
        requested: u32,
    },
    /// Another load for the same album was still outstanding; nothing was fetched.
    AlreadyLoading,
    Failed { reason: String },
}

impl PageOutcome {
    pub fn delta(&self) -> u64 {
        match self {
            Self::Fetched { before, after, .. } => after.saturating_sub(*before),
            Self::AlreadyLoading | Self::Failed { .. } => 0,
        }
    }

    /// A page shorter than requested means the album is exhausted. Failures
    /// count as exhausted too.
    pub fn has_more(&self) -> bool {
        match self {
            Self::Fetched {
                received,
                requested,
                ..
            } => *received >= u64::from(*requested),
            Self::AlreadyLoading => true,
            Self::Failed { .. } => false,
        }
    }
}

/// Fetches the next window of images for an album and merges it into the cache.
pub struct PaginationDriver {
    listing: Arc<dyn ImageListing>,
    cache: AlbumCache,
    inflight: Mutex<HashSet<String>>,
}

impl PaginationDriver {
    pub fn new(listing: Arc<dyn ImageListing>, cache: AlbumCache) -> Self {
        Self {
            listing,
            cache,
            inflight: Mutex::new(HashSet::new()),
        }
    }

    pub fn cache(&self) -> &AlbumCache {
        &self.cache
    }

    /// Declares an empty album for the main album and every group album of the profile.
    pub async fn initialize_albums(&self, profile: &UserProfile) -> Vec<AlbumRef> {
        let albums = album_options(profile);
        let mut cache = self.cache.write().await;
        for album in &albums {
            cache.declare_album(&album.name, Vec::new());
        }
        info!(count = albums.len(), "initialized albums from profile");
        albums
    }

    pub async fn load_more(&self, album_id: &AlbumId, album_name: &str, n: u32) -> PageOutcome {
        if n == 0 {
            warn!(album = %album_id, "refusing to request an empty page");
            return PageOutcome::Failed {
                reason: "batch size must be positive".into(),
            };
        }

        // Keyed by cache name: two album ids sharing a name write the same entry.
        let Some(_guard) = InFlightGuard::acquire(&self.inflight, album_name) else {
            debug!(album = %album_id, "load already in flight");
            return PageOutcome::AlreadyLoading;
        };

        let (before, cursor) = {
            let mut cache = self.cache.write().await;
            cache.declare_album(album_name, Vec::new());
            (cache.loaded_count(album_name), cache.cursor(album_name))
        };

        match self.fetch_and_merge(album_id, album_name, cursor, n).await {
            Ok((after, received)) => {
                info!(
                    album = %album_id,
                    name = album_name,
                    before,
                    after,
                    received,
                    requested = n,
                    "loaded image page"
                );
                PageOutcome::Fetched {
                    before,
                    after,
                    received,
                    requested: n,
                }
            }
            Err(err) => {
                warn!(album = %album_id, name = album_name, error = %err, "failed to load images");
                PageOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn fetch_and_merge(
        &self,
        album_id: &AlbumId,
        album_name: &str,
        loaded: u64,
        n: u32,
    ) -> Result<(u64, u64), ClientError> {
        let pages = self
            .listing
            .list_images(&PageRequest {
                album_id: album_id.clone(),
                loaded,
                n,
            })
            .await?;

        let mut cache = self.cache.write().await;
        let mut received = 0;
        for page in pages {
            let total = page.total.unwrap_or(page.images.len() as u64);
            let appended =
                cache.append_page(album_name, &page.event, &page.date, page.images, total)?;
            received += appended.received as u64;
        }
        Ok((cache.loaded_count(album_name), received))
    }
}

/// Marks an album as loading until dropped.
struct InFlightGuard<'a> {
    inflight: &'a Mutex<HashSet<String>>,
    album: String,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(inflight: &'a Mutex<HashSet<String>>, album: &str) -> Option<Self> {
        if !lock_inflight(inflight).insert(album.to_string()) {
            return None;
        }
        Some(Self {
            inflight,
            album: album.to_string(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        lock_inflight(self.inflight).remove(&self.album);
    }
}

fn lock_inflight(inflight: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    inflight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerState {
    Unloaded,
    Partial,
    Exhausted,
}

/// Caller-side paging state for one album, the way an infinite-scroll view
/// tracks it: keep loading until a short page comes back.
#[derive(Debug, Clone)]
pub struct AlbumPager {
    album: AlbumRef,
    state: PagerState,
}

impl AlbumPager {
    pub fn new(album: AlbumRef) -> Self {
        Self {
            album,
            state: PagerState::Unloaded,
        }
    }

    /// Picks up an album that may already hold images from an earlier visit.
    pub fn resume(album: AlbumRef, store: &AlbumCacheStore) -> Self {
        let state = match store.album(&album.name) {
            Some(cached) if cached.buckets().is_empty() => PagerState::Unloaded,
            Some(cached) if cached.is_fully_loaded() => PagerState::Exhausted,
            Some(_) => PagerState::Partial,
            None => PagerState::Unloaded,
        };
        Self { album, state }
    }

    pub fn album(&self) -> &AlbumRef {
        &self.album
    }

    pub fn state(&self) -> PagerState {
        self.state
    }

    pub fn has_more(&self) -> bool {
        self.state != PagerState::Exhausted
    }

    /// Loads the next batch unless the album is exhausted.
    pub async fn load_next(&mut self, driver: &PaginationDriver, n: u32) -> Option<PageOutcome> {
        if !self.has_more() {
            return None;
        }
        let outcome = driver.load_more(&self.album.id, &self.album.name, n).await;
        match &outcome {
            PageOutcome::AlreadyLoading => {}
            outcome if outcome.has_more() => self.state = PagerState::Partial,
            _ => self.state = PagerState::Exhausted,
        }
        Some(outcome)
    }
}

#[cfg(test)]
#[path = "tests/pagination_tests.rs"]
mod tests;
