//! In-memory album cache: albums, their event buckets and the images loaded so
//! far for each bucket. Purely synchronous; callers share it behind a lock.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use shared::{
    domain::{EventKey, ImageId, NormalizedDate},
    protocol::{EventPage, ImageRef},
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("album '{name}' is not in the cache")]
    UnknownAlbum { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Drop images whose id is already present in the target bucket.
    pub dedupe_images: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            dedupe_images: true,
        }
    }
}

/// What one append did to a bucket: images the server delivered and images
/// actually kept after dedupe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Appended {
    pub received: usize,
    pub added: usize,
}

/// Initial or merged content for one bucket, as handed to [`AlbumCacheStore::declare_album`].
#[derive(Debug, Clone, PartialEq)]
pub struct BucketSeed {
    pub event: String,
    pub date: String,
    pub images: Vec<ImageRef>,
    pub total: Option<u64>,
}

impl From<EventPage> for BucketSeed {
    fn from(page: EventPage) -> Self {
        Self {
            event: page.event,
            date: page.date,
            images: page.images,
            total: page.total,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBucket {
    key: EventKey,
    images: Vec<ImageRef>,
    seen: HashSet<ImageId>,
    received: u64,
    total: u64,
}

impl EventBucket {
    fn new(key: EventKey) -> Self {
        Self {
            key,
            images: Vec::new(),
            seen: HashSet::new(),
            received: 0,
            total: 0,
        }
    }

    pub fn key(&self) -> &EventKey {
        &self.key
    }

    pub fn event(&self) -> &str {
        &self.key.event
    }

    pub fn date(&self) -> &NormalizedDate {
        &self.key.date
    }

    pub fn images(&self) -> &[ImageRef] {
        &self.images
    }

    pub fn loaded(&self) -> u64 {
        self.images.len() as u64
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn load_more(&self) -> bool {
        self.loaded() < self.total
    }

    /// Images the server has delivered for this bucket, duplicates included.
    pub fn received(&self) -> u64 {
        self.received
    }

    fn push_images(&mut self, images: Vec<ImageRef>, dedupe: bool) -> Appended {
        let before = self.images.len();
        let received = images.len();
        self.received += received as u64;
        for image in images {
            let fresh = self.seen.insert(image.id.clone());
            if dedupe && !fresh {
                continue;
            }
            self.images.push(image);
        }
        Appended {
            received,
            added: self.images.len() - before,
        }
    }

    /// A total of 0 means the server did not know; a new bucket then counts
    /// what it holds.
    fn set_total(&mut self, total: u64, created: bool) {
        if total > 0 {
            self.total = total;
        } else if created {
            self.total = self.loaded();
        }
    }
}

#[derive(Debug, Clone)]
pub struct Album {
    name: String,
    buckets: Vec<EventBucket>,
    index: HashMap<EventKey, usize>,
}

impl Album {
    fn new(name: String) -> Self {
        Self {
            name,
            buckets: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn buckets(&self) -> &[EventBucket] {
        &self.buckets
    }

    pub fn bucket(&self, event: &str, date: &str) -> Option<&EventBucket> {
        self.index
            .get(&EventKey::new(event, date))
            .map(|&idx| &self.buckets[idx])
    }

    /// Sum of loaded images across all buckets; the offset for the next page.
    pub fn loaded(&self) -> u64 {
        self.buckets.iter().map(EventBucket::loaded).sum()
    }

    /// Server offset for the next page. Equals [`Album::loaded`] unless the
    /// server re-sent images that dedupe dropped.
    pub fn cursor(&self) -> u64 {
        self.buckets.iter().map(EventBucket::received).sum()
    }

    pub fn is_fully_loaded(&self) -> bool {
        !self.buckets.is_empty()
            && self
                .buckets
                .iter()
                .all(|bucket| bucket.total > 0 && bucket.loaded() >= bucket.total)
    }

    fn bucket_mut(&mut self, key: EventKey) -> (&mut EventBucket, bool) {
        let (idx, created) = match self.index.get(&key) {
            Some(&idx) => (idx, false),
            None => {
                debug!(album = %self.name, bucket = %key, "creating event bucket");
                self.buckets.push(EventBucket::new(key.clone()));
                let idx = self.buckets.len() - 1;
                self.index.insert(key, idx);
                (idx, true)
            }
        };
        (&mut self.buckets[idx], created)
    }

    fn merge_seed(&mut self, seed: BucketSeed, dedupe: bool) {
        let key = EventKey::new(seed.event, &seed.date);
        let (bucket, created) = self.bucket_mut(key);
        bucket.push_images(seed.images, dedupe);
        bucket.set_total(seed.total.unwrap_or(0), created);
    }
}

#[derive(Debug, Default)]
pub struct AlbumCacheStore {
    options: StoreOptions,
    albums: Vec<Album>,
    index: HashMap<String, usize>,
}

impl AlbumCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: StoreOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    /// Creates the album if it is unknown, then merges every seed into it by
    /// `(event, date)`. Seeds with a `total` override the bucket's total.
    pub fn declare_album(&mut self, name: &str, buckets: Vec<BucketSeed>) {
        let dedupe = self.options.dedupe_images;
        let album = self.album_entry(name);
        for seed in buckets {
            album.merge_seed(seed, dedupe);
        }
    }

    /// Appends one page of images to a bucket of a known album and sets the
    /// bucket's total. A zero total on a new bucket falls back to its image count.
    pub fn append_page(
        &mut self,
        album: &str,
        event: &str,
        date: &str,
        images: Vec<ImageRef>,
        total: u64,
    ) -> Result<Appended, CacheError> {
        let dedupe = self.options.dedupe_images;
        let idx = *self
            .index
            .get(album)
            .ok_or_else(|| CacheError::UnknownAlbum {
                name: album.to_string(),
            })?;
        let (bucket, created) = self.albums[idx].bucket_mut(EventKey::new(event, date));
        let appended = bucket.push_images(images, dedupe);
        if created {
            bucket.set_total(total, true);
        } else {
            bucket.total = total;
        }
        Ok(appended)
    }

    pub fn album(&self, name: &str) -> Option<&Album> {
        self.index.get(name).map(|&idx| &self.albums[idx])
    }

    pub fn albums(&self) -> &[Album] {
        &self.albums
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn loaded_count(&self, name: &str) -> u64 {
        self.album(name).map(Album::loaded).unwrap_or(0)
    }

    pub fn cursor(&self, name: &str) -> u64 {
        self.album(name).map(Album::cursor).unwrap_or(0)
    }

    pub fn is_fully_loaded(&self, name: &str) -> bool {
        self.album(name).is_some_and(Album::is_fully_loaded)
    }

    /// Forgets every album. The only way back out of an exhausted album.
    pub fn clear(&mut self) {
        self.albums.clear();
        self.index.clear();
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            albums: self
                .albums
                .iter()
                .map(|album| AlbumSnapshot {
                    name: album.name.clone(),
                    data: album
                        .buckets
                        .iter()
                        .map(|bucket| BucketSnapshot {
                            event: bucket.key.event.clone(),
                            date: bucket.key.date.clone(),
                            images: bucket.images.clone(),
                            loaded: bucket.loaded(),
                            total: bucket.total,
                            load_more: bucket.load_more(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    fn album_entry(&mut self, name: &str) -> &mut Album {
        let idx = match self.index.get(name) {
            Some(&idx) => idx,
            None => {
                debug!(album = name, "declaring album");
                self.albums.push(Album::new(name.to_string()));
                let idx = self.albums.len() - 1;
                self.index.insert(name.to_string(), idx);
                idx
            }
        };
        &mut self.albums[idx]
    }
}

/// Render-ready copy of the cache with the derived counters filled in.
#[derive(Debug, Clone, Serialize)]
pub struct CacheSnapshot {
    pub albums: Vec<AlbumSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlbumSnapshot {
    pub name: String,
    pub data: Vec<BucketSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketSnapshot {
    pub event: String,
    pub date: NormalizedDate,
    pub images: Vec<ImageRef>,
    pub loaded: u64,
    pub total: u64,
    pub load_more: bool,
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
