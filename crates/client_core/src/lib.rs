use std::sync::Arc;

use album_cache::{AlbumCacheStore, CacheError};
use async_trait::async_trait;
use shared::{
    error::ApiError,
    protocol::{EventPage, PageRequest},
};
use thiserror::Error;
use tokio::sync::RwLock;

pub mod api;
pub mod batch;
pub mod pagination;

pub use api::AlbumApiClient;
pub use pagination::{
    album_options, hidden_album, visible_album_options, AlbumPager, AlbumRef, PageOutcome,
    PagerState, PaginationDriver, MAIN_ALBUM_NAME,
};

/// Shared handle to the album cache. Writers never hold it across an await.
pub type AlbumCache = Arc<RwLock<AlbumCacheStore>>;

pub fn new_album_cache(store: AlbumCacheStore) -> AlbumCache {
    Arc::new(RwLock::new(store))
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server responded with status {status}: {error}")]
    Status { status: u16, error: ApiError },
    #[error("invalid base url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Paginated image listing for one album, offset by the number of images the
/// caller already holds.
#[async_trait]
pub trait ImageListing: Send + Sync {
    async fn list_images(&self, request: &PageRequest) -> Result<Vec<EventPage>, ClientError>;
}
