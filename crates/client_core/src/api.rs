use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{AlbumId, ImageId},
    error::ApiError,
    protocol::{
        DeleteAlbumRequest, DeleteImagesRequest, EditImagesRequest, EventPage, ImageIdsRequest,
        LinksResponse, PageRequest, UserProfile,
    },
};
use tracing::{debug, warn};
use url::Url;

use crate::{ClientError, ImageListing};

/// HTTP client for the album service. Every request carries the bearer token
/// when one is set.
#[derive(Debug, Clone)]
pub struct AlbumApiClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum LinkKind {
    Thumbnail,
    View,
    Download,
}

impl LinkKind {
    fn path(self) -> &'static str {
        match self {
            Self::Thumbnail => "thumbnails",
            Self::View => "view",
            Self::Download => "download",
        }
    }
}

impl AlbumApiClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            http: Client::new(),
            base_url: parse_base_url(base_url)?,
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ClientError> {
        self.http = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn fetch_profile(&self) -> Result<UserProfile, ClientError> {
        let request = self.http.get(self.endpoint(&["me"]));
        self.send_json(request).await
    }

    pub async fn thumbnail_links(&self, image_ids: &[ImageId]) -> Result<Vec<String>, ClientError> {
        self.links(LinkKind::Thumbnail, image_ids).await
    }

    pub async fn view_links(&self, image_ids: &[ImageId]) -> Result<Vec<String>, ClientError> {
        self.links(LinkKind::View, image_ids).await
    }

    pub async fn download_links(&self, image_ids: &[ImageId]) -> Result<Vec<String>, ClientError> {
        self.links(LinkKind::Download, image_ids).await
    }

    pub async fn edit_images(
        &self,
        request: &EditImagesRequest,
    ) -> Result<serde_json::Value, ClientError> {
        let request = self.http.post(self.endpoint(&["edit"])).json(request);
        self.send_json(request).await
    }

    pub async fn delete_images(
        &self,
        request: &DeleteImagesRequest,
    ) -> Result<serde_json::Value, ClientError> {
        let request = self.http.post(self.endpoint(&["delete"])).json(request);
        self.send_json(request).await
    }

    /// Soft-deletes an album on the server.
    pub async fn delete_album(&self, album_id: &AlbumId) -> Result<serde_json::Value, ClientError> {
        let request = self
            .http
            .delete(self.endpoint(&["album", "delete"]))
            .json(&DeleteAlbumRequest {
                album_id: album_id.clone(),
            });
        self.send_json(request).await
    }

    async fn links(&self, kind: LinkKind, image_ids: &[ImageId]) -> Result<Vec<String>, ClientError> {
        if image_ids.is_empty() {
            return Ok(Vec::new());
        }
        let request = self
            .http
            .post(self.endpoint(&[kind.path()]))
            .json(&ImageIdsRequest {
                image_ids: image_ids.to_vec(),
            });
        let response: LinksResponse = self.send_json(request).await?;
        if response.urls.len() != image_ids.len() {
            warn!(
                kind = kind.path(),
                requested = image_ids.len(),
                returned = response.urls.len(),
                "link count does not match requested images"
            );
        }
        Ok(response.urls)
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Status {
            status: status.as_u16(),
            error: ApiError::from_response(status.as_u16(), &body),
        })
    }
}

#[async_trait]
impl ImageListing for AlbumApiClient {
    async fn list_images(&self, request: &PageRequest) -> Result<Vec<EventPage>, ClientError> {
        debug!(
            album = %request.album_id,
            loaded = request.loaded,
            n = request.n,
            "requesting image page"
        );
        let http_request = self
            .http
            .get(self.endpoint(&["albums", request.album_id.as_str(), "images"]))
            .query(request);
        self.send_json(http_request).await
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    let url = Url::parse(raw.trim()).map_err(|e| ClientError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ClientError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: "expected an http(s) url".into(),
        });
    }
    Ok(url)
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
