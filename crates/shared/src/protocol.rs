use serde::{Deserialize, Serialize};

use crate::domain::{AlbumId, ImageId};

/// One image as listed by the album service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub id: ImageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_key: Option<String>,
    #[serde(default, alias = "type", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Fields this client does not interpret, kept so renderers still see them.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ImageRef {
    pub fn new(id: impl Into<ImageId>) -> Self {
        Self {
            id: id.into(),
            key: None,
            thumbnail_key: None,
            mime_type: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// One event bucket worth of images returned by a page request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPage {
    pub event: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

/// Query for the next window of an album's images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    #[serde(skip)]
    pub album_id: AlbumId,
    pub loaded: u64,
    pub n: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMembership {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_id: Option<AlbumId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, alias = "mainAlbumId", skip_serializing_if = "Option::is_none")]
    pub main_album: Option<AlbumId>,
    #[serde(default)]
    pub groups: Vec<GroupMembership>,
}

impl UserProfile {
    /// Every album id the user can see, groups first then the main album.
    pub fn album_ids(&self) -> Vec<AlbumId> {
        self.groups
            .iter()
            .filter_map(|group| group.album_id.clone())
            .chain(self.main_album.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageIdsRequest {
    pub image_ids: Vec<ImageId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinksResponse {
    #[serde(default)]
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditImagesRequest {
    pub album_ids: Vec<AlbumId>,
    pub image_ids: Vec<ImageId>,
    pub event: String,
    pub date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteImagesRequest {
    pub album_id: AlbumId,
    pub album_ids: Vec<AlbumId>,
    pub image_ids: Vec<ImageId>,
    pub permanently: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAlbumRequest {
    pub album_id: AlbumId,
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
