//! JSON shapes returned by the catalog API.
//!
//! Everything is optional here; [`RawTrack::into_track_ref`] is the single
//! place where missing fields become the data model's absence markers.

use serde::Deserialize;

use super::Page;
use crate::ids::is_valid_track_id;
use crate::models::{FeatureVector, TrackRef};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawArtist {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawTrack {
    pub id: Option<String>,
    pub name: Option<String>,
    pub artists: Option<Vec<Option<RawArtist>>>,
    pub popularity: Option<u32>,
    pub duration_ms: Option<u64>,
    pub explicit: Option<bool>,
}

impl RawTrack {
    /// Id if present and well-formed.
    pub fn valid_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| is_valid_track_id(id))
    }

    /// Normalize into a [`TrackRef`]; `None` when the id is missing or malformed.
    pub fn into_track_ref(self) -> Option<TrackRef> {
        let id = self.valid_id()?.to_string();
        let artists = self
            .artists
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .filter_map(|a| a.name)
            .collect();
        Some(TrackRef {
            id,
            name: self.name.unwrap_or_default(),
            artists,
            popularity: self.popularity,
            duration_ms: self.duration_ms,
            explicit: self.explicit.unwrap_or(false),
        })
    }
}

/// Playlist item wrapper. `track` is null for removed or local items.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlaylistEntry {
    pub track: Option<RawTrack>,
}

/// A release (album) from the new-releases listing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawRelease {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// Paging object as it appears on the wire. Items may be null.
#[derive(Debug, Deserialize)]
pub struct WirePage<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<Option<T>>,
    #[serde(default)]
    pub next: Option<String>,
}

impl<T> From<WirePage<T>> for Page<T> {
    fn from(w: WirePage<T>) -> Self {
        Page {
            items: w.items.into_iter().flatten().collect(),
            next: w.next,
        }
    }
}

/// `GET /playlists/{id}`: only the nested item page matters.
#[derive(Debug, Deserialize)]
pub struct PlaylistObject {
    pub tracks: Option<WirePage<PlaylistEntry>>,
}

/// `GET /search?type=track`
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub tracks: Option<WirePage<RawTrack>>,
}

/// `GET /browse/new-releases`
#[derive(Debug, Deserialize)]
pub struct NewReleasesResponse {
    pub albums: Option<WirePage<RawRelease>>,
}

/// `GET /audio-features?ids=...`
#[derive(Debug, Deserialize)]
pub struct FeaturesResponse {
    #[serde(default)]
    pub audio_features: Vec<Option<FeatureVector>>,
}

/// Client-credentials token grant.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}
