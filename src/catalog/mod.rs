//! Catalog capability: the paginated list/get calls the acquisition layer
//! depends on, plus the error shape every call fails with.

#[cfg(test)]
pub mod fake;
pub mod http;
pub mod wire;

use thiserror::Error;

use crate::models::FeatureVector;
use wire::{PlaylistEntry, RawRelease, RawTrack};

/// What went wrong on a catalog call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// The server answered with a non-success status.
    Status,
    /// Connection, TLS or timeout failure.
    Transport,
    /// Response body did not match the expected shape.
    Decode,
    /// Token request failed or no credentials configured.
    Auth,
}

#[derive(Error, Debug, Clone)]
#[error("{kind:?} error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
pub struct ApiError {
    pub kind: ApiErrorKind,
    /// HTTP status, when the failure carried one.
    pub status: Option<u16>,
    pub message: String,
}

impl ApiError {
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self { kind: ApiErrorKind::Status, status: Some(code), message: message.into() }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self { kind: ApiErrorKind::Transport, status: None, message: message.into() }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self { kind: ApiErrorKind::Decode, status: None, message: message.into() }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self { kind: ApiErrorKind::Auth, status: None, message: message.into() }
    }

    /// Request rejected as malformed or forbidden (400/403).
    /// Only this class is worth retrying at a finer batch granularity.
    /// A missing status never counts.
    pub fn is_client_rejection(&self) -> bool {
        matches!(self.status, Some(400) | Some(403))
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// One page of a listing plus the cursor to the next page, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self { items: Vec::new(), next: None }
    }
}

/// Page size for playlist item listings.
pub const PLAYLIST_PAGE_SIZE: usize = 100;
/// Maximum ids per audio-features request.
pub const FEATURES_MAX_IDS: usize = 50;

/// The catalog calls used by acquisition and enrichment.
///
/// Implementations own transport concerns (auth, timeouts, transport-level
/// retries). Every method may fail with an [`ApiError`].
pub trait CatalogApi {
    /// First page of a playlist's items when `cursor` is `None`,
    /// otherwise the page the cursor points to.
    fn playlist_items(&self, playlist_id: &str, cursor: Option<&str>) -> ApiResult<Page<PlaylistEntry>>;

    /// Whole playlist object; returns its embedded first page of items.
    fn playlist(&self, playlist_id: &str) -> ApiResult<Page<PlaylistEntry>>;

    /// Follow a raw cursor URL taken from a playlist object's item page.
    fn follow_playlist_cursor(&self, cursor: &str) -> ApiResult<Page<PlaylistEntry>>;

    fn search_tracks(&self, query: &str, offset: usize, page_size: usize) -> ApiResult<Page<RawTrack>>;

    fn new_releases(&self, offset: usize, page_size: usize) -> ApiResult<Page<RawRelease>>;

    /// Simplified tracks of a release (no popularity).
    fn release_tracks(&self, release_id: &str, page_size: usize) -> ApiResult<Page<RawTrack>>;

    /// Full track object.
    fn track(&self, track_id: &str) -> ApiResult<RawTrack>;

    /// Features for up to [`FEATURES_MAX_IDS`] ids, positionally aligned with
    /// the request. A position may be `None`.
    fn audio_features(&self, track_ids: &[String]) -> ApiResult<Vec<Option<FeatureVector>>>;
}
