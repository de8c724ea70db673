//! Deterministic in-memory catalog for tests.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use super::wire::{PlaylistEntry, RawArtist, RawRelease, RawTrack};
use super::{ApiError, ApiResult, CatalogApi, Page, PLAYLIST_PAGE_SIZE};
use crate::models::FeatureVector;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    PlaylistItems(String, Option<String>),
    Playlist(String),
    FollowCursor(String),
    Search { offset: usize },
    NewReleases { offset: usize },
    ReleaseTracks(String),
    Track(String),
    AudioFeatures(Vec<String>),
}

type FeatureFailure = Box<dyn Fn(&[String]) -> Option<ApiError>>;

pub struct FakeCatalog {
    pub playlists: HashMap<String, Vec<PlaylistEntry>>,
    pub playlist_page_size: usize,
    pub failing_primary: HashSet<String>,
    pub failing_fallback: HashSet<String>,
    pub search_results: Vec<RawTrack>,
    pub failing_search_offsets: HashSet<usize>,
    /// Positions in `search_results` that arrive as null entries and are
    /// missing from their page.
    pub search_dropped: HashSet<usize>,
    pub releases: Vec<RawRelease>,
    pub release_tracks: HashMap<String, Vec<RawTrack>>,
    pub failing_releases: HashSet<String>,
    pub full_tracks: HashMap<String, RawTrack>,
    pub features: HashMap<String, FeatureVector>,
    /// Decides whether an audio-features request fails, given its ids.
    pub feature_failure: FeatureFailure,
    calls: RefCell<Vec<Call>>,
}

impl Default for FakeCatalog {
    fn default() -> Self {
        Self {
            playlists: HashMap::new(),
            playlist_page_size: PLAYLIST_PAGE_SIZE,
            failing_primary: HashSet::new(),
            failing_fallback: HashSet::new(),
            search_results: Vec::new(),
            failing_search_offsets: HashSet::new(),
            search_dropped: HashSet::new(),
            releases: Vec::new(),
            release_tracks: HashMap::new(),
            failing_releases: HashSet::new(),
            full_tracks: HashMap::new(),
            features: HashMap::new(),
            feature_failure: Box::new(|_: &[String]| None),
            calls: RefCell::new(Vec::new()),
        }
    }
}

/// Valid 22-char id derived from a number.
pub fn tid(n: usize) -> String {
    format!("trk{n:0>19}")
}

pub fn raw_track(id: &str, popularity: Option<u32>) -> RawTrack {
    RawTrack {
        id: Some(id.to_string()),
        name: Some(format!("Song {id}")),
        artists: Some(vec![Some(RawArtist { name: Some("Artist".into()) })]),
        popularity,
        duration_ms: Some(180_000),
        explicit: Some(false),
    }
}

pub fn entry(track: RawTrack) -> PlaylistEntry {
    PlaylistEntry { track: Some(track) }
}

pub fn features(energy: f64) -> FeatureVector {
    FeatureVector {
        energy: Some(energy),
        danceability: Some(0.5),
        key: Some(1),
        tempo: Some(120.0),
        ..FeatureVector::default()
    }
}

fn cursor(playlist_id: &str, offset: usize) -> String {
    format!("fake:{playlist_id}:{offset}")
}

fn parse_cursor(c: &str) -> Option<(String, usize)> {
    let mut parts = c.splitn(3, ':');
    if parts.next()? != "fake" {
        return None;
    }
    let id = parts.next()?.to_string();
    let offset = parts.next()?.parse().ok()?;
    Some((id, offset))
}

fn slice_page<T: Clone>(all: &[T], offset: usize, size: usize, next: impl Fn(usize) -> String) -> Page<T> {
    let end = (offset + size).min(all.len());
    let items = if offset < all.len() { all[offset..end].to_vec() } else { Vec::new() };
    let next = (end < all.len()).then(|| next(end));
    Page { items, next }
}

impl FakeCatalog {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn feature_calls(&self) -> Vec<Vec<String>> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Call::AudioFeatures(ids) => Some(ids.clone()),
                _ => None,
            })
            .collect()
    }

    /// Playlist of full tracks with popularity 50.
    pub fn with_playlist(mut self, playlist_id: &str, ids: &[String]) -> Self {
        let entries = ids.iter().map(|id| entry(raw_track(id, Some(50)))).collect();
        self.playlists.insert(playlist_id.to_string(), entries);
        self
    }

    /// Features for every given id.
    pub fn with_features(mut self, ids: &[String]) -> Self {
        for (i, id) in ids.iter().enumerate() {
            self.features.insert(id.clone(), features(i as f64 / 100.0));
        }
        self
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn playlist_page(&self, playlist_id: &str, offset: usize) -> ApiResult<Page<PlaylistEntry>> {
        let entries = self
            .playlists
            .get(playlist_id)
            .ok_or_else(|| ApiError::status(404, format!("no playlist {playlist_id}")))?;
        Ok(slice_page(entries, offset, self.playlist_page_size, |o| cursor(playlist_id, o)))
    }
}

impl CatalogApi for FakeCatalog {
    fn playlist_items(&self, playlist_id: &str, cursor: Option<&str>) -> ApiResult<Page<PlaylistEntry>> {
        self.record(Call::PlaylistItems(playlist_id.to_string(), cursor.map(String::from)));
        if self.failing_primary.contains(playlist_id) {
            return Err(ApiError::status(500, "primary listing down"));
        }
        let offset = match cursor {
            Some(c) => parse_cursor(c).map(|(_, o)| o).ok_or_else(|| ApiError::status(400, "bad cursor"))?,
            None => 0,
        };
        self.playlist_page(playlist_id, offset)
    }

    fn playlist(&self, playlist_id: &str) -> ApiResult<Page<PlaylistEntry>> {
        self.record(Call::Playlist(playlist_id.to_string()));
        if self.failing_fallback.contains(playlist_id) {
            return Err(ApiError::status(404, "playlist object unavailable"));
        }
        self.playlist_page(playlist_id, 0)
    }

    fn follow_playlist_cursor(&self, c: &str) -> ApiResult<Page<PlaylistEntry>> {
        self.record(Call::FollowCursor(c.to_string()));
        let (id, offset) = parse_cursor(c).ok_or_else(|| ApiError::status(400, "bad cursor"))?;
        self.playlist_page(&id, offset)
    }

    fn search_tracks(&self, _query: &str, offset: usize, page_size: usize) -> ApiResult<Page<RawTrack>> {
        self.record(Call::Search { offset });
        if self.failing_search_offsets.contains(&offset) {
            return Err(ApiError::status(502, "search unavailable"));
        }
        let mut page = slice_page(&self.search_results, offset, page_size, |o| format!("fake:search:{o}"));
        let mut pos = offset;
        page.items.retain(|_| {
            let keep = !self.search_dropped.contains(&pos);
            pos += 1;
            keep
        });
        Ok(page)
    }

    fn new_releases(&self, offset: usize, page_size: usize) -> ApiResult<Page<RawRelease>> {
        self.record(Call::NewReleases { offset });
        Ok(slice_page(&self.releases, offset, page_size, |o| format!("fake:releases:{o}")))
    }

    fn release_tracks(&self, release_id: &str, page_size: usize) -> ApiResult<Page<RawTrack>> {
        self.record(Call::ReleaseTracks(release_id.to_string()));
        if self.failing_releases.contains(release_id) {
            return Err(ApiError::status(503, "release unavailable"));
        }
        let tracks = self.release_tracks.get(release_id).cloned().unwrap_or_default();
        Ok(slice_page(&tracks, 0, page_size, |o| format!("fake:release:{o}")))
    }

    fn track(&self, track_id: &str) -> ApiResult<RawTrack> {
        self.record(Call::Track(track_id.to_string()));
        self.full_tracks
            .get(track_id)
            .cloned()
            .ok_or_else(|| ApiError::status(404, format!("no track {track_id}")))
    }

    fn audio_features(&self, track_ids: &[String]) -> ApiResult<Vec<Option<FeatureVector>>> {
        self.record(Call::AudioFeatures(track_ids.to_vec()));
        if let Some(e) = (self.feature_failure)(track_ids) {
            return Err(e);
        }
        Ok(track_ids.iter().map(|id| self.features.get(id).cloned()).collect())
    }
}
