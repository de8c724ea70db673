use serde::{Deserialize, Serialize};

/// A track captured by one of the listing strategies.
///
/// Only built through [`crate::catalog::wire::RawTrack::into_track_ref`], which
/// guarantees a validated id.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackRef {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    /// Absent in simplified listings (e.g. tracks of a release).
    pub popularity: Option<u32>,
    pub duration_ms: Option<u64>,
    pub explicit: bool,
}

/// Audio features for one track. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FeatureVector {
    pub danceability: Option<f64>,
    pub energy: Option<f64>,
    pub key: Option<i32>,
    pub loudness: Option<f64>,
    pub mode: Option<i32>,
    pub speechiness: Option<f64>,
    pub acousticness: Option<f64>,
    pub instrumentalness: Option<f64>,
    pub liveness: Option<f64>,
    pub valence: Option<f64>,
    pub tempo: Option<f64>,
    pub time_signature: Option<i32>,
}

/// Flat per-track record handed to the modeling stage.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    pub popularity: u32,
    pub duration_ms: Option<u64>,
    pub explicit: bool,
    /// `None` when the feature source had nothing for this id.
    pub features: Option<FeatureVector>,
}

/// Column order of the flat record set.
pub const RECORD_COLUMNS: [&str; 18] = [
    "id",
    "name",
    "artists",
    "popularity",
    "duration_ms",
    "explicit",
    "danceability",
    "energy",
    "key",
    "loudness",
    "mode",
    "speechiness",
    "acousticness",
    "instrumentalness",
    "liveness",
    "valence",
    "tempo",
    "time_signature",
];

impl EnrichedRecord {
    /// Join a track with its feature lookup outcome.
    /// Returns `None` when the track has no popularity (unusable as a training row).
    pub fn join(track: TrackRef, features: Option<FeatureVector>) -> Option<Self> {
        let popularity = track.popularity?;
        Some(Self {
            id: track.id,
            name: track.name,
            artists: track.artists,
            popularity,
            duration_ms: track.duration_ms,
            explicit: track.explicit,
            features,
        })
    }

    /// Artist names joined the way the tabular output expects.
    pub fn artists_joined(&self) -> String {
        self.artists.join(", ")
    }

    /// Feature values, absent vector flattened to all-`None`.
    pub fn feature_values(&self) -> FeatureVector {
        self.features.clone().unwrap_or_default()
    }
}
