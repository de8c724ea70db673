//! Turning records into a numeric design matrix.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::models::EnrichedRecord;

/// Model inputs, in matrix column order.
pub const FEATURE_COLUMNS: [&str; 14] = [
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
    "duration_ms",
    "explicit",
];

pub const N_FEATURES: usize = FEATURE_COLUMNS.len();

/// Design matrix plus both targets, row-aligned.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub x: Vec<[f64; N_FEATURES]>,
    /// Popularity.
    pub y_reg: Vec<f64>,
    /// Popularity at or above the hit threshold.
    pub y_cls: Vec<bool>,
}

impl Dataset {
    pub fn from_records(records: &[EnrichedRecord], hit_threshold: u32) -> Self {
        Self {
            x: records.iter().map(feature_row).collect(),
            y_reg: records.iter().map(|r| r.popularity as f64).collect(),
            y_cls: records.iter().map(|r| r.popularity >= hit_threshold).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Rows at the given indices, in that order.
    pub fn subset(&self, idx: &[usize]) -> Self {
        Self {
            x: idx.iter().map(|&i| self.x[i]).collect(),
            y_reg: idx.iter().map(|&i| self.y_reg[i]).collect(),
            y_cls: idx.iter().map(|&i| self.y_cls[i]).collect(),
        }
    }
}

/// One record as a feature row; absent values become 0.
pub fn feature_row(r: &EnrichedRecord) -> [f64; N_FEATURES] {
    let f = r.feature_values();
    let int = |v: Option<i32>| v.map(f64::from).unwrap_or(0.0);
    [
        f.danceability.unwrap_or(0.0),
        f.energy.unwrap_or(0.0),
        int(f.key),
        f.loudness.unwrap_or(0.0),
        int(f.mode),
        f.speechiness.unwrap_or(0.0),
        f.acousticness.unwrap_or(0.0),
        f.instrumentalness.unwrap_or(0.0),
        f.liveness.unwrap_or(0.0),
        f.valence.unwrap_or(0.0),
        f.tempo.unwrap_or(0.0),
        int(f.time_signature),
        r.duration_ms.map(|d| d as f64).unwrap_or(0.0),
        if r.explicit { 1.0 } else { 0.0 },
    ]
}

/// Seeded shuffle split into `(train, test)` row indices.
///
/// The test share is `ceil(n * test_fraction)`, clamped so both sides keep
/// at least one row. Requires `n >= 2`.
pub fn split_indices(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut idx: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    idx.shuffle(&mut rng);

    let n_test = ((n as f64) * test_fraction.clamp(0.0, 1.0)).ceil() as usize;
    let n_test = n_test.clamp(1, n.saturating_sub(1).max(1));
    let train = idx.split_off(n_test);
    (train, idx)
}
