pub mod playlists;
pub mod releases;
pub mod search;

use std::collections::HashSet;

use crate::catalog::CatalogApi;
use crate::config::PacingConfig;
use crate::enrich::{EnrichStats, FeatureEnricher};
use crate::models::{EnrichedRecord, TrackRef};

/// What to collect.
#[derive(Debug, Clone, Default)]
pub struct CollectRequest {
    /// Playlist ids, URLs or URIs.
    pub playlists: Vec<String>,
    pub query: Option<String>,
    pub new_releases: bool,
    pub limit: usize,
}

/// Result of a collection run.
#[derive(Debug, Default)]
pub struct CollectReport {
    /// Final records, in first-seen order.
    pub records: Vec<EnrichedRecord>,
    /// New ids contributed by each strategy.
    pub from_playlists: usize,
    pub from_search: usize,
    pub from_releases: usize,
    /// Tracks skipped because their id was already in the working set.
    pub duplicates: usize,
    pub features_resolved: usize,
    pub features_absent: usize,
    /// Tracks without popularity (unusable as training rows).
    pub dropped_no_popularity: usize,
    pub enrich: EnrichStats,
}

/// Tracks keyed by id; the first occurrence wins.
///
/// Strategies offer tracks one at a time, so only ids not seen before count
/// toward the limit.
pub struct WorkingSet {
    tracks: Vec<TrackRef>,
    seen: HashSet<String>,
    limit: usize,
    duplicates: usize,
}

/// Position to roll a [`WorkingSet`] back to.
#[derive(Debug, Clone, Copy)]
pub struct Mark {
    len: usize,
    duplicates: usize,
}

impl WorkingSet {
    pub fn new(limit: usize) -> Self {
        Self { tracks: Vec::new(), seen: HashSet::new(), limit, duplicates: 0 }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.tracks.len())
    }

    pub fn is_full(&self) -> bool {
        self.remaining() == 0
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Add `track` unless its id is already present or the set is full.
    /// Returns true when it was added.
    pub fn offer(&mut self, track: TrackRef) -> bool {
        if self.is_full() {
            return false;
        }
        if self.seen.insert(track.id.clone()) {
            self.tracks.push(track);
            true
        } else {
            self.duplicates += 1;
            false
        }
    }

    /// True when `id` is already present; counts it as a duplicate.
    pub fn skip_known(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            self.duplicates += 1;
            true
        } else {
            false
        }
    }

    pub fn mark(&self) -> Mark {
        Mark { len: self.tracks.len(), duplicates: self.duplicates }
    }

    /// Forget everything offered since `mark` was taken.
    pub fn rollback(&mut self, mark: Mark) {
        for t in self.tracks.drain(mark.len.min(self.tracks.len())..) {
            self.seen.remove(&t.id);
        }
        self.duplicates = mark.duplicates;
    }

    pub fn into_tracks(self) -> Vec<TrackRef> {
        self.tracks
    }
}

/// Runs the listing strategies, enrichment and the final join.
pub struct Collector<'a, C: CatalogApi + ?Sized> {
    api: &'a C,
    pacing: PacingConfig,
}

impl<'a, C: CatalogApi + ?Sized> Collector<'a, C> {
    pub fn new(api: &'a C, pacing: PacingConfig) -> Self {
        Self { api, pacing }
    }

    /// Collect up to `request.limit` enriched records.
    ///
    /// Strategies run in fixed order (playlists, search, new releases), each
    /// filling only what the earlier ones left of the budget. Failures of
    /// individual playlists, pages, releases or feature batches are logged
    /// and skipped; this never fails as a whole.
    pub fn collect(&self, request: &CollectRequest) -> CollectReport {
        let mut report = CollectReport::default();
        let mut working = WorkingSet::new(request.limit);

        if !request.playlists.is_empty() && !working.is_full() {
            report.from_playlists =
                playlists::fetch_playlist_tracks(self.api, &request.playlists, &mut working, &self.pacing);
            log::info!("Playlists: {} tracks", report.from_playlists);
        }

        if let Some(query) = request.query.as_deref() {
            if !working.is_full() {
                report.from_search = search::search_tracks(self.api, query, &mut working, &self.pacing);
                log::info!("Search '{query}': {} tracks", report.from_search);
            }
        }

        if request.new_releases && !working.is_full() {
            report.from_releases = releases::new_release_tracks(self.api, &mut working, &self.pacing);
            log::info!("New releases: {} tracks", report.from_releases);
        }

        report.duplicates = working.duplicates();
        if report.duplicates > 0 {
            log::info!("Skipped {} duplicate tracks", report.duplicates);
        }

        let tracks = working.into_tracks();
        let ids: Vec<String> = tracks.iter().map(|t| t.id.clone()).collect();
        let mut features = FeatureEnricher::new(self.api, &self.pacing).enrich(&ids);
        report.features_resolved = features.resolved();
        report.features_absent = features.absent();
        report.enrich = features.stats.clone();

        for track in tracks {
            let f = features.take(&track.id);
            match EnrichedRecord::join(track, f) {
                Some(record) => report.records.push(record),
                None => report.dropped_no_popularity += 1,
            }
        }
        if report.dropped_no_popularity > 0 {
            log::info!("Dropped {} tracks without popularity", report.dropped_no_popularity);
        }

        report
    }
}
