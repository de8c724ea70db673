//! Audio-feature lookup with graduated batch degradation.
//!
//! Ids are looked up in batches of 50. A batch rejected as malformed
//! (400/403) is split into batches of 10, and a rejected batch of 10 into
//! single-id requests. Any other failure, or a failure that cannot be split
//! further, marks the ids of that request absent. Every submitted valid id
//! ends up with exactly one outcome.

use std::collections::{HashMap, HashSet, VecDeque};

use indicatif::{ProgressBar, ProgressStyle};

use crate::catalog::{ApiError, CatalogApi, FEATURES_MAX_IDS};
use crate::config::PacingConfig;
use crate::ids::is_valid_track_id;
use crate::models::FeatureVector;

/// Request granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Bulk,
    Sub,
    Single,
}

impl Tier {
    pub fn size(self) -> usize {
        match self {
            Tier::Bulk => FEATURES_MAX_IDS,
            Tier::Sub => 10,
            Tier::Single => 1,
        }
    }

    /// Next tier down, if any.
    pub fn finer(self) -> Option<Tier> {
        match self {
            Tier::Bulk => Some(Tier::Sub),
            Tier::Sub => Some(Tier::Single),
            Tier::Single => None,
        }
    }

    fn pause_ms(self, pacing: &PacingConfig) -> u64 {
        match self {
            Tier::Bulk => pacing.feature_batch_ms,
            Tier::Sub => pacing.feature_sub_batch_ms,
            Tier::Single => pacing.feature_single_ms,
        }
    }
}

/// What to do with a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Retry the ids in chunks of the given tier.
    Split(Tier),
    /// Give up: every id in the request resolves to absent.
    MarkAbsent,
}

/// Degradation policy. Only client rejections of multi-id requests are split.
pub fn recovery_for(tier: Tier, batch_len: usize, err: &ApiError) -> Recovery {
    match tier.finer() {
        Some(finer) if batch_len > 1 && err.is_client_rejection() => Recovery::Split(finer),
        _ => Recovery::MarkAbsent,
    }
}

/// Request counters for one enrichment run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichStats {
    pub requests: usize,
    pub failed_requests: usize,
    pub splits: usize,
    /// Ids excluded before lookup (malformed or repeated).
    pub skipped_ids: usize,
}

/// Total mapping from looked-up id to features or absence.
#[derive(Debug, Default)]
pub struct FeatureMap {
    outcomes: HashMap<String, Option<FeatureVector>>,
    pub stats: EnrichStats,
}

impl FeatureMap {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// `None` if the id was never looked up; `Some(None)` if it resolved to absent.
    pub fn get(&self, id: &str) -> Option<&Option<FeatureVector>> {
        self.outcomes.get(id)
    }

    /// Remove and return the features for `id` (absent or unknown → `None`).
    pub fn take(&mut self, id: &str) -> Option<FeatureVector> {
        self.outcomes.remove(id).flatten()
    }

    pub fn resolved(&self) -> usize {
        self.outcomes.values().filter(|f| f.is_some()).count()
    }

    pub fn absent(&self) -> usize {
        self.outcomes.values().filter(|f| f.is_none()).count()
    }

    fn set(&mut self, id: String, outcome: Option<FeatureVector>) {
        self.outcomes.insert(id, outcome);
    }

    /// Zip a positionally aligned response onto its request; short responses
    /// leave the tail absent.
    fn set_aligned(&mut self, ids: Vec<String>, results: Vec<Option<FeatureVector>>) {
        let mut results = results.into_iter();
        for id in ids {
            self.set(id, results.next().flatten());
        }
    }
}

struct Task {
    ids: Vec<String>,
    tier: Tier,
}

pub struct FeatureEnricher<'a, C: CatalogApi + ?Sized> {
    api: &'a C,
    pacing: &'a PacingConfig,
}

impl<'a, C: CatalogApi + ?Sized> FeatureEnricher<'a, C> {
    pub fn new(api: &'a C, pacing: &'a PacingConfig) -> Self {
        Self { api, pacing }
    }

    /// Look up features for `ids`. Malformed and repeated ids are excluded
    /// and do not appear in the result.
    pub fn enrich(&self, ids: &[String]) -> FeatureMap {
        let mut out = FeatureMap::default();

        let mut seen: HashSet<&str> = HashSet::new();
        let valid: Vec<String> = ids
            .iter()
            .filter(|id| is_valid_track_id(id) && seen.insert(id.as_str()))
            .cloned()
            .collect();
        out.stats.skipped_ids = ids.len() - valid.len();
        if out.stats.skipped_ids > 0 {
            log::debug!("Excluded {} malformed or repeated ids from feature lookup", out.stats.skipped_ids);
        }
        if valid.is_empty() {
            return out;
        }

        let batches = valid.len().div_ceil(Tier::Bulk.size());
        let pb = ProgressBar::new(batches as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} feature batches {msg}")
                .unwrap()
                .progress_chars("=>-"),
        );

        for (i, chunk) in valid.chunks(Tier::Bulk.size()).enumerate() {
            self.resolve_batch(chunk.to_vec(), &mut out);
            pb.inc(1);
            if i + 1 < batches {
                PacingConfig::pause(Tier::Bulk.pause_ms(self.pacing));
            }
        }

        pb.finish_and_clear();
        log::info!(
            "Features: {} resolved, {} absent ({} requests, {} failed)",
            out.resolved(),
            out.absent(),
            out.stats.requests,
            out.stats.failed_requests
        );
        out
    }

    /// Drive one top-level batch to completion through a work queue of
    /// progressively smaller requests.
    fn resolve_batch(&self, ids: Vec<String>, out: &mut FeatureMap) {
        let mut queue: VecDeque<Task> = VecDeque::new();
        queue.push_back(Task { ids, tier: Tier::Bulk });

        while let Some(Task { ids, tier }) = queue.pop_front() {
            out.stats.requests += 1;

            match self.api.audio_features(&ids) {
                Ok(results) => out.set_aligned(ids, results),
                Err(e) => {
                    out.stats.failed_requests += 1;
                    match recovery_for(tier, ids.len(), &e) {
                        Recovery::Split(finer) => {
                            log::debug!(
                                "Feature request for {} ids rejected ({e}); retrying in chunks of {}",
                                ids.len(),
                                finer.size()
                            );
                            out.stats.splits += 1;
                            // Front of the queue, in request order
                            let subtasks: Vec<Task> = ids
                                .chunks(finer.size())
                                .map(|c| Task { ids: c.to_vec(), tier: finer })
                                .collect();
                            for t in subtasks.into_iter().rev() {
                                queue.push_front(t);
                            }
                        }
                        Recovery::MarkAbsent => {
                            log::warn!("Feature lookup failed for {} ids: {e}; marking absent", ids.len());
                            for id in ids {
                                out.set(id, None);
                            }
                        }
                    }
                }
            }

            if tier != Tier::Bulk {
                PacingConfig::pause(tier.pause_ms(self.pacing));
            }
        }
    }
}
