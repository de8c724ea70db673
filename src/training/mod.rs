//! Popularity modeling over a collected record set.
//!
//! Ridge regression predicts popularity; a logistic classifier predicts
//! whether a track is a hit. Both share one seeded train/test split and a
//! scaler fitted on the training rows.

pub mod features;
pub mod model;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

use crate::config::ModelConfig;
use crate::models::EnrichedRecord;
use features::{split_indices, Dataset, FEATURE_COLUMNS};
use model::{accuracy, mean_absolute_error, permutation_importance, r2_score, Classifier, RidgeModel, Scaler};

/// Fewest records the stage accepts.
pub const MIN_RECORDS: usize = 5;

/// Features reported in the importance ranking.
const TOP_FEATURES: usize = 10;

#[derive(Error, Debug)]
pub enum TrainError {
    #[error("Need at least {MIN_RECORDS} records to train, have {0}")]
    NotEnoughRecords(usize),
    #[error("Regression system is singular (ridge_alpha = {0})")]
    Singular(f64),
}

#[derive(Debug, Clone, Serialize)]
pub struct RegressionMetrics {
    pub r2: f64,
    pub mae: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    /// Share of hits among the training rows.
    pub train_hit_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Metrics {
    pub regression: RegressionMetrics,
    pub classification: ClassificationMetrics,
    pub top_features: Vec<FeatureImportance>,
    pub rows_total: usize,
    pub rows_train: usize,
    pub rows_test: usize,
    pub hit_threshold: u32,
    pub seed: u64,
    pub trained_at: DateTime<Utc>,
}

/// Everything needed to score new rows.
#[derive(Debug, Clone, Serialize)]
pub struct ModelArtifact {
    pub feature_columns: Vec<String>,
    pub scaler: Scaler,
    pub regression: RidgeModel,
    pub classifier: Classifier,
    pub hit_threshold: u32,
}

#[derive(Debug, Clone)]
pub struct TrainReport {
    pub metrics: Metrics,
    pub model: ModelArtifact,
}

/// Fit both models and evaluate them on the held-out rows.
pub fn train_and_evaluate(
    records: &[EnrichedRecord],
    config: &ModelConfig,
) -> std::result::Result<TrainReport, TrainError> {
    if records.len() < MIN_RECORDS {
        return Err(TrainError::NotEnoughRecords(records.len()));
    }

    let data = Dataset::from_records(records, config.hit_threshold);
    let (train_idx, test_idx) = split_indices(data.len(), config.test_fraction, config.seed);
    let train = data.subset(&train_idx);
    let test = data.subset(&test_idx);
    log::info!("Training on {} rows, testing on {}", train.len(), test.len());

    let scaler = Scaler::fit(&train.x);
    let x_train = scaler.transform(&train.x);
    let x_test = scaler.transform(&test.x);

    let regression = RidgeModel::fit(&x_train, &train.y_reg, config.ridge_alpha)
        .ok_or(TrainError::Singular(config.ridge_alpha))?;
    let y_pred = regression.predict(&x_test);
    let r2 = r2_score(&test.y_reg, &y_pred);
    let mae = mean_absolute_error(&test.y_reg, &y_pred);

    let classifier = Classifier::fit(&x_train, &train.y_cls, 1.0);
    if let Classifier::Constant { class } = classifier {
        log::warn!("Training rows are all {}; classifier is constant", if class { "hits" } else { "non-hits" });
    }
    let acc = accuracy(&test.y_cls, &classifier.predict(&x_test));
    let train_hits = train.y_cls.iter().filter(|&&c| c).count();

    let importances = permutation_importance(
        &regression,
        &x_test,
        &test.y_reg,
        config.importance_repeats,
        config.seed,
    );
    let mut ranked: Vec<FeatureImportance> = FEATURE_COLUMNS
        .iter()
        .zip(importances)
        .map(|(name, importance)| FeatureImportance { feature: name.to_string(), importance })
        .collect();
    ranked.sort_by(|a, b| {
        b.importance
            .partial_cmp(&a.importance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(TOP_FEATURES);

    let metrics = Metrics {
        regression: RegressionMetrics { r2, mae },
        classification: ClassificationMetrics {
            accuracy: acc,
            train_hit_rate: train_hits as f64 / train.len() as f64,
        },
        top_features: ranked,
        rows_total: data.len(),
        rows_train: train.len(),
        rows_test: test.len(),
        hit_threshold: config.hit_threshold,
        seed: config.seed,
        trained_at: Utc::now(),
    };

    let model = ModelArtifact {
        feature_columns: FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect(),
        scaler,
        regression,
        classifier,
        hit_threshold: config.hit_threshold,
    };

    Ok(TrainReport { metrics, model })
}

/// Write `metrics.json` and `model.json` into `dir`, creating it if needed.
pub fn write_outputs(dir: &Path, report: &TrainReport) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let metrics_path = dir.join("metrics.json");
    let json = serde_json::to_string_pretty(&report.metrics).context("serializing metrics")?;
    std::fs::write(&metrics_path, json)
        .with_context(|| format!("writing {}", metrics_path.display()))?;

    let model_path = dir.join("model.json");
    let json = serde_json::to_string_pretty(&report.model).context("serializing model")?;
    std::fs::write(&model_path, json)
        .with_context(|| format!("writing {}", model_path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeatureVector;

    /// Energy drives popularity; every fourth track is a hit.
    fn records(n: usize) -> Vec<EnrichedRecord> {
        (0..n)
            .map(|i| {
                let energy = (i % 20) as f64 / 20.0;
                EnrichedRecord {
                    id: format!("trk{i:0>19}"),
                    name: format!("Song {i}"),
                    artists: vec!["Artist".into()],
                    popularity: (energy * 100.0) as u32,
                    duration_ms: Some(180_000 + (i as u64 % 7) * 1000),
                    explicit: i % 3 == 0,
                    features: Some(FeatureVector {
                        energy: Some(energy),
                        danceability: Some(((i * 13) % 10) as f64 / 10.0),
                        tempo: Some(100.0 + (i % 5) as f64),
                        ..FeatureVector::default()
                    }),
                }
            })
            .collect()
    }

    #[test]
    fn test_too_few_records() {
        let err = train_and_evaluate(&records(4), &ModelConfig::default()).unwrap_err();
        assert!(matches!(err, TrainError::NotEnoughRecords(4)));
    }

    #[test]
    fn test_learns_driving_feature() {
        let report = train_and_evaluate(&records(200), &ModelConfig::default()).unwrap();
        let m = &report.metrics;
        assert_eq!(m.rows_total, 200);
        assert_eq!(m.rows_test, 40);
        assert_eq!(m.rows_train, 160);
        assert!(m.regression.r2 > 0.95, "r2 = {}", m.regression.r2);
        assert!(m.classification.accuracy > 0.8);
        assert_eq!(m.top_features.len(), 10);
        assert_eq!(m.top_features[0].feature, "energy");
        assert_eq!(report.model.feature_columns.len(), 14);
    }

    #[test]
    fn test_same_seed_same_metrics() {
        let recs = records(60);
        let a = train_and_evaluate(&recs, &ModelConfig::default()).unwrap();
        let b = train_and_evaluate(&recs, &ModelConfig::default()).unwrap();
        assert_eq!(a.metrics.regression.r2, b.metrics.regression.r2);
        assert_eq!(a.model.regression, b.model.regression);
    }

    #[test]
    fn test_no_hits_gives_constant_classifier() {
        let config = ModelConfig { hit_threshold: 101, ..ModelConfig::default() };
        let report = train_and_evaluate(&records(30), &config).unwrap();
        assert_eq!(report.model.classifier, Classifier::Constant { class: false });
        assert_eq!(report.metrics.classification.accuracy, 1.0);
    }

    #[test]
    fn test_records_without_features_still_train() {
        let mut recs = records(10);
        for r in &mut recs {
            r.features = None;
        }
        let report = train_and_evaluate(&recs, &ModelConfig::default()).unwrap();
        assert_eq!(report.metrics.rows_total, 10);
    }

    #[test]
    fn test_write_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("model_out");
        let report = train_and_evaluate(&records(50), &ModelConfig::default()).unwrap();
        write_outputs(&out, &report).unwrap();

        let metrics: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.join("metrics.json")).unwrap()).unwrap();
        assert!(metrics["regression"]["r2"].is_number());
        assert!(metrics["classification"]["accuracy"].is_number());
        assert!(metrics["trained_at"].is_string());
        assert_eq!(metrics["top_features"].as_array().unwrap().len(), 10);

        let model: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.join("model.json")).unwrap()).unwrap();
        assert_eq!(model["scaler"]["means"].as_array().unwrap().len(), 14);
        assert_eq!(model["classifier"]["kind"], "logistic");
    }
}
