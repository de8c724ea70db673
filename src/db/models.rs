/// Summary of the stored record set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetStats {
    pub total_tracks: i64,
    /// Rows with at least one audio feature present.
    pub with_features: i64,
    pub explicit_tracks: i64,
    /// `None` on an empty table.
    pub mean_popularity: Option<f64>,
    /// Earliest and latest `collected_at` timestamps.
    pub first_collected: Option<String>,
    pub last_collected: Option<String>,
}

impl DatasetStats {
    pub fn feature_coverage(&self) -> f64 {
        if self.total_tracks == 0 {
            0.0
        } else {
            self.with_features as f64 / self.total_tracks as f64
        }
    }
}
