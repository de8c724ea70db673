use super::models::DatasetStats;
use super::{Database, DbError, Result};
use crate::models::{EnrichedRecord, FeatureVector};
use rusqlite::{params, Row};

/// A `tracks` row before artist JSON and integer ranges are checked.
struct StoredRow {
    id: String,
    name: String,
    artists_json: String,
    popularity: i64,
    duration_ms: Option<i64>,
    explicit: bool,
    features: FeatureVector,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            artists_json: row.get(2)?,
            popularity: row.get(3)?,
            duration_ms: row.get(4)?,
            explicit: row.get(5)?,
            features: FeatureVector {
                danceability: row.get(6)?,
                energy: row.get(7)?,
                key: row.get(8)?,
                loudness: row.get(9)?,
                mode: row.get(10)?,
                speechiness: row.get(11)?,
                acousticness: row.get(12)?,
                instrumentalness: row.get(13)?,
                liveness: row.get(14)?,
                valence: row.get(15)?,
                tempo: row.get(16)?,
                time_signature: row.get(17)?,
            },
        })
    }

    fn into_record(self) -> Result<EnrichedRecord> {
        let corrupt = |reason: String| DbError::Corrupt { id: self.id.clone(), reason };
        let artists: Vec<String> = serde_json::from_str(&self.artists_json)
            .map_err(|e| corrupt(format!("artists: {e}")))?;
        let popularity = u32::try_from(self.popularity)
            .map_err(|_| corrupt(format!("popularity {}", self.popularity)))?;
        let duration_ms = match self.duration_ms {
            Some(d) => Some(u64::try_from(d).map_err(|_| corrupt(format!("duration_ms {d}")))?),
            None => None,
        };
        // A row whose feature columns are all NULL had no features.
        let features = (self.features != FeatureVector::default()).then_some(self.features);

        Ok(EnrichedRecord {
            id: self.id,
            name: self.name,
            artists,
            popularity,
            duration_ms,
            explicit: self.explicit,
            features,
        })
    }
}

impl Database {
    /// Insert or update records by track id in a single transaction.
    /// Existing rows keep their position in the insertion order.
    pub fn store_records(&self, records: &[EnrichedRecord]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO tracks (
                    id, name, artists, popularity, duration_ms, explicit,
                    danceability, energy, key, loudness, mode, speechiness,
                    acousticness, instrumentalness, liveness, valence, tempo, time_signature,
                    collected_at
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6,
                    ?7, ?8, ?9, ?10, ?11, ?12,
                    ?13, ?14, ?15, ?16, ?17, ?18,
                    datetime('now')
                )
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    artists = excluded.artists,
                    popularity = excluded.popularity,
                    duration_ms = excluded.duration_ms,
                    explicit = excluded.explicit,
                    danceability = excluded.danceability,
                    energy = excluded.energy,
                    key = excluded.key,
                    loudness = excluded.loudness,
                    mode = excluded.mode,
                    speechiness = excluded.speechiness,
                    acousticness = excluded.acousticness,
                    instrumentalness = excluded.instrumentalness,
                    liveness = excluded.liveness,
                    valence = excluded.valence,
                    tempo = excluded.tempo,
                    time_signature = excluded.time_signature,
                    collected_at = datetime('now')
                ",
            )?;

            for r in records {
                let artists = serde_json::to_string(&r.artists).map_err(|e| DbError::Corrupt {
                    id: r.id.clone(),
                    reason: format!("artists: {e}"),
                })?;
                let f = r.feature_values();
                stmt.execute(params![
                    r.id, r.name, artists, r.popularity as i64,
                    r.duration_ms.map(|d| d as i64), r.explicit,
                    f.danceability, f.energy, f.key, f.loudness, f.mode, f.speechiness,
                    f.acousticness, f.instrumentalness, f.liveness, f.valence, f.tempo,
                    f.time_signature,
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// Delete every stored record. Returns the number of rows removed.
    pub fn clear_records(&self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM tracks", [])?)
    }

    /// All stored records in first-insertion order.
    pub fn load_records(&self) -> Result<Vec<EnrichedRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, artists, popularity, duration_ms, explicit,
                    danceability, energy, key, loudness, mode, speechiness,
                    acousticness, instrumentalness, liveness, valence, tempo, time_signature
             FROM tracks ORDER BY seq",
        )?;

        let rows = stmt
            .query_map([], StoredRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(StoredRow::into_record).collect()
    }

    /// Get dataset statistics.
    pub fn stats(&self) -> Result<DatasetStats> {
        let counts: (i64, i64, Option<f64>, Option<String>, Option<String>) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(explicit), 0), AVG(popularity),
                    MIN(collected_at), MAX(collected_at)
             FROM tracks",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
        )?;
        let (total_tracks, explicit_tracks, mean_popularity, first_collected, last_collected) = counts;

        let with_features: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tracks
             WHERE COALESCE(danceability, energy, key, loudness, mode, speechiness,
                            acousticness, instrumentalness, liveness, valence, tempo,
                            time_signature) IS NOT NULL",
            [],
            |row| row.get(0),
        )?;

        Ok(DatasetStats {
            total_tracks,
            with_features,
            explicit_tracks,
            mean_popularity,
            first_collected,
            last_collected,
        })
    }
}
