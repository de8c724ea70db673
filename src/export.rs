use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::models::{EnrichedRecord, RECORD_COLUMNS};

/// Write records as CSV with the record-set header. Returns rows written.
pub fn write_csv(path: &Path, records: &[EnrichedRecord]) -> Result<usize> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    write_records(&mut out, records).with_context(|| format!("writing {}", path.display()))?;
    out.flush().with_context(|| format!("flushing {}", path.display()))?;
    Ok(records.len())
}

/// Write the header and one line per record to any writer.
pub fn write_records<W: Write>(out: &mut W, records: &[EnrichedRecord]) -> std::io::Result<()> {
    writeln!(out, "{}", RECORD_COLUMNS.join(","))?;
    for r in records {
        let line: Vec<String> = record_cells(r).iter().map(|c| quote(c)).collect();
        writeln!(out, "{}", line.join(","))?;
    }
    Ok(())
}

/// Cells in column order; absent values are empty.
fn record_cells(r: &EnrichedRecord) -> Vec<String> {
    fn opt<T: ToString>(v: Option<T>) -> String {
        v.map(|x| x.to_string()).unwrap_or_default()
    }

    let f = r.feature_values();
    vec![
        r.id.clone(),
        r.name.clone(),
        r.artists_joined(),
        r.popularity.to_string(),
        opt(r.duration_ms),
        if r.explicit { "1" } else { "0" }.to_string(),
        opt(f.danceability),
        opt(f.energy),
        opt(f.key),
        opt(f.loudness),
        opt(f.mode),
        opt(f.speechiness),
        opt(f.acousticness),
        opt(f.instrumentalness),
        opt(f.liveness),
        opt(f.valence),
        opt(f.tempo),
        opt(f.time_signature),
    ]
}

fn quote(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
