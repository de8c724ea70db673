use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hitscope::acquire::{CollectRequest, Collector};
use hitscope::catalog::http::WebCatalog;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hitscope", version, about = "Track catalog collector and popularity modeler")]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect tracks and audio features from the catalog
    Collect {
        /// Playlist id, URL or URI (repeatable)
        #[arg(long = "playlist")]
        playlists: Vec<String>,

        /// Free-text track search
        #[arg(long)]
        query: Option<String>,

        /// Also pull tracks from catalog-wide new releases
        #[arg(long)]
        new_releases: bool,

        /// Maximum number of tracks to collect
        #[arg(long, default_value_t = 1000)]
        limit: usize,

        /// Also write the collected records to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Clear stored records before saving
        #[arg(long)]
        replace: bool,
    },

    /// Train popularity models on the stored records
    Train {
        /// Output directory for metrics.json and model.json
        #[arg(long, default_value = "models")]
        out: PathBuf,

        /// Popularity at or above this counts as a hit
        #[arg(long)]
        hit_threshold: Option<u32>,

        /// Seed for the split and permutation importance
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Export stored records as CSV
    Export {
        /// Destination file
        path: PathBuf,
    },

    /// Show dataset statistics
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = hitscope::config::AppConfig::load();

    // Resolve database path: CLI > config > XDG default
    let db_path = cli.db_path
        .or(config.db_path.clone())
        .unwrap_or_else(hitscope::config::default_db_path);
    log::info!("Database: {}", db_path.display());

    let db = hitscope::db::Database::open(&db_path)
        .context("Failed to open database")?;

    match cli.command {
        Commands::Collect { playlists, query, new_releases, limit, csv, replace } => {
            if playlists.is_empty() && query.is_none() && !new_releases {
                anyhow::bail!("Nothing to collect. Pass --playlist, --query or --new-releases.");
            }
            let credentials = config.catalog.credentials().context(
                "No catalog credentials. Set SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET \
                 or client_id/client_secret under [catalog] in the config file.",
            )?;
            let api = WebCatalog::new(config.catalog.clone(), credentials);

            let request = CollectRequest { playlists, query, new_releases, limit };
            let report = Collector::new(&api, config.pacing.clone()).collect(&request);

            if replace {
                let removed = db.clear_records().context("Failed to clear records")?;
                log::info!("Cleared {} stored records", removed);
            }
            let stored = db.store_records(&report.records)
                .context("Failed to store records")?;

            if let Some(path) = csv {
                let rows = hitscope::export::write_csv(&path, &report.records)?;
                println!("Wrote {} rows to {}", rows, path.display());
            }

            println!(
                "Collect complete: {} stored ({} playlist, {} search, {} new-release tracks; \
                 {} duplicates, {} without popularity)",
                stored,
                report.from_playlists,
                report.from_search,
                report.from_releases,
                report.duplicates,
                report.dropped_no_popularity
            );
            println!(
                "Features: {} resolved, {} absent ({} requests, {} failed, {} splits)",
                report.features_resolved,
                report.features_absent,
                report.enrich.requests,
                report.enrich.failed_requests,
                report.enrich.splits
            );
        }

        Commands::Train { out, hit_threshold, seed } => {
            let mut model_config = config.model.clone();
            if let Some(t) = hit_threshold {
                model_config.hit_threshold = t;
            }
            if let Some(s) = seed {
                model_config.seed = s;
            }

            let records = db.load_records().context("Failed to load records")?;
            let report = hitscope::training::train_and_evaluate(&records, &model_config)
                .context("Training failed")?;
            hitscope::training::write_outputs(&out, &report)?;

            let m = &report.metrics;
            println!(
                "Trained on {} rows ({} train / {} test), hit threshold {}",
                m.rows_total, m.rows_train, m.rows_test, m.hit_threshold
            );
            println!("Regression:     R² = {:.3}  MAE = {:.2}", m.regression.r2, m.regression.mae);
            println!("Classification: accuracy = {:.3}", m.classification.accuracy);
            println!();
            println!("Top features by permutation importance:");
            for (i, f) in m.top_features.iter().enumerate() {
                println!("  {:>2}. {:<18} {:+.4}", i + 1, f.feature, f.importance);
            }
            println!();
            println!("Wrote metrics.json and model.json to {}", out.display());
        }

        Commands::Export { path } => {
            let records = db.load_records().context("Failed to load records")?;
            if records.is_empty() {
                println!("No records stored. Run `hitscope collect` first.");
                return Ok(());
            }
            let rows = hitscope::export::write_csv(&path, &records)?;
            println!("Wrote {} rows to {}", rows, path.display());
        }

        Commands::Stats => {
            let stats = db.stats().context("Failed to get stats")?;
            println!("Dataset Statistics");
            println!("==================");
            println!("Total tracks:     {}", stats.total_tracks);
            println!(
                "With features:    {} ({:.0}%)",
                stats.with_features,
                stats.feature_coverage() * 100.0
            );
            println!("Explicit tracks:  {}", stats.explicit_tracks);
            match stats.mean_popularity {
                Some(p) => println!("Mean popularity:  {:.1}", p),
                None => println!("Mean popularity:  -"),
            }
            if let (Some(first), Some(last)) = (&stats.first_collected, &stats.last_collected) {
                println!("Collected:        {} .. {}", first, last);
            }
        }
    }

    Ok(())
}
