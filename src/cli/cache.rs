//! The `cache` subcommand: inspect and clean the enrichment cache without
//! running a scan.

use crate::config::TriageConfig;
use crate::error::Result;
use crate::pipeline::{self, exit_codes};
use chrono::Duration;
use std::path::PathBuf;

/// Arguments for the `cache` subcommand
#[derive(Debug, clap::Args)]
pub struct CacheArgs {
    /// Path to the cache database
    #[arg(long, env = "VULN_TRIAGE_CACHE_DB")]
    pub cache_db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum CacheCommand {
    /// Show entry counts and call-ledger statistics
    Stats,
    /// Delete entries older than the retention windows
    Sweep {
        /// Retention window for EPSS entries, in days
        #[arg(long, default_value_t = 7)]
        epss_max_age_days: i64,
        /// Retention window for KEV entries, in days
        #[arg(long, default_value_t = 1)]
        kev_max_age_days: i64,
    },
}

/// Run the subcommand. Returns the process exit code.
pub fn run(args: &CacheArgs, mut config: TriageConfig) -> Result<i32> {
    if let Some(db) = &args.cache_db {
        config.cache.db_path = db.clone();
    }
    let cache = pipeline::open_cache(&config)?;

    match &args.command {
        CacheCommand::Stats => {
            let stats = cache.stats()?;
            println!("Cache database: {}", config.cache.db_path.display());
            println!("EPSS entries cached: {}", stats.epss_entries);
            println!("KEV entries cached:  {}", stats.kev_entries);
            println!(
                "Recorded calls: {} total, {} served from cache",
                stats.total_calls, stats.cached_calls
            );
            let mut sources: Vec<_> = stats.calls_last_24h_by_source.iter().collect();
            sources.sort();
            for (source, count) in sources {
                println!("  last 24h {source}: {count}");
            }
        }
        CacheCommand::Sweep {
            epss_max_age_days,
            kev_max_age_days,
        } => {
            let report = cache.sweep(
                Duration::days(*epss_max_age_days),
                Duration::days(*kev_max_age_days),
            )?;
            println!(
                "Swept {} EPSS entries and {} KEV entries",
                report.epss_deleted, report.kev_deleted
            );
        }
    }

    Ok(exit_codes::SUCCESS)
}
