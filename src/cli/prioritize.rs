//! The `prioritize` subcommand: parse a scan export, enrich it, rank it,
//! write reports.

use crate::config::TriageConfig;
use crate::model::ScanSource;
use crate::parsers;
use crate::pipeline::{self, exit_codes};
use crate::reports::{render_csv, render_json, render_summary};
use crate::error::{Result, TriageError};
use std::path::PathBuf;

/// Arguments for the `prioritize` subcommand
#[derive(Debug, clap::Args)]
pub struct PrioritizeArgs {
    /// Input scan export file
    pub input: PathBuf,

    /// Scanner that produced the export
    #[arg(long, value_enum, default_value_t = ScanSource::Nessus)]
    pub source: ScanSource,

    /// Path to the cache database
    #[arg(long, env = "VULN_TRIAGE_CACHE_DB")]
    pub cache_db: Option<PathBuf>,

    /// Disable persistent caching for this run
    #[arg(long)]
    pub no_cache: bool,

    /// Output file prefix (default: input filename without extension)
    #[arg(long)]
    pub output_prefix: Option<String>,

    /// Number of top vulnerabilities to display
    #[arg(long)]
    pub top_n: Option<usize>,

    /// Maximum acceptable age for cached EPSS scores, in days
    #[arg(long)]
    pub epss_max_age_days: Option<i64>,

    /// Maximum acceptable age for cached KEV entries, in days
    #[arg(long)]
    pub kev_max_age_days: Option<i64>,

    /// Ignore cached intelligence and fetch everything fresh
    #[arg(long)]
    pub refresh: bool,

    /// Remote API timeout in seconds
    #[arg(long)]
    pub api_timeout: Option<u64>,
}

/// Merge CLI overrides into the loaded configuration.
fn apply_overrides(args: &PrioritizeArgs, config: &mut TriageConfig) {
    if let Some(db) = &args.cache_db {
        config.cache.db_path = db.clone();
    }
    if args.no_cache {
        config.cache.enabled = false;
    }
    if let Some(days) = args.epss_max_age_days {
        config.cache.epss_max_age_days = days;
    }
    if let Some(days) = args.kev_max_age_days {
        config.cache.kev_max_age_days = days;
    }
    if args.refresh {
        // Forced refresh = zero max-age; the entries themselves survive for
        // the next run.
        config.cache.epss_max_age_days = 0;
        config.cache.kev_max_age_days = 0;
    }
    if let Some(secs) = args.api_timeout {
        config.api.timeout_secs = secs;
    }
    if let Some(top_n) = args.top_n {
        config.output.top_n = top_n;
    }
}

/// Run the subcommand. Returns the process exit code.
pub fn run(args: &PrioritizeArgs, mut config: TriageConfig) -> Result<i32> {
    apply_overrides(args, &mut config);
    config.validate()?;

    tracing::info!(
        input = %args.input.display(),
        source = %args.source,
        cache = config.cache.enabled,
        "starting triage run"
    );

    let findings = parsers::parse_scan(&args.input, args.source)?;
    if findings.is_empty() {
        println!("No CVE-bearing findings in {}", args.input.display());
        return Ok(exit_codes::NO_FINDINGS);
    }
    tracing::info!(findings = findings.len(), "parsed scan export");

    let orchestrator = pipeline::build_orchestrator(&config)?;
    let results = pipeline::enrich_findings(&findings, &orchestrator, &config)?;

    let base = output_base(args);
    let csv_path = format!("{base}_prioritized.csv");
    let json_path = format!("{base}_prioritized.json");
    std::fs::write(&csv_path, render_csv(&results.vulnerabilities))
        .map_err(|e| TriageError::io(&csv_path, e))?;
    std::fs::write(&json_path, render_json(&results)?)
        .map_err(|e| TriageError::io(&json_path, e))?;

    let cache_stats = if config.cache.enabled {
        match orchestrator.cache().stats() {
            Ok(stats) => Some(stats),
            Err(e) => {
                tracing::warn!("failed to read cache statistics: {e}");
                None
            }
        }
    } else {
        None
    };

    println!(
        "{}",
        render_summary(&results, cache_stats.as_ref(), config.output.top_n)
    );
    println!("[CSV]  {csv_path}");
    println!("[JSON] {json_path}");

    Ok(exit_codes::SUCCESS)
}

fn output_base(args: &PrioritizeArgs) -> String {
    args.output_prefix.clone().unwrap_or_else(|| {
        args.input
            .with_extension("")
            .to_string_lossy()
            .into_owned()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(input: &str) -> PrioritizeArgs {
        PrioritizeArgs {
            input: PathBuf::from(input),
            source: ScanSource::Nessus,
            cache_db: None,
            no_cache: false,
            output_prefix: None,
            top_n: None,
            epss_max_age_days: None,
            kev_max_age_days: None,
            refresh: false,
            api_timeout: None,
        }
    }

    #[test]
    fn test_output_base_from_input_stem() {
        assert_eq!(args("scans/weekly.nessus").input.extension().is_some(), true);
        assert_eq!(output_base(&args("scans/weekly.nessus")), "scans/weekly");
    }

    #[test]
    fn test_output_prefix_wins() {
        let mut a = args("scan.nessus");
        a.output_prefix = Some("reports/q3".to_string());
        assert_eq!(output_base(&a), "reports/q3");
    }

    #[test]
    fn test_refresh_zeroes_max_ages() {
        let mut a = args("scan.nessus");
        a.refresh = true;
        let mut config = TriageConfig::default();
        apply_overrides(&a, &mut config);
        assert_eq!(config.cache.epss_max_age_days, 0);
        assert_eq!(config.cache.kev_max_age_days, 0);
    }

    #[test]
    fn test_no_cache_disables_persistence() {
        let mut a = args("scan.nessus");
        a.no_cache = true;
        let mut config = TriageConfig::default();
        apply_overrides(&a, &mut config);
        assert!(!config.cache.enabled);
    }
}
