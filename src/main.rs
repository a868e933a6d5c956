//! vuln-triage: vulnerability triage with EPSS and CISA KEV enrichment.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vuln_triage::cli;
use vuln_triage::config::TriageConfig;
use vuln_triage::pipeline::exit_codes;

#[derive(Parser)]
#[command(name = "vuln-triage")]
#[command(version)]
#[command(about = "Rank scanner findings by exploitation risk", long_about = None)]
#[command(after_help = "EXIT CODES:
    0  Reports written
    1  Scan contained no CVE-bearing findings
    2  Error occurred

EXAMPLES:
    # Prioritize a Nessus export with persistent caching
    vuln-triage prioritize scan.nessus

    # Qualys export, fresh intelligence, custom cache location
    vuln-triage prioritize --source qualys --refresh --cache-db /var/cache/triage.db scan.xml

    # Inspect and clean the cache
    vuln-triage cache stats
    vuln-triage cache sweep --epss-max-age-days 7 --kev-max-age-days 1")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a scan export, enrich it, and write prioritized reports
    Prioritize(cli::prioritize::PrioritizeArgs),
    /// Inspect or clean the enrichment cache
    Cache(cli::cache::CacheArgs),
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<i32> {
    let config = match &cli.config {
        Some(path) => TriageConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => TriageConfig::default(),
    };

    let code = match &cli.command {
        Commands::Prioritize(args) => cli::prioritize::run(args, config)?,
        Commands::Cache(args) => cli::cache::run(args, config)?,
    };
    Ok(code)
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!("{e:#}");
            std::process::exit(exit_codes::ERROR);
        }
    }
}
