//! jobsift CLI
//!
//! Local execution entry point for crawling job boards into a local
//! JSON store.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use jobsift::{
    error::Result,
    models::{Config, SearchQuery},
    pipeline,
    sites::SiteRegistry,
    storage::JsonStore,
};

/// jobsift - Job Board Crawler
#[derive(Parser, Debug)]
#[command(name = "jobsift", version, about = "Job board crawler and normalizer")]
struct Cli {
    /// Path to storage directory containing config and collections
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl one site into the local store
    Crawl {
        /// Registered site id (see `sites`)
        site: String,

        /// Country filter, for sites that support one (e.g. "Germany")
        #[arg(long)]
        country: Option<String>,

        /// Keyword filter, for sites that support one
        #[arg(long)]
        keyword: Option<String>,
    },

    /// List registered sites
    Sites,

    /// Validate configuration files
    Validate,

    /// Show stored collection info
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.storage_dir.join("config.toml");
    let config = Config::load_or_default(&config_path);

    let registry = SiteRegistry::with_builtin()?;

    match cli.command {
        Command::Crawl {
            site,
            country,
            keyword,
        } => {
            let query = SearchQuery { country, keyword };
            let store = JsonStore::new(&cli.storage_dir);

            let summary =
                pipeline::run_site(&registry, &config, &site, &query, &store, &store).await?;

            if summary.aborted {
                // Partial data is still data; report and exit cleanly
                log::warn!(
                    "Run aborted: {}",
                    summary.abort_reason.as_deref().unwrap_or("unknown reason")
                );
            }
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::Sites => {
            for id in registry.ids() {
                println!("{id}");
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("Config OK");

            for (site, path) in &config.sessions {
                if path.exists() {
                    log::info!("Session file for '{}': {}", site, path.display());
                } else {
                    log::warn!(
                        "Session file for '{}' not found at {}",
                        site,
                        path.display()
                    );
                }
            }

            log::info!("All validations passed!");
        }

        Command::Info => {
            log::info!("Storage directory: {}", cli.storage_dir.display());

            let store = JsonStore::new(&cli.storage_dir);
            let mut any = false;
            for id in registry.ids() {
                let records = store.load_collection(&id).await?;
                if !records.is_empty() {
                    log::info!("{}: {} records", id, records.len());
                    any = true;
                }
            }
            if !any {
                log::info!("No collections stored yet.");
            }
        }
    }

    Ok(())
}
