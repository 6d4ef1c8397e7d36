//! CMS mirror CLI
//!
//! Local execution entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use cms_mirror::{
    error::{AppError, Result},
    models::Config,
    pipeline::{self, CrawlOptions},
};

/// cms-mirror - static mirror and document archiver for a CMS site
#[derive(Parser, Debug)]
#[command(
    name = "cms-mirror",
    version,
    about = "Mirror a CMS site and archive its documents"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "mirror/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the site, write the mirror and archive documents
    Crawl {
        /// Start here instead of the configured start URLs (repeatable)
        #[arg(long = "start-url")]
        start_urls: Vec<String>,

        /// Do not scrape the navigation menu
        #[arg(long)]
        no_menu: bool,

        /// Do not archive documents
        #[arg(long)]
        no_archive: bool,
    },

    /// Build the mirror from an item export
    Build {
        /// Item export written by a previous crawl
        #[arg(long)]
        items: PathBuf,
    },

    /// Archive the documents of an item export
    Archive {
        /// Item export written by a previous crawl
        #[arg(long)]
        items: PathBuf,
    },

    /// Validate the configuration file
    Validate,
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

    let config = Config::load_or_default(&cli.config);
    log::info!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Crawl {
            start_urls,
            no_menu,
            no_archive,
        } => {
            config.validate()?;
            let mut options = CrawlOptions::from_config(&config);
            if !start_urls.is_empty() {
                options.start_urls = start_urls;
            }
            options.scrape_menu &= !no_menu;
            options.archive = !no_archive;

            let summary = pipeline::run_crawl(&config, &options).await?;
            log::info!(
                "Crawl complete: {} documents, {} pages, {} files",
                summary.fetch.documents,
                summary.site.pages,
                summary.files
            );
            let failures = summary.archive_failures();
            if failures > 0 {
                return Err(AppError::crawl(
                    "archive",
                    format!("{failures} documents failed to archive"),
                ));
            }
        }

        Command::Build { items } => {
            let report = pipeline::run_build(&config, &items).await?;
            log::info!(
                "Build complete: {} pages, {} menu items in {}",
                report.pages,
                report.menu_items,
                config.output.site_dir.display()
            );
        }

        Command::Archive { items } => {
            config.validate()?;
            let reports = pipeline::run_archive(&config, &items).await?;
            let failures: usize = reports.iter().map(|r| r.failed).sum();
            if failures > 0 {
                return Err(AppError::crawl(
                    "archive",
                    format!("{failures} documents failed to archive"),
                ));
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("Site: {}", config.site.base_url);
            log::info!("Start URLs: {}", config.site.start_urls.len());
            log::info!(
                "Archive backends: s3={}, internet_archive={}",
                config.archive.s3.is_some(),
                config.archive.internet_archive.is_some()
            );
            log::info!("All validations passed!");
        }
    }

    log::info!("Done!");

    Ok(())
}
