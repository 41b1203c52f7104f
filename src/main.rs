use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::path::PathBuf;

use webgen::{find_config_file, BuildStats, Settings, SiteBuilder};

#[derive(Parser)]
#[command(name = "webgen")]
#[command(about = "Static website generator for multilingual, configuration-driven sites")]
#[command(version)]
struct Cli {
    /// Path to webgen.yaml (defaults to $WEBGEN_CONFIG, then a search below the current directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render every content into the build directory
    Build {
        /// Release build: versioned output directory, licence headers, no debug markers
        #[arg(long)]
        release: bool,

        /// Number of worker threads
        #[arg(short, long)]
        jobs: Option<usize>,
    },
    /// Remove the development and release build directories
    Clean,
    /// Parse contents and load templates without writing anything
    Check,
    /// Generate only the XML sitemap
    Sitemap {
        #[arg(long)]
        release: bool,
    },
    /// Collect translatable strings and update the translation table
    Extract,
}

fn load_settings(explicit: Option<&PathBuf>, release: bool) -> Result<Settings> {
    let path = find_config_file(explicit.map(PathBuf::as_path))?;
    let mut settings = Settings::load(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    if release {
        settings.enable_release_mode();
    }
    info!("Using configuration {}", settings.paths.config_file.display());
    Ok(settings)
}

fn report(stats: &BuildStats) {
    println!(
        "Built {} pages from {} contents ({} skipped, {} sitemap URLs, {:.1} KiB) in {:.2?}",
        stats.pages_written,
        stats.contents_processed,
        stats.files_skipped,
        stats.sitemap_urls,
        stats.bytes_written as f64 / 1024.0,
        stats.build_time
    );
    if stats.warnings > 0 {
        warn!("{} warnings, see above", stats.warnings);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "info" }),
    )
    .init();

    match cli.command {
        Command::Build { release, jobs } => {
            let mut builder = SiteBuilder::new(load_settings(cli.config.as_ref(), release)?);
            if let Some(jobs) = jobs {
                builder.set_parallel_jobs(jobs);
            }
            let stats = builder.build().await?;
            report(&stats);
        }
        Command::Clean => {
            let builder = SiteBuilder::new(load_settings(cli.config.as_ref(), false)?);
            for path in builder.clean().await? {
                println!("Removed {}", path.display());
            }
        }
        Command::Check => {
            let builder = SiteBuilder::new(load_settings(cli.config.as_ref(), false)?);
            let report = builder.check()?;
            println!(
                "{} contents, {} context entries, {} menus, {} warnings",
                report.contents,
                report.context_entries,
                report.menus,
                report.warnings.len()
            );
        }
        Command::Sitemap { release } => {
            let builder = SiteBuilder::new(load_settings(cli.config.as_ref(), release)?);
            match builder.write_sitemap().await? {
                Some(path) => println!("Wrote {}", path.display()),
                None => println!("XML sitemap is disabled"),
            }
        }
        Command::Extract => {
            let builder = SiteBuilder::new(load_settings(cli.config.as_ref(), false)?);
            let (path, count) = builder.extract_i18n().await?;
            println!("Wrote {} translatable strings to {}", count, path.display());
        }
    }

    Ok(())
}
