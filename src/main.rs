//! pagefetch CLI - Resumable fetch of a paginated collection into a CSV table.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use pagefetch::pipeline::{BarProgress, LogProgress, resume_point};
use pagefetch::{CheckpointStore, Config, Fetcher, HttpPageSource, ProgressObserver};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "pagefetch")]
#[command(version)]
#[command(about = "Resumable fetch of a paginated JSON collection into a flat CSV table")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch all pages, resuming from the checkpoint if one exists
    Fetch {
        /// Override the number of pages
        #[arg(long)]
        total_pages: Option<u32>,

        /// Override the output CSV path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override the checkpoint file path
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Override the retry delay in seconds
        #[arg(long)]
        retry_delay: Option<f64>,

        /// Log each page instead of drawing a progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Show the checkpoint and where the next run will resume
    Status,

    /// Remove the checkpoint so the next run starts from page 1
    Reset {
        /// Also delete the output table
        #[arg(long)]
        output: bool,
    },

    /// Validate configuration file
    Validate,

    /// Show example configuration
    Example,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
}

fn print_example_config() {
    let example = r#"# pagefetch configuration file

[source]
base_url = "https://www.ebi.ac.uk/metagenomics/api/v1/samples"
page_param = "page"
# page_size = 25
timeout_secs = 60
# Extra fixed query parameters; values may use ${ENV_VAR}
# query = { lineage = "root:Environmental" }

[run]
total_pages = 17007
retry_delay_secs = 5
# "metadata": id + one column per sample-metadata key
# "normalize": every nested attribute as a dotted column
flatten = "metadata"
metadata_field = "sample-metadata"

[output]
path = "output_data.csv"
checkpoint_path = "progress_tracker.txt"
"#;
    println!("{example}");
}

fn load_config(path: &Path) -> Result<Config> {
    Config::from_file(path).with_context(|| format!("Failed to load config from {path:?}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Example => {
            print_example_config();
        }

        Commands::Validate => {
            let config = load_config(&cli.config)?;
            info!("Configuration is valid");
            info!("  Source: {}", config.source.base_url);
            info!("  Pages: {}", config.run.total_pages);
            info!("  Flatten: {:?}", config.run.flatten);
            info!("  Output: {:?}", config.output.path);
            info!("  Checkpoint: {:?}", config.output.checkpoint_path);
        }

        Commands::Status => {
            let config = load_config(&cli.config)?;
            let store = CheckpointStore::new(&config.output.checkpoint_path);
            let total = config.run.total_pages;

            match store.load() {
                Some(page) => {
                    let saved_at = std::fs::metadata(store.path())
                        .and_then(|m| m.modified())
                        .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|_| "unknown".to_string());
                    println!("Checkpoint:  page {page} of {total} (saved {saved_at})");
                }
                None => println!("Checkpoint:  none"),
            }
            match resume_point(store.load(), total) {
                Some(page) => println!("Next page:   {page}"),
                None => println!("Next page:   none (run complete)"),
            }
            println!("Output:      {:?}", config.output.path);
        }

        Commands::Reset { output } => {
            let config = load_config(&cli.config)?;
            let store = CheckpointStore::new(&config.output.checkpoint_path);
            store.clear().context("Failed to clear checkpoint")?;
            info!(path = %store.path().display(), "Checkpoint cleared");

            if output && config.output.path.exists() {
                std::fs::remove_file(&config.output.path)
                    .with_context(|| format!("Failed to remove {:?}", config.output.path))?;
                info!(path = %config.output.path.display(), "Output removed");
            }
        }

        Commands::Fetch {
            total_pages,
            output,
            checkpoint,
            retry_delay,
            no_progress,
        } => {
            let mut config = load_config(&cli.config)?;

            // CLI overrides
            if let Some(total_pages) = total_pages {
                config.run.total_pages = total_pages;
            }
            if let Some(output) = output {
                config.output.path = output;
            }
            if let Some(checkpoint) = checkpoint {
                config.output.checkpoint_path = checkpoint;
            }
            if let Some(retry_delay) = retry_delay {
                config.run.retry_delay_secs = retry_delay;
            }
            config.validate().context("Invalid configuration after overrides")?;

            let source = Arc::new(
                HttpPageSource::new(&config).context("Failed to create HTTP client")?,
            );
            let progress: Arc<dyn ProgressObserver> = if no_progress {
                Arc::new(LogProgress)
            } else {
                Arc::new(BarProgress::new())
            };

            let stats = Fetcher::from_config(&config, source)
                .context("Invalid run settings")?
                .with_progress(progress)
                .run()
                .await
                .context("Fetch aborted; rerun to resume from the last committed page")?;

            println!("\n=== Fetch Complete ===");
            println!("Pages:       {} of {}", stats.pages_fetched, stats.total_pages);
            println!("Resumed at:  {}", stats.resumed_from);
            if stats.pages_missing > 0 {
                println!("Missing:     pages 1-{} (table was gone on resume)", stats.pages_missing);
            }
            println!("Records:     {}", stats.records_written);
            println!("Rows:        {}", stats.total_rows);
            println!("Columns:     {}", stats.columns);
            println!("Retries:     {}", stats.retries);
            println!("Throughput:  {:.0} pages/hr", stats.pages_per_hour);
            println!("Runtime:     {:.1}s", stats.runtime_secs);
            println!("Output:      {:?}", config.output.path);
        }
    }

    Ok(())
}
