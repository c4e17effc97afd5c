//! examsync CLI
//!
//! Local execution entry point for every pipeline phase.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use examsync::{
    error::Result,
    models::Config,
    pipeline::{self, PipelineOptions},
    services::DomainTable,
    storage::LocalStorage,
    utils::http::HttpFetcher,
};

/// examsync - Exam discussion scraper and manifest maintainer
#[derive(Parser, Debug)]
#[command(
    name = "examsync",
    version,
    about = "Exam discussion link collector and manifest reconciler"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Data directory (overrides `paths.data_dir`)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collect links for every manifest exam and write links.json files
    Collect {
        /// Only this exam
        #[arg(long)]
        exam: Option<String>,
    },

    /// Scrape questions from existing links, then update the manifest
    Process {
        /// Only this exam
        #[arg(long)]
        exam: Option<String>,

        /// Re-fetch questions that are already stored
        #[arg(long)]
        force_update: bool,
    },

    /// Run the full pipeline: links → questions → manifest
    Pipeline {
        /// Link collection only
        #[arg(long, conflicts_with = "questions_only")]
        links_only: bool,

        /// Question processing only (uses existing links)
        #[arg(long)]
        questions_only: bool,

        /// Re-fetch questions that are already stored
        #[arg(long)]
        force_update: bool,

        /// Only this exam
        #[arg(long)]
        exam: Option<String>,
    },

    /// Rebuild manifest.json from the data directory
    Manifest,

    /// Refresh the manifest entries of the given exams
    Update {
        #[arg(required = true)]
        codes: Vec<String>,
    },

    /// Show the detected domain of exam codes (no codes: self-check)
    Classify { codes: Vec<String> },

    /// Validate the configuration
    Validate,

    /// Show storage paths and manifest totals
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
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load_or_default(&cli.config);
    if let Some(dir) = &cli.data_dir {
        config.paths.data_dir = dir.clone();
    }
    let storage = LocalStorage::new(&config.paths.data_dir);

    match cli.command {
        Command::Collect { exam } => {
            let targets = pipeline::load_targets(&storage, exam.as_deref()).await?;
            let fetcher = HttpFetcher::new(&config.crawler)?;
            pipeline::run_links(&config, &storage, &fetcher, &targets).await?;
        }

        Command::Process { exam, force_update } => {
            let targets = pipeline::load_targets(&storage, exam.as_deref()).await?;
            let fetcher = HttpFetcher::new(&config.crawler)?;
            pipeline::run_questions(&config, &storage, &fetcher, &targets, force_update).await?;
        }

        Command::Pipeline {
            links_only,
            questions_only,
            force_update,
            exam,
        } => {
            let fetcher = HttpFetcher::new(&config.crawler)?;
            let options = PipelineOptions {
                links_only,
                questions_only,
                force_update,
                exam,
            };
            pipeline::run_pipeline(&config, &storage, &fetcher, &options).await?;
        }

        Command::Manifest => {
            pipeline::run_generate(&storage).await?;
        }

        Command::Update { codes } => {
            let report = pipeline::run_update(&storage, &codes).await?;
            if report.succeeded() == 0 {
                return Err(examsync::error::AppError::manifest(
                    "no manifest entry could be updated",
                ));
            }
        }

        Command::Classify { codes } => {
            let table = DomainTable::builtin()?;
            if codes.is_empty() {
                pipeline::run_classify_check(&table)?;
            } else {
                pipeline::run_classify(&table, &codes);
            }
        }

        Command::Validate => pipeline::run_validate(&config)?,

        Command::Info => pipeline::run_info(&storage).await?,
    }

    log::info!("Done!");

    Ok(())
}
