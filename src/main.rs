mod config;
mod error;
mod fsio;
mod index;
mod parser;
mod pipeline;
mod progress;
mod record;
mod repair;
mod retry;
mod samples;
mod scan;
mod scraper;
mod unit;
mod validate;
mod writer;

use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Settings;
use crate::pipeline::{FailurePolicy, Pipeline, PipelineOptions, RunState};
use crate::progress::JsonFileStore;
use crate::scraper::LawPhilExtractor;
use crate::writer::JsonDirWriter;

const FIRST_YEAR: i32 = 1901;
const LAST_YEAR: i32 = 1995;

#[derive(Parser)]
#[command(name = "lawphil_scraper", about = "Resumable batch scraper for Philippine Supreme Court decisions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every month of a year range, resuming from saved progress
    Run {
        #[arg(long, default_value_t = FIRST_YEAR)]
        start_year: i32,
        #[arg(long, default_value_t = LAST_YEAR)]
        end_year: i32,
        /// Seconds to wait between months
        #[arg(long)]
        delay: Option<f64>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
        #[arg(long)]
        progress_file: Option<PathBuf>,
        /// Retries per month for network failures
        #[arg(long)]
        max_retries: Option<u32>,
        /// Stop at the first month that fails instead of moving on
        #[arg(long)]
        abort_on_failure: bool,
        /// Validate the range's output after the run
        #[arg(long)]
        validate: bool,
    },
    /// Show saved progress
    Status {
        #[arg(long, default_value_t = FIRST_YEAR)]
        start_year: i32,
        #[arg(long, default_value_t = LAST_YEAR)]
        end_year: i32,
        #[arg(long)]
        progress_file: Option<PathBuf>,
    },
    /// Discard saved progress
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
        #[arg(long)]
        progress_file: Option<PathBuf>,
    },
    /// Check case files for complete metadata
    Validate {
        #[arg(long)]
        directory: Option<PathBuf>,
        #[arg(long)]
        start_year: Option<i32>,
        #[arg(long)]
        end_year: Option<i32>,
        /// Save the report as JSON
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Update case_index.json from the case files
    Index {
        #[arg(long)]
        directory: Option<PathBuf>,
        /// Index file (default: DIRECTORY/case_index.json)
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        start_year: Option<i32>,
        #[arg(long)]
        end_year: Option<i32>,
    },
    /// Write example case files showing the record format
    Samples {
        #[arg(long, default_value = samples::SAMPLE_DIR)]
        output_dir: PathBuf,
    },
    /// Fill empty titles from each case's caption
    FixTitles {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        directory: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load().context("reading LAWPHIL_* settings")?;

    let result = match cli.command {
        Commands::Run {
            start_year,
            end_year,
            delay,
            output_dir,
            progress_file,
            max_retries,
            abort_on_failure,
            validate,
        } => {
            if let Some(d) = delay {
                settings.delay_secs = d;
            }
            if let Some(d) = output_dir {
                settings.output_dir = d;
            }
            if let Some(p) = progress_file {
                settings.progress_file = p;
            }
            if let Some(r) = max_retries {
                settings.max_retries = r;
            }
            let policy = if abort_on_failure {
                FailurePolicy::Abort
            } else {
                FailurePolicy::Continue
            };
            run(&settings, start_year, end_year, policy, validate).await
        }
        Commands::Status {
            start_year,
            end_year,
            progress_file,
        } => {
            let store = JsonFileStore::new(progress_file.unwrap_or(settings.progress_file));
            let report = pipeline::status(&store, start_year, end_year)?;
            report.print();
            Ok(ExitCode::SUCCESS)
        }
        Commands::Reset { yes, progress_file } => {
            let store = JsonFileStore::new(progress_file.unwrap_or(settings.progress_file));
            if !yes {
                println!("This discards all progress in {}.", store.path().display());
                println!("Re-run with --yes to confirm.");
                return Ok(ExitCode::FAILURE);
            }
            let _lock = store.lock()?;
            pipeline::reset(&store)?;
            println!("Progress reset.");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate {
            directory,
            start_year,
            end_year,
            output,
        } => {
            let dir = directory.unwrap_or(settings.output_dir);
            validate_range(&dir, start_year, end_year, output.as_deref())
        }
        Commands::Index {
            directory,
            output,
            start_year,
            end_year,
        } => {
            let dir = directory.unwrap_or(settings.output_dir);
            let index_file = output.unwrap_or_else(|| dir.join(index::INDEX_FILE));
            let update = index::update_index(&dir, &index_file, start_year, end_year)?;
            update.print();
            Ok(ExitCode::SUCCESS)
        }
        Commands::Samples { output_dir } => {
            let created = samples::generate(&output_dir)?;
            for path in &created {
                println!("Created: {}", path.display());
            }
            println!("\nSample cases created in: {}", output_dir.display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::FixTitles { year, directory } => {
            let dir = directory.unwrap_or(settings.output_dir);
            let stats = repair::fix_titles(&dir, year)?;
            println!(
                "Scanned {} files: {} titles fixed, {} skipped.",
                stats.scanned, stats.fixed, stats.skipped
            );
            Ok(ExitCode::SUCCESS)
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn run(
    settings: &Settings,
    start_year: i32,
    end_year: i32,
    failure_policy: FailurePolicy,
    validate_after: bool,
) -> anyhow::Result<ExitCode> {
    if start_year > end_year {
        anyhow::bail!("start year {} is after end year {}", start_year, end_year);
    }

    let store = JsonFileStore::new(&settings.progress_file);
    let _lock = store.lock()?;

    let extractor = LawPhilExtractor::new(&settings.base_url, settings.request_delay(), settings.request_timeout())?;
    let writer = JsonDirWriter::new(&settings.output_dir);
    let options = PipelineOptions {
        unit_delay: settings.unit_delay(),
        retry: settings.retry_policy(),
        failure_policy,
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, on_signal).await {
            warn!("Second interrupt; exiting now");
            std::process::exit(130);
        }
    });

    info!(
        "Scraping {}-{} into {} (progress: {})",
        start_year,
        end_year,
        settings.output_dir.display(),
        settings.progress_file.display()
    );
    let mut pipeline = Pipeline::new(extractor, writer, store, options, cancel);
    let summary = pipeline.run(start_year, end_year).await?;
    summary.print();
    println!("Elapsed: {}", format_duration(summary.elapsed));

    let state = pipeline.state();
    if validate_after && state != RunState::Failed {
        validate_after_run(&settings.output_dir, start_year, end_year);
    }

    Ok(ExitCode::from(run_exit_code(state)))
}

fn run_exit_code(state: RunState) -> u8 {
    match state {
        RunState::Completed | RunState::Interrupted => 0,
        RunState::CompletedWithFailures => 2,
        RunState::Failed | RunState::Idle | RunState::Running => 1,
    }
}

/// Cancels `cancel` on the first signal. Returns true on a second one.
async fn watch_interrupts<F>(mut next_signal: impl FnMut() -> F, cancel: CancellationToken) -> bool
where
    F: Future<Output = std::io::Result<()>>,
{
    if next_signal().await.is_err() {
        return false;
    }
    warn!("Interrupt received; stopping after the current month (Ctrl-C again to quit now)");
    cancel.cancel();
    next_signal().await.is_ok()
}

/// Validation pass after a run. Reports only; the run's exit code stands.
/// Returns whether every file passed, or None if the sweep could not run.
fn validate_after_run(dir: &std::path::Path, start_year: i32, end_year: i32) -> Option<bool> {
    match validate::validate_dir(dir, Some(start_year), Some(end_year)) {
        Ok(report) => {
            report.print();
            Some(report.is_clean())
        }
        Err(e) => {
            warn!("Validation skipped for {}: {:#}", dir.display(), e);
            None
        }
    }
}

fn validate_range(
    dir: &std::path::Path,
    start_year: Option<i32>,
    end_year: Option<i32>,
    output: Option<&std::path::Path>,
) -> anyhow::Result<ExitCode> {
    let report = validate::validate_dir(dir, start_year, end_year)
        .with_context(|| format!("validating {}", dir.display()))?;
    report.print();
    if let Some(out) = output {
        fsio::write_json_atomic(out, &report).with_context(|| format!("writing {}", out.display()))?;
        println!("Validation report saved to: {}", out.display());
    }
    Ok(if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
