use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{PipelineError, StoreError};
use crate::progress::{ProgressState, ProgressStore};
use crate::retry::{self, RetryPolicy};
use crate::scraper::Extractor;
use crate::unit::{work_units, WorkUnit};
use crate::writer::RecordWriter;

/// What happens to the rest of the range when a unit fails after retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Record the unit as failed and move on to the next one.
    #[default]
    Continue,
    /// Stop the run in `Failed`.
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    /// Every unit was attempted, some failed and remain pending.
    CompletedWithFailures,
    Interrupted,
    Failed,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub unit_delay: Duration,
    pub retry: RetryPolicy,
    pub failure_policy: FailurePolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            unit_delay: Duration::from_secs(2),
            retry: RetryPolicy::default(),
            failure_policy: FailurePolicy::Continue,
        }
    }
}

/// Outcome of one `run` call.
#[derive(Debug)]
pub struct RunSummary {
    pub state: RunState,
    pub start_year: i32,
    pub end_year: i32,
    pub units_in_range: usize,
    pub already_completed: usize,
    pub completed: Vec<WorkUnit>,
    pub failed: Vec<(WorkUnit, String)>,
    pub records_written: u64,
    pub total_records: u64,
    /// The error that halted the run, if any.
    pub error: Option<PipelineError>,
    pub elapsed: Duration,
}

impl RunSummary {
    fn new(start_year: i32, end_year: i32) -> Self {
        Self {
            state: RunState::Idle,
            start_year,
            end_year,
            units_in_range: 0,
            already_completed: 0,
            completed: Vec::new(),
            failed: Vec::new(),
            records_written: 0,
            total_records: 0,
            error: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn print(&self) {
        let label = match self.state {
            RunState::Completed => "complete",
            RunState::CompletedWithFailures => "complete with failures",
            RunState::Interrupted => "interrupted",
            RunState::Failed => "FAILED",
            RunState::Idle | RunState::Running => "not finished",
        };
        println!("\n=== Batch run {} ({}-{}) ===", label, self.start_year, self.end_year);
        println!(
            "Units completed: {} this run, {} earlier, {} in range",
            self.completed.len(),
            self.already_completed,
            self.units_in_range
        );
        println!("Units failed:    {}", self.failed.len());
        for (unit, reason) in &self.failed {
            println!("  {}: {}", unit, reason);
        }
        println!("Records written: {} ({} total)", self.records_written, self.total_records);
        if let Some(e) = &self.error {
            println!("Halted by:       {}", e);
        }
        if matches!(
            self.state,
            RunState::Interrupted | RunState::CompletedWithFailures | RunState::Failed
        ) {
            println!(
                "Resume with: run --start-year {} --end-year {}",
                self.start_year, self.end_year
            );
        }
    }
}

/// Sequential, checkpointed driver over the units of a year range.
pub struct Pipeline<E, W, S> {
    extractor: E,
    writer: W,
    store: S,
    options: PipelineOptions,
    cancel: CancellationToken,
    state: RunState,
}

impl<E, W, S> Pipeline<E, W, S>
where
    E: Extractor,
    W: RecordWriter,
    S: ProgressStore,
{
    pub fn new(extractor: E, writer: W, store: S, options: PipelineOptions, cancel: CancellationToken) -> Self {
        Self {
            extractor,
            writer,
            store,
            options,
            cancel,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Process every unit of `[start_year, end_year]` not yet completed.
    /// State-level errors (corrupt or unwritable progress) are returned;
    /// everything else ends up in the summary.
    pub async fn run(&mut self, start_year: i32, end_year: i32) -> Result<RunSummary, PipelineError> {
        let t0 = Instant::now();
        self.state = RunState::Running;
        let mut summary = RunSummary::new(start_year, end_year);

        match self.run_units(&mut summary).await {
            Ok(state) => {
                self.state = state;
                summary.state = state;
                summary.elapsed = t0.elapsed();
                Ok(summary)
            }
            Err(e) => {
                self.state = RunState::Failed;
                Err(e)
            }
        }
    }

    async fn run_units(&mut self, summary: &mut RunSummary) -> Result<RunState, PipelineError> {
        let units = work_units(summary.start_year, summary.end_year);
        let mut progress = self.store.load()?;

        if let Some(stale) = progress.current_unit {
            warn!("Previous run stopped inside {}; discarding its partial output", stale);
            if let Err(e) = self.writer.discard_partial(stale) {
                summary.error = Some(PipelineError::Persistence { unit: stale, source: e });
                return Ok(RunState::Failed);
            }
            progress.current_unit = None;
            progress = self.checkpoint(progress)?;
        }

        let remaining = progress.remaining(&units);
        summary.units_in_range = units.len();
        summary.already_completed = units.len() - remaining.len();
        summary.total_records = progress.total_records_processed;

        match remaining.first() {
            None => {
                info!("All {} units already completed", units.len());
                return Ok(RunState::Completed);
            }
            Some(first) => info!(
                "{} of {} units remaining, starting at {}",
                remaining.len(),
                units.len(),
                first
            ),
        }

        for (i, &unit) in remaining.iter().enumerate() {
            if i > 0 && !self.wait_between_units().await {
                return Ok(self.interrupted(summary));
            }
            if self.cancel.is_cancelled() {
                return Ok(self.interrupted(summary));
            }

            progress = self.checkpoint(progress.begin(unit))?;
            info!("--- {} ---", unit);

            let extractor = &self.extractor;
            let label = unit.to_string();
            let fetched = retry::with_retry(&self.options.retry, &label, move || extractor.extract(unit)).await;

            let failure = match fetched {
                Ok(records) => match self.writer.write_unit(unit, &records) {
                    Ok(written) => {
                        progress = self.checkpoint(progress.complete(unit, written as u64))?;
                        if let Err(e) = self.writer.commit_unit(unit) {
                            warn!("Could not finalize output of {}: {}", unit, e);
                        }
                        summary.completed.push(unit);
                        summary.records_written += written as u64;
                        summary.total_records = progress.total_records_processed;
                        info!("Completed {}: {} cases", unit, written);
                        continue;
                    }
                    Err(e) if e.is_persistence() => {
                        error!("Storage failure in {}: {}", unit, e);
                        self.checkpoint(progress.fail(unit))?;
                        summary.failed.push((unit, e.to_string()));
                        summary.error = Some(PipelineError::Persistence { unit, source: e });
                        return Ok(RunState::Failed);
                    }
                    Err(e) => e.to_string(),
                },
                Err(e) => e.to_string(),
            };

            warn!("Unit {} failed: {}", unit, failure);
            progress = self.checkpoint(progress.fail(unit))?;
            summary.failed.push((unit, failure));
            if self.options.failure_policy == FailurePolicy::Abort {
                return Ok(RunState::Failed);
            }
        }

        Ok(if summary.failed.is_empty() {
            RunState::Completed
        } else {
            RunState::CompletedWithFailures
        })
    }

    fn checkpoint(&self, state: ProgressState) -> Result<ProgressState, StoreError> {
        let state = state.touch();
        self.store.save(&state)?;
        Ok(state)
    }

    /// Sleep the inter-unit delay; false if cancelled meanwhile.
    async fn wait_between_units(&self) -> bool {
        if self.options.unit_delay.is_zero() {
            return !self.cancel.is_cancelled();
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.options.unit_delay) => true,
        }
    }

    fn interrupted(&self, summary: &RunSummary) -> RunState {
        info!(
            "Interrupted after {} units this run; progress saved",
            summary.completed.len()
        );
        RunState::Interrupted
    }
}

/// Read-only view of progress for a range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub completed_units: usize,
    pub current_unit: Option<WorkUnit>,
    pub total_records: u64,
    pub last_updated: Option<DateTime<Utc>>,
    pub failed_units: Vec<WorkUnit>,
    pub units_in_range: usize,
    pub remaining_in_range: usize,
    pub next_unit: Option<WorkUnit>,
}

impl StatusReport {
    pub fn print(&self) {
        println!("=== Scraping Progress Status ===");
        println!("Completed units: {}", self.completed_units);
        match self.current_unit {
            Some(u) => println!("Current unit:    {} (interrupted mid-unit)", u),
            None => println!("Current unit:    none"),
        }
        println!("Total cases:     {}", self.total_records);
        match self.last_updated {
            Some(t) => println!("Last updated:    {}", t.to_rfc3339()),
            None => println!("Last updated:    never"),
        }
        if !self.failed_units.is_empty() {
            let failed: Vec<String> = self.failed_units.iter().map(|u| u.to_string()).collect();
            println!("Failed units:    {}", failed.join(", "));
        }
        println!(
            "Remaining:       {} of {} units in range",
            self.remaining_in_range, self.units_in_range
        );
        match self.next_unit {
            Some(u) => println!("\nWould resume from: {} {}", u.month.title(), u.year),
            None => println!("\nAll units in range completed!"),
        }
    }
}

/// Report progress without touching the store's contents.
pub fn status<S: ProgressStore>(store: &S, start_year: i32, end_year: i32) -> Result<StatusReport, StoreError> {
    let state = store.load()?;
    let units = work_units(start_year, end_year);
    let remaining = state.remaining(&units);
    Ok(StatusReport {
        completed_units: state.completed_units.len(),
        current_unit: state.current_unit,
        total_records: state.total_records_processed,
        last_updated: state.last_updated,
        failed_units: state.failed_units.iter().copied().collect(),
        units_in_range: units.len(),
        remaining_in_range: remaining.len(),
        next_unit: remaining.first().copied(),
    })
}

/// Discard all progress. Callers confirm before invoking.
pub fn reset<S: ProgressStore>(store: &S) -> Result<(), StoreError> {
    store.reset()?;
    info!("Progress reset");
    Ok(())
}
