//! Resumable page fetcher.
//!
//! Pipeline flow:
//! Checkpoint → resume page → [fetch (retried) → flatten → persist table → commit checkpoint] × pages → clear
//!
//! Epistemic foundation:
//! - K_i: Table rewrite strictly precedes checkpoint commit, so the checkpoint
//!   never names a page whose rows are not durable
//! - I^B: Transient fetch failures are retried on the same page, forever, at a fixed delay
//! - B_i falsified: Structural and persistence failures abort the run, state intact

use crate::checkpoint::CheckpointStore;
use crate::client::PageSource;
use crate::models::{Config, FlattenMode, PageIndex, RawRecord, Result, RunStats};
use crate::pipeline::{NoopProgress, ProgressEvent, ProgressObserver};
use crate::table::{RowBuilder, TableSink};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Static settings for one run.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub total_pages: u32,
    pub retry_delay: Duration,
    pub output_path: PathBuf,
    pub checkpoint_path: PathBuf,
    pub flatten: FlattenMode,
    pub metadata_field: String,
}

impl FetchSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            total_pages: config.run.total_pages,
            retry_delay: config.run.retry_delay()?,
            output_path: config.output.path.clone(),
            checkpoint_path: config.output.checkpoint_path.clone(),
            flatten: config.run.flatten,
            metadata_field: config.run.metadata_field.clone(),
        })
    }
}

/// First page to fetch given the stored checkpoint, or `None` if nothing is left.
pub fn resume_point(checkpoint: Option<PageIndex>, total_pages: u32) -> Option<PageIndex> {
    let resume = checkpoint.map(|p| p.saturating_add(1)).unwrap_or(1);
    (resume <= total_pages).then_some(resume)
}

/// Drives the page loop from the resume point to the last page.
pub struct Fetcher {
    source: Arc<dyn PageSource>,
    builder: RowBuilder,
    checkpoint: CheckpointStore,
    settings: FetchSettings,
    progress: Arc<dyn ProgressObserver>,
}

impl Fetcher {
    /// Create a fetcher with no progress observer.
    pub fn new(source: Arc<dyn PageSource>, settings: FetchSettings) -> Self {
        Self {
            source,
            builder: RowBuilder::new(settings.flatten, settings.metadata_field.clone()),
            checkpoint: CheckpointStore::new(&settings.checkpoint_path),
            settings,
            progress: Arc::new(NoopProgress),
        }
    }

    pub fn from_config(config: &Config, source: Arc<dyn PageSource>) -> Result<Self> {
        Ok(Self::new(source, FetchSettings::from_config(config)?))
    }

    /// Attach a progress observer.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressObserver>) -> Self {
        self.progress = progress;
        self
    }

    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    /// Run until every page is committed or a fatal error occurs.
    ///
    /// On a fatal error, the table and checkpoint reflect the last committed page
    /// and a later run resumes from the page after it.
    pub async fn run(&self) -> Result<RunStats> {
        let start = Instant::now();
        let total = self.settings.total_pages;
        let last_committed = self.checkpoint.load();

        let mut sink = TableSink::new(&self.settings.output_path, self.builder.initial_columns());
        let mut stats = RunStats {
            total_pages: total,
            ..Default::default()
        };

        let Some(resume_page) = resume_point(last_committed, total) else {
            info!(
                checkpoint = last_committed,
                total_pages = total,
                "All pages already committed, nothing to do"
            );
            self.checkpoint.clear()?;
            stats.resumed_from = total.saturating_add(1);
            stats.runtime_secs = start.elapsed().as_secs_f64();
            return Ok(stats);
        };
        stats.resumed_from = resume_page;

        if resume_page > 1 {
            if !sink.path().exists() {
                warn!(
                    path = %sink.path().display(),
                    checkpoint = resume_page - 1,
                    "Checkpoint present but table missing; earlier pages will not be in the output"
                );
                stats.pages_missing = resume_page - 1;
            }
            let loaded = sink.load_existing()?;
            info!(
                resume_page,
                total_pages = total,
                rows = loaded,
                columns = sink.columns().len(),
                "Resuming from checkpoint"
            );
        } else {
            info!(total_pages = total, output = %sink.path().display(), "Starting fresh run");
        }

        self.progress.on_start(resume_page, total);

        for page in resume_page..=total {
            let records = self.fetch_with_retry(page, &mut stats).await?;

            let rows = self
                .builder
                .build_page(page, &records, sink.columns_mut())
                .inspect_err(|e| error!(page, error = %e, "Malformed record, aborting"))?;
            let count = rows.len();

            sink.append_rows(rows);
            sink.persist()
                .inspect_err(|e| error!(page, error = %e, "Failed to persist table"))?;
            self.checkpoint
                .commit(page)
                .inspect_err(|e| error!(page, error = %e, "Failed to commit checkpoint"))?;

            stats.pages_fetched += 1;
            stats.records_written += count;
            self.progress.on_page(&ProgressEvent::new(page, total, count));
        }

        self.checkpoint.clear()?;

        stats.total_rows = sink.len();
        stats.columns = sink.columns().len();
        stats.runtime_secs = start.elapsed().as_secs_f64();
        stats.finalize();

        if stats.pages_missing > 0 {
            warn!(
                pages_missing = stats.pages_missing,
                path = %sink.path().display(),
                "Output lacks the rows of pages committed before the table went missing"
            );
        }
        info!(
            pages = stats.pages_fetched,
            rows = stats.total_rows,
            columns = stats.columns,
            retries = stats.retries,
            throughput = format!("{:.0} pages/hr", stats.pages_per_hour),
            "Fetch complete"
        );
        self.progress.on_finish(&stats);

        Ok(stats)
    }

    /// Fetch one page, retrying transient failures without limit.
    async fn fetch_with_retry(
        &self,
        page: PageIndex,
        stats: &mut RunStats,
    ) -> Result<Vec<RawRecord>> {
        let delay = self.settings.retry_delay;
        let mut attempt: u64 = 0;

        loop {
            match self.source.fetch_page(page).await {
                Ok(records) => return Ok(records),
                Err(e) if e.is_transient() => {
                    attempt += 1;
                    stats.retries += 1;
                    warn!(
                        page,
                        attempt,
                        delay_secs = delay.as_secs_f64(),
                        error = %e,
                        "Page fetch failed, retrying"
                    );
                    self.progress.on_retry(page, attempt, delay, &e);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(page, kind = %e.kind(), error = %e, "Page fetch failed, aborting");
                    return Err(e);
                }
            }
        }
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("builder", &self.builder)
            .field("checkpoint", &self.checkpoint)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
