//! Progress observers.
//!
//! Observers receive read-only events and return nothing; they cannot
//! influence which page is fetched next or whether a commit happens.

use crate::models::{FetchError, PageIndex, RunStats};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

/// Per-page progress, emitted after the page is committed.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Page just committed
    pub page: PageIndex,
    pub total_pages: u32,
    /// `page * 100 / total_pages`
    pub percent_complete: f64,
    /// Pages committed so far, including earlier runs
    pub pages_fetched: u32,
    pub pages_remaining: u32,
    /// Records the page contributed
    pub records: usize,
}

impl ProgressEvent {
    pub fn new(page: PageIndex, total_pages: u32, records: usize) -> Self {
        let percent_complete = if total_pages == 0 {
            100.0
        } else {
            page as f64 * 100.0 / total_pages as f64
        };
        Self {
            page,
            total_pages,
            percent_complete,
            pages_fetched: page,
            pages_remaining: total_pages.saturating_sub(page),
            records,
        }
    }
}

/// Side-channel observer of a fetch run.
pub trait ProgressObserver: Send + Sync {
    /// Run is about to start at `resume_page`.
    fn on_start(&self, _resume_page: PageIndex, _total_pages: u32) {}

    /// A page was committed.
    fn on_page(&self, _event: &ProgressEvent) {}

    /// A transient failure on `page`; attempt `attempt` will follow after `delay`.
    fn on_retry(&self, _page: PageIndex, _attempt: u64, _delay: Duration, _error: &FetchError) {}

    /// Run finished successfully.
    fn on_finish(&self, _stats: &RunStats) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressObserver for NoopProgress {}

/// Observer that logs each committed page.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_page(&self, event: &ProgressEvent) {
        info!(
            page = event.page,
            completed = format!("{:.2}%", event.percent_complete),
            fetched = event.pages_fetched,
            remaining = event.pages_remaining,
            records = event.records,
            "Page committed"
        );
    }
}

/// Terminal progress bar.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::hidden();
        bar.set_style(
            ProgressStyle::default_bar()
                .template("Fetching data [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        Self { bar }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for BarProgress {
    fn on_start(&self, resume_page: PageIndex, total_pages: u32) {
        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        self.bar.set_length(total_pages as u64);
        // Set initial progress from checkpoint
        self.bar.set_position(resume_page.saturating_sub(1) as u64);
    }

    fn on_page(&self, event: &ProgressEvent) {
        self.bar.set_position(event.pages_fetched as u64);
        self.bar.set_message(format!(
            "Page: {}, Completed: {:.2}%, Fetched: {}, Remaining: {}",
            event.page, event.percent_complete, event.pages_fetched, event.pages_remaining
        ));
    }

    fn on_retry(&self, page: PageIndex, attempt: u64, delay: Duration, _error: &FetchError) {
        self.bar.println(format!(
            "Request failed on page {page}. Retrying in {:.0} seconds... (attempt {attempt})",
            delay.as_secs_f64()
        ));
    }

    fn on_finish(&self, stats: &RunStats) {
        self.bar.finish_with_message(format!(
            "Done! {} pages, {} rows, {} columns",
            stats.pages_fetched, stats.total_rows, stats.columns
        ));
    }
}

/// Observer that keeps every event, for inspection after a run.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    pages: Mutex<Vec<ProgressEvent>>,
    retries: Mutex<Vec<(PageIndex, u64)>>,
    started: Mutex<Option<(PageIndex, u32)>>,
    finished: Mutex<bool>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pages(&self) -> Vec<ProgressEvent> {
        self.pages.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// `(page, attempt)` of each retry notice.
    pub fn retries(&self) -> Vec<(PageIndex, u64)> {
        self.retries.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn started(&self) -> Option<(PageIndex, u32)> {
        self.started.lock().ok().and_then(|s| *s)
    }

    pub fn finished(&self) -> bool {
        self.finished.lock().map(|f| *f).unwrap_or(false)
    }
}

impl ProgressObserver for RecordingProgress {
    fn on_start(&self, resume_page: PageIndex, total_pages: u32) {
        if let Ok(mut started) = self.started.lock() {
            *started = Some((resume_page, total_pages));
        }
    }

    fn on_page(&self, event: &ProgressEvent) {
        if let Ok(mut pages) = self.pages.lock() {
            pages.push(event.clone());
        }
    }

    fn on_retry(&self, page: PageIndex, attempt: u64, _delay: Duration, _error: &FetchError) {
        if let Ok(mut retries) = self.retries.lock() {
            retries.push((page, attempt));
        }
    }

    fn on_finish(&self, _stats: &RunStats) {
        if let Ok(mut finished) = self.finished.lock() {
            *finished = true;
        }
    }
}
