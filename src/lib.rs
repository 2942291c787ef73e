//! pagefetch - Resumable, checkpointed fetch of paginated JSON collections into one CSV table.
//!
//! ## Architecture
//!
//! - **Checkpoint Store**: Last fully committed page, persisted atomically
//! - **Row Builder**: Flattens records, growing an append-only column set
//! - **Table Sink**: Accumulates rows and rewrites the whole CSV after each page
//! - **Page Source**: One HTTP request per page, no retry
//! - **Fetcher**: Resume → fetch (retried) → flatten → persist → commit, page by page
//!
//! ## Epistemic Design
//!
//! - K_i (Knowledge): Table rewrite always precedes checkpoint commit
//! - B_i (Beliefs): Record shapes and remote availability (Result, Option)
//! - I^R (Resolvable): URL, page count, paths, retry delay via config
//! - I^B (Bounded): Network failures are retried at a fixed delay, without limit

pub mod checkpoint;
pub mod client;
pub mod models;
pub mod pipeline;
pub mod table;

// Re-exports for convenience
pub use checkpoint::CheckpointStore;
pub use client::{HttpPageSource, PageSource};
pub use models::{Config, FetchError, RawRecord, Result, Row, RunStats};
pub use pipeline::{Fetcher, FetchSettings, ProgressEvent, ProgressObserver};
pub use table::{ColumnSet, RowBuilder, TableSink};
