//! Table module - flattening records into a growing CSV table.
//!
//! Provides:
//! - `ColumnSet`: Ordered, append-only column registry
//! - `RowBuilder`: Record → row flattening with column discovery
//! - `TableSink`: Row accumulation and full-rewrite persistence

mod builder;
mod columns;
mod sink;

pub use builder::*;
pub use columns::*;
pub use sink::*;
