//! Checkpoint module for resumable page fetching.
//!
//! Provides:
//! - `CheckpointStore`: Load, atomic commit, and clear of the last committed page

mod store;

pub use store::*;
