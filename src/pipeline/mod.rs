//! Pipeline module - the resumable fetch loop and its progress observers.

mod fetcher;
mod progress;

pub use fetcher::*;
pub use progress::*;
