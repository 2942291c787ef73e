//! Core data models for pagefetch.
//!
//! Epistemic mapping:
//! - K_i (Knowledge): Concrete types with compile-time guarantees
//! - B_i (Beliefs): Wrapped in Result/Option
//! - I^R (Resolvable): Config parameters
//! - I^B (Bounded): Error variants with retry or abort policy

mod config;
mod error;
mod record;

pub use config::*;
pub use error::*;
pub use record::*;
