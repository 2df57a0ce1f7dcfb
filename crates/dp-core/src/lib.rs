//! dp-core: shared types, errors, configuration, and notification events.
//!
//! This crate is the foundational dependency for all other dp-* crates,
//! providing the job model, the package format taxonomy, a unified error
//! type, configuration sections, and the structured outcome event that the
//! notifier publishes.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod job;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, ErrorKind, Result};
pub use ids::RefId;
pub use job::*;
