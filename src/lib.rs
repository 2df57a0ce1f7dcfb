//! Digipack - packaging pipeline for digitized archival objects
//!
//! This library crate exposes configuration loading and the production
//! collaborators for the binary and for integration testing.

pub mod config;
pub mod providers;

pub use dp_core::{DestinationSet, Error, Job, PackageFormat, PipelineVariant, RefId};
