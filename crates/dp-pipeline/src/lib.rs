//! # dp-pipeline
//!
//! Orchestration of the packaging pipeline.
//!
//! This crate provides:
//!
//! - **Collaborator traits** ([`collaborators`]) -- registry, object store,
//!   pub/sub, parameter store, and the [`CredentialedClientFactory`] that
//!   hands them out. In-memory implementations live in [`memory`].
//! - **[`MetadataResolver`]** -- reference id to lineage URI and date range.
//! - **Classification and planning** ([`classify`], [`plan`]) -- package
//!   format of staged files and the derivative uploads it implies.
//! - **[`DeliveryAgent`]** -- single and multipart uploads with bounded
//!   concurrency.
//! - **Cleanup** ([`cleanup`]) and the **[`Notifier`]**.
//! - **[`Step`]** trait, the built-in [`steps`], the [`PipelineExecutor`],
//!   and the [`Packager`] that ties a run together.

pub mod classify;
pub mod cleanup;
pub mod collaborators;
pub mod context;
pub mod delivery;
pub mod executor;
pub mod memory;
pub mod notifier;
pub mod packager;
pub mod plan;
pub mod resolver;
pub mod step;
pub mod steps;

// Re-export key types at the crate root.
pub use collaborators::{
    CompletedPart, CredentialedClientFactory, FindResult, ObjectStore, ParameterStore, PubSub,
    Registry, RegistrySettings,
};
pub use context::{JobState, PackagerOptions, RunContext};
pub use delivery::{DeliveryAgent, PACKAGE_CONTENT_TYPE};
pub use executor::PipelineExecutor;
pub use notifier::{render_trace, Notifier};
pub use packager::{Packager, RunOutcome};
pub use plan::{DerivativePlan, PlanEntry};
pub use resolver::{MetadataResolver, ObjectMetadata};
pub use step::Step;
