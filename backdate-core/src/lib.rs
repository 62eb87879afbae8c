//! Embeddable core library for backdate.
//!
//! Two entry points, both clap-free:
//!
//! - [`generate`](generate::generate) derives every historical version of the
//!   HEAD modules; [`run`] wraps it with loading, layout and staleness checks.
//! - [`MigrationPipeline`](pipeline::MigrationPipeline) migrates request and
//!   response bodies between a caller's version and HEAD at runtime.
//!
//! # Port traits
//!
//! I/O and body validation sit behind the traits in [`ports`]:
//! - [`HeadSource`](ports::HeadSource) loads HEAD modules
//! - [`WritePort`](ports::WritePort) writes generated files
//! - [`SchemaValidator`](ports::SchemaValidator) validates bodies per version
//!
//! The [`adapters`] module provides filesystem and JSON Schema implementations.

pub mod adapters;
pub mod catalog;
mod error;
pub mod generate;
pub mod pipeline;
pub mod ports;
pub mod run;
pub mod settings;

pub use error::{GenerationError, MigrationError};

// Re-export the domain types embedders need to declare versions.
pub use backdate_domain::{
    ConverterTarget, RequestInfo, ResolvedVersion, ResponseInfo, SideEffect, VersionChange,
    VersionGraph,
};
