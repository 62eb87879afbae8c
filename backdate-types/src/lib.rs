//! Shared DTOs (schemas-as-code) for the backdate workspace.
//!
//! # Design constraints
//! - Instructions and manifests are authored by hand and serialized to disk.
//! - Be conservative with breaking changes.
//! - Prefer adding optional fields over changing semantics.

pub mod dsl;
pub mod instruction;
pub mod manifest;
pub mod report;
pub mod version;

pub use instruction::{EndpointSelector, Instruction};
pub use version::{VersionId, VersionParseError, VersionScheme};

/// Schema identifiers.
pub mod schema {
    pub const BACKDATE_GENERATION_V1: &str = "backdate.generation.v1";
    pub const BACKDATE_VERSIONS_V1: &str = "backdate.versions.v1";
}
