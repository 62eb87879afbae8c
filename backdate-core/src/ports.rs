//! Port traits abstracting I/O and body validation away from the pipelines.

use backdate_ir::HeadIr;
use camino::Utf8Path;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Source of the HEAD modules.
pub trait HeadSource {
    fn load_head(&self) -> anyhow::Result<HeadIr>;
}

/// File-system write operations.
pub trait WritePort {
    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()>;
    fn create_dir_all(&self, path: &Utf8Path) -> anyhow::Result<()>;
}

/// A schema as one version knows it. `version` is a marker token or `HEAD`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaRef {
    pub version: String,
    pub name: String,
}

impl SchemaRef {
    pub fn new(version: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for SchemaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("body does not match `{schema}`: {}", .errors.join("; "))]
    Invalid { schema: SchemaRef, errors: Vec<String> },

    #[error("no schema registered for `{0}`")]
    UnknownSchema(SchemaRef),
}

/// Validates (and may coerce) a body against one version's schema.
///
/// Implementations are shared across concurrent calls.
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, body: Value, schema: &SchemaRef) -> Result<Value, ValidationError>;
}
