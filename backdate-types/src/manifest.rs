//! Serializable description of a version graph (instructions only).
//!
//! Converters are code and cannot be serialized; a graph loaded from a manifest
//! drives code generation, not runtime migration.

use crate::instruction::Instruction;
use crate::version::VersionScheme;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionsManifest {
    /// Format identifier; manifests written before it existed omit it.
    #[serde(default = "versions_schema")]
    pub schema: String,

    #[serde(default)]
    pub scheme: VersionScheme,

    /// Changes bridging HEAD and the newest real version.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub head: Vec<ChangeManifest>,

    /// Version markers, oldest first.
    #[serde(default)]
    pub versions: Vec<VersionManifest>,
}

impl Default for VersionsManifest {
    fn default() -> Self {
        Self {
            schema: versions_schema(),
            scheme: VersionScheme::default(),
            head: Vec::new(),
            versions: Vec::new(),
        }
    }
}

fn versions_schema() -> String {
    crate::schema::BACKDATE_VERSIONS_V1.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionManifest {
    pub version: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<ChangeManifest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeManifest {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub side_effects: bool,

    #[serde(default)]
    pub instructions: Vec<Instruction>,
}
