use crate::version::VersionScheme;
use serde::{Deserialize, Serialize};

/// Fingerprint of one generation run.
///
/// Identical HEAD sources and version graphs must produce identical reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationReport {
    pub schema: String,
    pub scheme: VersionScheme,

    /// Oldest first.
    #[serde(default)]
    pub versions: Vec<VersionReport>,
}

impl GenerationReport {
    pub fn new(scheme: VersionScheme) -> Self {
        Self {
            schema: crate::schema::BACKDATE_GENERATION_V1.to_string(),
            scheme,
            versions: vec![],
        }
    }

    pub fn version(&self, version: &str) -> Option<&VersionReport> {
        self.versions.iter().find(|v| v.version == version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionReport {
    pub version: String,

    /// Names of the changes this version introduced, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<String>,

    #[serde(default)]
    pub files: Vec<FileDigest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDigest {
    pub module: String,
    pub sha256: String,
    pub bytes: u64,
}
