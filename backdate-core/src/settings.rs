//! Clap-free settings for the generation and runtime pipelines.

use backdate_types::VersionScheme;
use camino::Utf8PathBuf;

/// Settings for `generate` / `check` runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateSettings {
    /// Directory holding one `<module>.toml` per HEAD module.
    pub head_dir: Utf8PathBuf,
    /// Versions manifest (`.toml` or `.json`).
    pub versions_file: Utf8PathBuf,
    pub out_dir: Utf8PathBuf,

    /// Prefix every generated module with a do-not-edit comment.
    pub banner: bool,
}

impl Default for GenerateSettings {
    fn default() -> Self {
        Self {
            head_dir: Utf8PathBuf::from("schemas/head"),
            versions_file: Utf8PathBuf::from("versions.toml"),
            out_dir: Utf8PathBuf::from("schemas/generated"),
            banner: true,
        }
    }
}

/// Settings for a `MigrationPipeline`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSettings {
    /// Must match the scheme of the graph the pipeline serves.
    pub scheme: VersionScheme,
    /// Version used when a request carries no token.
    pub default_version: Option<String>,
    /// Header the router reads the token from; matched case-insensitively.
    pub version_header: String,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            scheme: VersionScheme::Date,
            default_version: None,
            version_header: "x-api-version".to_string(),
        }
    }
}
