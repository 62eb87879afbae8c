//! Batch generation entry points, extracted from the CLI.
//!
//! Loading goes through [`HeadSource`], writing through [`WritePort`]; the
//! caller decides where files land.

use crate::generate::{GeneratedVersions, generate};
use crate::ports::{HeadSource, WritePort};
use anyhow::Context;
use backdate_domain::VersionGraph;
use backdate_types::manifest::VersionsManifest;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use glob::glob;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

pub const REPORT_FILE: &str = "report.json";

/// Error type for batch results. Exit code 2 = stale output, 1 = tool error.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("generated output is stale ({} file(s))", .0.len())]
    Stale(Vec<StaleFile>),
    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

impl ToolError {
    pub fn exit_code(&self) -> u8 {
        match self {
            ToolError::Stale(_) => 2,
            ToolError::Internal(_) => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    Missing,
    Changed,
    Unexpected,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StaleReason::Missing => "missing",
            StaleReason::Changed => "changed",
            StaleReason::Unexpected => "unexpected",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleFile {
    /// Relative to the output directory.
    pub path: Utf8PathBuf,
    pub reason: StaleReason,
}

/// Outcome of `run_generate`.
#[derive(Debug, Clone)]
pub struct GenerateOutcome {
    pub generated: GeneratedVersions,
    /// Relative path to file contents, report included.
    pub files: BTreeMap<Utf8PathBuf, String>,
}

/// Load HEAD, build the graph and derive every version.
///
/// Nothing is written; use [`write_outputs`] or [`check_outputs`].
pub fn run_generate(
    head_source: &dyn HeadSource,
    manifest: &VersionsManifest,
    banner: bool,
) -> anyhow::Result<GenerateOutcome> {
    let head = head_source.load_head().context("load head modules")?;
    let graph = VersionGraph::from_manifest(manifest).context("build version graph")?;
    let generated = generate(&head, &graph).context("generate versions")?;
    let files = output_files(&generated, banner)?;
    Ok(GenerateOutcome { generated, files })
}

/// `<version>/<module>.toml` for every version plus the report.
pub fn output_files(
    generated: &GeneratedVersions,
    banner: bool,
) -> anyhow::Result<BTreeMap<Utf8PathBuf, String>> {
    let mut files = BTreeMap::new();
    for version in generated.versions() {
        let token = version.id().to_string();
        for (module, source) in version.sources() {
            let mut text = String::new();
            if banner {
                text.push_str(&format!(
                    "# Generated by backdate for version {token}. Do not edit.\n"
                ));
            }
            text.push_str(source);
            files.insert(Utf8PathBuf::from(&token).join(format!("{module}.toml")), text);
        }
    }
    let mut report =
        serde_json::to_string_pretty(&generated.report()).context("serialize report")?;
    report.push('\n');
    files.insert(Utf8PathBuf::from(REPORT_FILE), report);
    Ok(files)
}

/// Write every output file. Callers only get here after generation fully
/// succeeded, so a failed run never leaves partial output behind.
pub fn write_outputs(
    outcome: &GenerateOutcome,
    out_dir: &Utf8Path,
    writer: &dyn WritePort,
) -> anyhow::Result<()> {
    writer.create_dir_all(out_dir)?;
    for (path, text) in &outcome.files {
        writer.write_file(&out_dir.join(path), text.as_bytes())?;
    }
    debug!(out_dir = %out_dir, files = outcome.files.len(), "wrote generated outputs");
    Ok(())
}

/// Compare the outputs on disk with what generation would write.
pub fn check_outputs(outcome: &GenerateOutcome, out_dir: &Utf8Path) -> anyhow::Result<Vec<StaleFile>> {
    let mut stale = Vec::new();
    for (path, expected) in &outcome.files {
        let full = out_dir.join(path);
        if !full.exists() {
            stale.push(StaleFile {
                path: path.clone(),
                reason: StaleReason::Missing,
            });
            continue;
        }
        if fs::read_to_string(&full)? != *expected {
            stale.push(StaleFile {
                path: path.clone(),
                reason: StaleReason::Changed,
            });
        }
    }

    let known: BTreeSet<&Utf8PathBuf> = outcome.files.keys().collect();
    let pattern = out_dir.join("*/*.toml");
    for entry in glob(pattern.as_str()).context("glob generated modules")? {
        let path = entry.map_err(|e| anyhow::anyhow!("glob error: {e}"))?;
        let path = Utf8PathBuf::try_from(path).context("generated path is not UTF-8")?;
        let relative = path
            .strip_prefix(out_dir)
            .map(Utf8Path::to_path_buf)
            .unwrap_or(path);
        if !known.contains(&relative) {
            stale.push(StaleFile {
                path: relative,
                reason: StaleReason::Unexpected,
            });
        }
    }
    stale.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(stale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{FsWritePort, InMemoryHeadSource};
    use tempfile::TempDir;

    fn outcome() -> GenerateOutcome {
        let head = InMemoryHeadSource::new([(
            "users",
            "[schemas.User.fields]\nid = \"int\"\nemail = \"str\"\n",
        )]);
        let manifest: VersionsManifest = toml::from_str(
            r#"
            [[versions]]
            version = "2000-01-01"

            [[versions]]
            version = "2001-01-01"

            [[versions.changes]]
            name = "add email"
            instructions = [{ kind = "field_didnt_exist", schema = "User", field = "email" }]
            "#,
        )
        .unwrap();
        run_generate(&head, &manifest, true).unwrap()
    }

    #[test]
    fn lays_out_versions_and_report() {
        let outcome = outcome();
        let paths: Vec<&str> = outcome.files.keys().map(|p| p.as_str()).collect();
        assert_eq!(
            paths,
            vec!["2000-01-01/users.toml", "2001-01-01/users.toml", "report.json"]
        );
        let old = &outcome.files[&Utf8PathBuf::from("2000-01-01/users.toml")];
        assert!(old.starts_with("# Generated by backdate for version 2000-01-01."));
        assert!(!old.contains("email"));
    }

    #[test]
    fn check_detects_missing_changed_and_unexpected_files() {
        let temp = TempDir::new().unwrap();
        let out = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let outcome = outcome();

        assert_eq!(check_outputs(&outcome, &out).unwrap().len(), 3);

        write_outputs(&outcome, &out, &FsWritePort).unwrap();
        assert!(check_outputs(&outcome, &out).unwrap().is_empty());

        fs::write(out.join("2001-01-01/users.toml"), "edited").unwrap();
        fs::write(out.join("2001-01-01/extra.toml"), "").unwrap();
        let stale = check_outputs(&outcome, &out).unwrap();
        assert_eq!(
            stale,
            vec![
                StaleFile {
                    path: Utf8PathBuf::from("2001-01-01/extra.toml"),
                    reason: StaleReason::Unexpected,
                },
                StaleFile {
                    path: Utf8PathBuf::from("2001-01-01/users.toml"),
                    reason: StaleReason::Changed,
                },
            ]
        );
    }

    #[test]
    fn exit_codes() {
        assert_eq!(ToolError::Stale(vec![]).exit_code(), 2);
        assert_eq!(ToolError::from(anyhow::anyhow!("x")).exit_code(), 1);
    }
}
