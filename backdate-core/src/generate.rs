//! Reconstruct every historical version from HEAD.
//!
//! The walk runs newest to oldest over one working copy. A marker's changes
//! describe how it differs from its predecessor, so each marker is
//! snapshotted first and its changes are reverse-applied afterwards to reach
//! the previous marker. HEAD pseudo-changes run before the newest snapshot.

use crate::error::GenerationError;
use backdate_domain::{GraphPoint, VersionChange, VersionGraph, VersionMarker};
use backdate_edit::{apply_instruction, render_patch};
use backdate_ir::{HeadIr, SchemaModule};
use backdate_types::report::{FileDigest, GenerationReport, VersionReport};
use backdate_types::{VersionId, VersionScheme};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Label accepted by [`GeneratedVersions::sources`] for the HEAD sources.
pub const HEAD_LABEL: &str = "HEAD";

/// One reconstructed version.
#[derive(Debug, Clone)]
pub struct GeneratedVersion {
    id: VersionId,
    changes: Vec<String>,
    ir: HeadIr,
    sources: BTreeMap<String, String>,
}

impl GeneratedVersion {
    pub fn id(&self) -> &VersionId {
        &self.id
    }

    /// Names of the changes this version introduced.
    pub fn changes(&self) -> &[String] {
        &self.changes
    }

    /// The IR snapshot, for inspection.
    pub fn ir(&self) -> &HeadIr {
        &self.ir
    }

    /// Rendered module sources keyed by module name.
    pub fn sources(&self) -> &BTreeMap<String, String> {
        &self.sources
    }
}

/// Every generated version, oldest first.
#[derive(Debug, Clone)]
pub struct GeneratedVersions {
    scheme: VersionScheme,
    head_ir: HeadIr,
    head: BTreeMap<String, String>,
    versions: Vec<GeneratedVersion>,
}

impl GeneratedVersions {
    pub fn scheme(&self) -> VersionScheme {
        self.scheme
    }

    pub fn versions(&self) -> &[GeneratedVersion] {
        &self.versions
    }

    /// The HEAD the versions were derived from.
    pub fn head_ir(&self) -> &HeadIr {
        &self.head_ir
    }

    pub fn get(&self, version: &str) -> Option<&GeneratedVersion> {
        self.versions.iter().find(|v| v.id.to_string() == version)
    }

    /// Sources of a version, or of HEAD itself for [`HEAD_LABEL`].
    pub fn sources(&self, version: &str) -> Option<&BTreeMap<String, String>> {
        if version.eq_ignore_ascii_case(HEAD_LABEL) {
            return Some(&self.head);
        }
        self.get(version).map(GeneratedVersion::sources)
    }

    /// Unified diff taking `from`'s modules to `to`'s. Either side may be `HEAD`.
    pub fn patch_between(&self, from: &str, to: &str) -> Option<String> {
        Some(render_patch(self.sources(from)?, self.sources(to)?))
    }

    /// Fingerprints of every generated module.
    pub fn report(&self) -> GenerationReport {
        let mut report = GenerationReport::new(self.scheme);
        report.versions = self
            .versions
            .iter()
            .map(|v| VersionReport {
                version: v.id.to_string(),
                changes: v.changes.clone(),
                files: v
                    .sources
                    .iter()
                    .map(|(module, text)| FileDigest {
                        module: module.clone(),
                        sha256: sha256_hex(text.as_bytes()),
                        bytes: text.len() as u64,
                    })
                    .collect(),
            })
            .collect();
        report
    }
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

/// Derive every version in `graph` from `head`.
///
/// `head` is never mutated. Any instruction whose precondition fails aborts
/// the run; nothing is returned for the versions that did succeed.
pub fn generate(head: &HeadIr, graph: &VersionGraph) -> Result<GeneratedVersions, GenerationError> {
    let mut working = head.clone();
    reverse_apply(&mut working, graph, GraphPoint::Head, graph.head_changes())?;

    let mut versions = Vec::with_capacity(graph.len());
    for (position, marker) in graph.markers().iter().enumerate().rev() {
        versions.push(snapshot(marker, &working)?);
        reverse_apply(
            &mut working,
            graph,
            GraphPoint::Version(position),
            marker.changes(),
        )?;
    }
    versions.reverse();

    Ok(GeneratedVersions {
        scheme: graph.scheme(),
        head_ir: head.clone(),
        head: head.render(),
        versions,
    })
}

fn reverse_apply(
    working: &mut HeadIr,
    graph: &VersionGraph,
    point: GraphPoint,
    changes: &[VersionChange],
) -> Result<(), GenerationError> {
    for change in changes {
        for (index, instruction) in change.instructions().iter().enumerate() {
            debug!(
                point = %graph.label(point),
                change = change.name(),
                index,
                kind = instruction.kind(),
                "reverse-applying instruction"
            );
            apply_instruction(working, instruction).map_err(|source| {
                GenerationError::Instruction {
                    version: graph.label(point),
                    change: change.name().to_string(),
                    index,
                    instruction: Box::new(instruction.clone()),
                    source,
                }
            })?;
        }
    }
    Ok(())
}

fn snapshot(marker: &VersionMarker, working: &HeadIr) -> Result<GeneratedVersion, GenerationError> {
    let sources = working.render();
    // Every snapshot must re-parse; a broken render is never emitted.
    for (module, text) in &sources {
        SchemaModule::parse(module.as_str(), text).map_err(|source| GenerationError::Render {
            version: marker.id().to_string(),
            module: module.clone(),
            source,
        })?;
    }
    info!(
        version = %marker.id(),
        modules = sources.len(),
        changes = marker.changes().len(),
        "generated version"
    );
    Ok(GeneratedVersion {
        id: marker.id().clone(),
        changes: marker.changes().iter().map(|c| c.name().to_string()).collect(),
        ir: working.clone(),
        sources,
    })
}
