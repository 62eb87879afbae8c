//! The ordered timeline of version markers and the changes between them.

use crate::change::VersionChange;
use crate::error::DeclarationError;
use crate::side_effect::SideEffect;
use backdate_types::manifest::VersionsManifest;
use backdate_types::{Instruction, VersionId, VersionScheme};
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// A position on the timeline: a registered marker, or HEAD past the newest one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GraphPoint {
    Version(usize),
    Head,
}

impl fmt::Display for GraphPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphPoint::Version(i) => write!(f, "version #{i}"),
            GraphPoint::Head => f.write_str("head"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Oldest change first; request migration.
    Ascending,
    /// Newest change first; response migration and code generation.
    Descending,
}

/// A named point on the timeline and the changes that introduced it.
#[derive(Debug, Clone)]
pub struct VersionMarker {
    id: VersionId,
    changes: Vec<VersionChange>,
}

impl VersionMarker {
    pub fn id(&self) -> &VersionId {
        &self.id
    }

    /// Changes describing how this version differs from the previous one.
    pub fn changes(&self) -> &[VersionChange] {
        &self.changes
    }
}

/// A change together with the point that owns it.
#[derive(Debug, Clone, Copy)]
pub struct ChangeRef<'a> {
    pub point: GraphPoint,
    pub change: &'a VersionChange,
}

/// Version markers oldest to newest, plus the HEAD pseudo-marker.
///
/// Read-only once built; share it behind an `Arc` across requests.
#[derive(Debug, Clone)]
pub struct VersionGraph {
    scheme: VersionScheme,
    markers: Vec<VersionMarker>,
    head_changes: Vec<VersionChange>,
    change_names: BTreeSet<String>,
}

impl VersionGraph {
    pub fn new(scheme: VersionScheme) -> Self {
        Self {
            scheme,
            markers: Vec::new(),
            head_changes: Vec::new(),
            change_names: BTreeSet::new(),
        }
    }

    /// Build an instructions-only graph from a manifest.
    pub fn from_manifest(manifest: &VersionsManifest) -> Result<Self, DeclarationError> {
        let mut graph = Self::new(manifest.scheme);
        for version in &manifest.versions {
            let changes = version
                .changes
                .iter()
                .map(VersionChange::from_manifest)
                .collect();
            graph.register(&version.version, changes)?;
        }
        graph.register_head_changes(manifest.head.iter().map(VersionChange::from_manifest).collect())?;
        Ok(graph)
    }

    pub fn scheme(&self) -> VersionScheme {
        self.scheme
    }

    pub fn markers(&self) -> &[VersionMarker] {
        &self.markers
    }

    pub fn marker(&self, position: usize) -> Option<&VersionMarker> {
        self.markers.get(position)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn head_changes(&self) -> &[VersionChange] {
        &self.head_changes
    }

    pub fn position(&self, id: &VersionId) -> Option<usize> {
        self.markers.iter().position(|m| &m.id == id)
    }

    /// Human name of a point: the marker's token, or `HEAD`.
    pub fn label(&self, point: GraphPoint) -> String {
        match point {
            GraphPoint::Head => "HEAD".to_string(),
            GraphPoint::Version(i) => self
                .markers
                .get(i)
                .map(|m| m.id.to_string())
                .unwrap_or_else(|| point.to_string()),
        }
    }

    /// Parse `token` under the graph's scheme and register it.
    pub fn register(
        &mut self,
        token: &str,
        changes: Vec<VersionChange>,
    ) -> Result<(), DeclarationError> {
        let id = self.scheme.parse(token)?;
        self.register_version(id, changes)
    }

    /// Append a marker. Markers must arrive oldest first.
    pub fn register_version(
        &mut self,
        id: VersionId,
        changes: Vec<VersionChange>,
    ) -> Result<(), DeclarationError> {
        if id.scheme() != self.scheme {
            return Err(DeclarationError::SchemeMismatch {
                version: id.to_string(),
                expected: self.scheme,
                found: id.scheme(),
            });
        }
        if self.position(&id).is_some() {
            return Err(DeclarationError::DuplicateVersion(id.to_string()));
        }
        if let Some(last) = self.markers.last()
            && self.scheme.is_ordered()
            && last.id.partial_cmp(&id) != Some(std::cmp::Ordering::Less)
        {
            return Err(DeclarationError::OrderingError {
                previous: last.id.to_string(),
                next: id.to_string(),
            });
        }
        if self.markers.is_empty() && !changes.is_empty() {
            return Err(DeclarationError::FirstVersionHasChanges {
                version: id.to_string(),
                count: changes.len(),
            });
        }
        self.claim_names(&changes)?;

        debug!(version = %id, changes = changes.len(), "registered version");
        self.markers.push(VersionMarker { id, changes });
        Ok(())
    }

    /// Changes bridging HEAD and the newest real version.
    pub fn register_head_changes(
        &mut self,
        changes: Vec<VersionChange>,
    ) -> Result<(), DeclarationError> {
        self.claim_names(&changes)?;
        debug!(changes = changes.len(), "registered head changes");
        self.head_changes.extend(changes);
        Ok(())
    }

    fn claim_names(&mut self, changes: &[VersionChange]) -> Result<(), DeclarationError> {
        let mut fresh = BTreeSet::new();
        for change in changes {
            let name = change.name().to_string();
            if self.change_names.contains(&name) || !fresh.insert(name.clone()) {
                return Err(DeclarationError::DuplicateChange(name));
            }
        }
        self.change_names.extend(fresh);
        Ok(())
    }

    /// Changes owned by one point, in declaration order.
    pub fn changes_at(&self, point: GraphPoint) -> &[VersionChange] {
        match point {
            GraphPoint::Head => &self.head_changes,
            GraphPoint::Version(i) => self
                .markers
                .get(i)
                .map(|m| m.changes.as_slice())
                .unwrap_or_default(),
        }
    }

    fn points_after(&self, from: GraphPoint, to: GraphPoint) -> Vec<GraphPoint> {
        (0..self.markers.len())
            .map(GraphPoint::Version)
            .chain(std::iter::once(GraphPoint::Head))
            .filter(|p| *p > from && *p <= to)
            .collect()
    }

    /// Every change owned by a point in `(from, to]`.
    ///
    /// A marker's changes describe how it differs from its predecessor, so the
    /// changes separating a caller at `from` from HEAD are those of every later
    /// point. `order` picks the direction across points; changes within one
    /// point always keep their declaration order.
    pub fn all_changes_between(
        &self,
        from: GraphPoint,
        to: GraphPoint,
        order: Order,
    ) -> Vec<ChangeRef<'_>> {
        let mut points = self.points_after(from, to);
        if order == Order::Descending {
            points.reverse();
        }
        points
            .into_iter()
            .flat_map(|point| {
                self.changes_at(point)
                    .iter()
                    .map(move |change| ChangeRef { point, change })
            })
            .collect()
    }

    /// The point owning a change, by name.
    pub fn change_owner(&self, name: &str) -> Option<GraphPoint> {
        if self.head_changes.iter().any(|c| c.name() == name) {
            return Some(GraphPoint::Head);
        }
        self.markers
            .iter()
            .position(|m| m.changes.iter().any(|c| c.name() == name))
            .map(GraphPoint::Version)
    }

    /// What the HEAD schema `head_name` was called at `point`.
    pub fn schema_name_at(&self, head_name: &str, point: GraphPoint) -> String {
        let mut current = head_name.to_string();
        for r in self.all_changes_between(point, GraphPoint::Head, Order::Descending) {
            for instruction in r.change.instructions() {
                if let Instruction::SchemaRenamed { schema, name } = instruction
                    && *schema == current
                {
                    current = name.clone();
                }
            }
        }
        current
    }

    /// Gate for business logic that differs across a change flagged with side effects.
    pub fn side_effect(&self, change: &str) -> Result<SideEffect, DeclarationError> {
        let owner = self
            .change_owner(change)
            .ok_or_else(|| DeclarationError::UnknownChange(change.to_string()))?;
        let flagged = self
            .changes_at(owner)
            .iter()
            .any(|c| c.name() == change && c.has_side_effects());
        if !flagged {
            return Err(DeclarationError::NotASideEffect(change.to_string()));
        }
        Ok(SideEffect::new(change, owner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_sorts_after_every_version() {
        assert!(GraphPoint::Version(usize::MAX) < GraphPoint::Head);
        assert!(GraphPoint::Version(1) < GraphPoint::Version(2));
    }

    #[test]
    fn empty_range_yields_nothing() {
        let graph = VersionGraph::new(VersionScheme::Date);
        assert!(
            graph
                .all_changes_between(GraphPoint::Head, GraphPoint::Head, Order::Ascending)
                .is_empty()
        );
    }
}
