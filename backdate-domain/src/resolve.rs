//! Version resolution with waterfall to the nearest lower version.

use crate::error::ResolutionError;
use crate::graph::{GraphPoint, VersionGraph};
use backdate_types::VersionId;
use std::cmp::Ordering;
use tracing::debug;

/// The marker a request runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersion {
    pub id: VersionId,
    /// Index of the marker in the graph, oldest = 0.
    pub position: usize,
    /// The token as the caller sent it.
    pub requested: String,
    /// `false` when the token waterfalled to a lower marker.
    pub exact: bool,
}

impl ResolvedVersion {
    pub fn point(&self) -> GraphPoint {
        GraphPoint::Version(self.position)
    }
}

impl VersionGraph {
    /// Map a caller token to a marker.
    ///
    /// Exact matches win. Ordered schemes fall back to the nearest strictly
    /// lower marker; opaque schemes require an exact match.
    pub fn resolve(&self, token: &str) -> Result<ResolvedVersion, ResolutionError> {
        let requested = token.trim().to_string();
        let oldest = self.markers().first().ok_or(ResolutionError::NoVersions)?;
        let id = self
            .scheme()
            .parse(&requested)
            .map_err(|e| ResolutionError::InvalidToken {
                token: requested.clone(),
                message: e.to_string(),
            })?;

        if let Some(position) = self.position(&id) {
            return Ok(ResolvedVersion {
                id,
                position,
                requested,
                exact: true,
            });
        }

        if !self.scheme().is_ordered() {
            return Err(ResolutionError::UnknownVersion(requested));
        }

        let lower = self
            .markers()
            .iter()
            .rposition(|m| m.id().partial_cmp(&id) == Some(Ordering::Less));
        match lower {
            Some(position) => {
                let resolved = self.markers()[position].id().clone();
                debug!(requested = %requested, resolved = %resolved, "waterfalled version");
                Ok(ResolvedVersion {
                    id: resolved,
                    position,
                    requested,
                    exact: false,
                })
            }
            None => Err(ResolutionError::VersionTooOld {
                requested,
                oldest: oldest.id().to_string(),
            }),
        }
    }

    /// The newest marker, used when a request carries no token.
    pub fn latest(&self) -> Option<ResolvedVersion> {
        let position = self.len().checked_sub(1)?;
        let id = self.markers()[position].id().clone();
        Some(ResolvedVersion {
            requested: id.to_string(),
            id,
            position,
            exact: true,
        })
    }
}
