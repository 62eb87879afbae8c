use crate::context::current_version;
use crate::graph::GraphPoint;

/// Lets business logic ask whether a behavioural change is active for the
/// current request without naming versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideEffect {
    change: String,
    owner: GraphPoint,
}

impl SideEffect {
    pub(crate) fn new(change: &str, owner: GraphPoint) -> Self {
        Self {
            change: change.to_string(),
            owner,
        }
    }

    pub fn change(&self) -> &str {
        &self.change
    }

    /// `true` outside any request (HEAD behaviour) or when the request's
    /// version is at or after the version that introduced the change.
    /// Changes between HEAD and the newest version are never applied to a
    /// versioned request.
    pub fn is_applied(&self) -> bool {
        match current_version() {
            None => true,
            Some(resolved) => match self.owner {
                GraphPoint::Head => false,
                GraphPoint::Version(introduced) => resolved.position >= introduced,
            },
        }
    }
}
