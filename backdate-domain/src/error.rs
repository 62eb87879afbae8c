use backdate_types::{VersionParseError, VersionScheme};
use thiserror::Error;

/// Mistakes in how versions and changes were declared. Always fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclarationError {
    #[error("version `{0}` is registered twice")]
    DuplicateVersion(String),

    #[error("version `{next}` must be newer than `{previous}`")]
    OrderingError { previous: String, next: String },

    #[error("the first version `{version}` cannot carry changes ({count} given)")]
    FirstVersionHasChanges { version: String, count: usize },

    #[error("version change `{0}` is registered twice")]
    DuplicateChange(String),

    #[error("version `{version}` uses the {found} scheme but the graph uses {expected}")]
    SchemeMismatch {
        version: String,
        expected: VersionScheme,
        found: VersionScheme,
    },

    #[error(transparent)]
    InvalidVersion(#[from] VersionParseError),

    #[error("unknown version change `{0}`")]
    UnknownChange(String),

    #[error("version change `{0}` is not flagged as having side effects")]
    NotASideEffect(String),
}

/// Failure to map a caller's version token onto the graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("`{token}` is not a valid version: {message}")]
    InvalidToken { token: String, message: String },

    #[error("unknown version `{0}`")]
    UnknownVersion(String),

    #[error("version `{requested}` is older than the oldest supported version `{oldest}`")]
    VersionTooOld { requested: String, oldest: String },

    #[error("no versions are registered")]
    NoVersions,

    #[error("request carries no version and no default is configured")]
    MissingVersion,
}

impl ResolutionError {
    /// Resolution failures are the caller's problem.
    pub fn status_code(&self) -> u16 {
        match self {
            ResolutionError::NoVersions => 500,
            _ => 400,
        }
    }
}
