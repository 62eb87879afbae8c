use backdate_domain::{Direction, ResolutionError};
use backdate_edit::InstructionError;
use backdate_ir::IrError;
use backdate_types::{Instruction, VersionScheme};
use thiserror::Error;

/// Generation is all-or-nothing: the first failure aborts the run.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(
        "{version}: change `{change}`, instructions[{index}] ({}): {source}",
        .instruction.kind()
    )]
    Instruction {
        version: String,
        change: String,
        index: usize,
        instruction: Box<Instruction>,
        #[source]
        source: InstructionError,
    },

    #[error("{version}: module `{module}` rendered to invalid source: {source}")]
    Render {
        version: String,
        module: String,
        #[source]
        source: IrError,
    },
}

impl GenerationError {
    /// Stable token for reports and logs.
    pub fn code(&self) -> &'static str {
        match self {
            GenerationError::Instruction { source, .. } => source.code(),
            GenerationError::Render { .. } => "invalid_render",
        }
    }

    /// The version whose derivation failed.
    pub fn version(&self) -> &str {
        match self {
            GenerationError::Instruction { version, .. } | GenerationError::Render { version, .. } => {
                version
            }
        }
    }
}

/// Per-call runtime failure. Never affects other calls.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("request body does not match `{schema}`: {}", .errors.join("; "))]
    ClientValidation { schema: String, errors: Vec<String> },

    #[error("`{method} {path}` does not exist in version {version}")]
    UnknownRoute {
        method: String,
        path: String,
        version: String,
    },

    #[error("no endpoint registered for `{method} {path}`")]
    UnregisteredEndpoint { method: String, path: String },

    #[error("migrated {direction} body does not match `{schema}`: {}", .errors.join("; "))]
    Integrity {
        direction: Direction,
        schema: String,
        errors: Vec<String>,
    },

    #[error("{direction} converter of change `{change}` failed: {source:#}")]
    Converter {
        direction: Direction,
        change: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("schema `{schema}` is not known to the validator")]
    UnknownSchema { schema: String },

    #[error("default version `{token}` is unusable: {source}")]
    DefaultVersion {
        token: String,
        #[source]
        source: ResolutionError,
    },

    #[error("pipeline is configured for the {expected} scheme but the graph uses {found}")]
    SchemeMismatch {
        expected: VersionScheme,
        found: VersionScheme,
    },

    #[error("business logic failed: {0:#}")]
    Handler(anyhow::Error),
}

impl MigrationError {
    /// HTTP status the dispatch layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            MigrationError::Resolution(e) => e.status_code(),
            MigrationError::ClientValidation { .. } => 422,
            MigrationError::UnknownRoute { .. } => 404,
            MigrationError::UnregisteredEndpoint { .. }
            | MigrationError::Integrity { .. }
            | MigrationError::Converter { .. }
            | MigrationError::UnknownSchema { .. }
            | MigrationError::DefaultVersion { .. }
            | MigrationError::SchemeMismatch { .. }
            | MigrationError::Handler(_) => 500,
        }
    }

    /// `true` when the caller sent something wrong; server faults are `false`.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}
