//! Error types for backdate-edit.
//!
//! Every variant is a declaration error: the instruction contradicts the
//! working copy it was applied to.

use backdate_ir::IrError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InstructionError {
    #[error("unknown schema `{0}`")]
    UnknownSchema(String),

    #[error("unknown enum `{0}`")]
    UnknownEnum(String),

    #[error("unknown module `{0}`")]
    UnknownModule(String),

    #[error("field `{schema}.{field}` already exists")]
    DuplicateField { schema: String, field: String },

    #[error("field `{schema}.{field}` does not exist")]
    UnknownField { schema: String, field: String },

    #[error("`{attribute}` is not a known attribute of {target}")]
    UnknownAttribute { target: String, attribute: String },

    #[error("{target}: `{attribute}` must be {expected}")]
    InvalidValue {
        target: String,
        attribute: String,
        expected: &'static str,
    },

    #[error("{target} already has {attribute} = {value}")]
    AlreadyInState {
        target: String,
        attribute: String,
        value: String,
    },

    #[error("{target} has no `{attribute}` to remove")]
    MissingAttribute { target: String, attribute: String },

    #[error("enum `{enum_name}` already has member `{member}`")]
    DuplicateEnumMember { enum_name: String, member: String },

    #[error("enum `{enum_name}` has no member `{member}`")]
    UnknownEnumMember { enum_name: String, member: String },

    #[error("validator `{schema}@{validator}` already exists")]
    DuplicateValidator { schema: String, validator: String },

    #[error("validator `{schema}@{validator}` does not exist")]
    UnknownValidator { schema: String, validator: String },

    #[error("no endpoint matches {0}")]
    UnknownEndpoint(String),

    #[error("{route} matches {count} endpoints; add `func` to disambiguate")]
    AmbiguousEndpoint { route: String, count: usize },

    #[error("endpoint {0} already exists")]
    EndpointAlreadyExists(String),

    #[error("endpoint {0} already does not exist")]
    EndpointAlreadyAbsent(String),

    #[error("import `{module}::{name}` is already `{value}`")]
    ImportAlreadyPresent {
        module: String,
        name: String,
        value: String,
    },

    #[error(transparent)]
    Ir(#[from] IrError),
}

impl InstructionError {
    /// Stable token for reports and logs.
    pub fn code(&self) -> &'static str {
        match self {
            InstructionError::UnknownSchema(_) => "unknown_schema",
            InstructionError::UnknownEnum(_) => "unknown_enum",
            InstructionError::UnknownModule(_) => "unknown_module",
            InstructionError::DuplicateField { .. } => "duplicate_field",
            InstructionError::UnknownField { .. } => "unknown_field",
            InstructionError::UnknownAttribute { .. } => "unknown_attribute",
            InstructionError::InvalidValue { .. } => "invalid_value",
            InstructionError::AlreadyInState { .. } => "already_in_state",
            InstructionError::MissingAttribute { .. } => "missing_attribute",
            InstructionError::DuplicateEnumMember { .. } => "duplicate_enum_member",
            InstructionError::UnknownEnumMember { .. } => "unknown_enum_member",
            InstructionError::DuplicateValidator { .. } => "duplicate_validator",
            InstructionError::UnknownValidator { .. } => "unknown_validator",
            InstructionError::UnknownEndpoint(_) => "unknown_endpoint",
            InstructionError::AmbiguousEndpoint { .. } => "ambiguous_endpoint",
            InstructionError::EndpointAlreadyExists(_) => "endpoint_already_exists",
            InstructionError::EndpointAlreadyAbsent(_) => "endpoint_already_absent",
            InstructionError::ImportAlreadyPresent { .. } => "import_already_present",
            InstructionError::Ir(IrError::DuplicateSymbol { .. }) => "duplicate_symbol",
            InstructionError::Ir(_) => "ir",
        }
    }

    /// The claimed older state is already the current state.
    pub fn is_redundant(&self) -> bool {
        matches!(
            self,
            InstructionError::AlreadyInState { .. }
                | InstructionError::DuplicateField { .. }
                | InstructionError::DuplicateEnumMember { .. }
                | InstructionError::DuplicateValidator { .. }
                | InstructionError::EndpointAlreadyExists(_)
                | InstructionError::EndpointAlreadyAbsent(_)
                | InstructionError::ImportAlreadyPresent { .. }
        )
    }
}
