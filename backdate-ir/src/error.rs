use thiserror::Error;

/// Errors raised while parsing or structurally editing HEAD modules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IrError {
    #[error("parse module `{module}`: {message}")]
    Parse { module: String, message: String },

    #[error("module `{module}`: `{path}` must be {expected}")]
    Malformed {
        module: String,
        path: String,
        expected: &'static str,
    },

    #[error("duplicate module `{0}`")]
    DuplicateModule(String),

    #[error("symbol `{name}` is defined in both `{first}` and `{second}`")]
    DuplicateSymbol {
        name: String,
        first: String,
        second: String,
    },

    #[error("unknown symbol `{0}`")]
    UnknownSymbol(String),

    #[error("cannot represent {what} in a schema module")]
    UnsupportedValue { what: String },
}
