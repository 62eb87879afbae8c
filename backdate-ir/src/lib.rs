//! Syntax-preserving IR for HEAD schema modules.
//!
//! Each module is a TOML document holding `[imports]`, `[schemas.*]`,
//! `[enums.*]` and `[[endpoints]]`. The IR wraps a lossless `toml_edit`
//! tree: structural edits touch only the affected entries, so comments,
//! ordering and whitespace elsewhere survive into every generated version.

pub mod error;
pub mod head;
pub mod module;
pub mod syntax;
pub mod value;
pub mod view;

pub use error::IrError;
pub use head::HeadIr;
pub use module::{EndpointMut, EnumMut, SchemaModule, SchemaMut};
pub use view::{EndpointIr, EnumIr, FieldIr, SchemaIr, SymbolKind, ValidatorIr};
