//! Domain logic: the version timeline and how a request maps onto it.
//!
//! This crate owns *which* changes separate a caller from HEAD and in what
//! order. Applying them is elsewhere: structural instructions in
//! `backdate-edit`, body converters in `backdate-core`'s pipeline.

mod change;
pub mod context;
mod converter;
mod error;
mod graph;
mod resolve;
mod side_effect;

pub use change::VersionChange;
pub use converter::{
    ConverterId, ConverterTarget, Direction, RequestConverter, RequestFn, RequestInfo,
    ResponseConverter, ResponseFn, ResponseInfo,
};
pub use error::{DeclarationError, ResolutionError};
pub use graph::{ChangeRef, GraphPoint, Order, VersionGraph, VersionMarker};
pub use resolve::ResolvedVersion;
pub use side_effect::SideEffect;
