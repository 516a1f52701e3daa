//! Declaration error types.

use thiserror::Error;

use crate::graph::GraphError;

/// Error raised synchronously while declaring targets. Always fatal.
#[derive(Debug, Error)]
pub enum DeclarationError {
    #[error("cyclic library dependency: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("target `{name}` is already declared in distribution `{dist}`")]
    DuplicateTarget { dist: String, name: String },

    #[error("invalid package handle given to `{compilation}` (id {id})")]
    InvalidPackageHandle { compilation: String, id: usize },

    #[error("package `{package}` given to `{compilation}` was found by another distribution")]
    ForeignPackageHandle {
        compilation: String,
        package: String,
    },

    #[error("unknown library type `{0}` (expected default, static or dynamic)")]
    UnknownLibraryType(String),

    #[error("distribution `{dist}` is bound to a different build graph")]
    ForeignGraph { dist: String },

    #[error(transparent)]
    Graph(#[from] GraphError),
}
