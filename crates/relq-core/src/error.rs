//! Core error types.

use thiserror::Error;

/// Compilation errors.
///
/// Every error surfaces synchronously to the caller; compilation performs no
/// logging, retry, or partial recovery on the error path. A malformed filter
/// fails the whole compilation rather than silently dropping the offending
/// clause. The single documented leniency is the unknown per-field operator
/// key, which is skipped, not raised.
#[derive(Debug, Error)]
pub enum Error {
    /// Filter/sort DSL error.
    #[error("dsl error: {0}")]
    Dsl(#[from] relq_dsl::Error),

    /// The base entity is not defined in the schema.
    #[error("unknown entity '{entity}'")]
    UnknownEntity {
        /// The entity name.
        entity: String,
    },

    /// A path hop is neither a known relationship nor a known scope.
    #[error("cannot resolve '{hop}' in path '{path}': not a relationship or scope")]
    UnresolvablePath {
        /// The full path being resolved.
        path: String,
        /// The hop that failed.
        hop: String,
    },

    /// The final path segment is not a column on the resolved entity.
    #[error("unknown column '{column}' on entity '{entity}'")]
    UnknownColumn {
        /// The entity resolved for the final segment.
        entity: String,
        /// The missing column name.
        column: String,
    },

    /// The path crosses a morph-to relationship, whose target table is
    /// row-dependent and cannot be expressed as a static join.
    #[error("relationship '{relation}' has a row-dependent target and cannot be joined")]
    UnsupportedRelationship {
        /// The relationship name.
        relation: String,
    },

    /// A schema definition invariant was violated.
    #[error("invalid schema definition: {0}")]
    Schema(String),
}
