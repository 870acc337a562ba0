//! Schema catalog for RELQ.
//!
//! The catalog stores metadata about entities, their relationships, and
//! named scopes. It is built once at schema-definition time and read-only
//! during compilation.

mod entity;
mod relation;
#[allow(clippy::module_inception)]
mod schema;

pub use entity::EntityDef;
pub use relation::{MorphDef, PivotDef, RelationDef, RelationKind};
pub use schema::{Resolved, Schema, ScopeArgs, ScopeFn};
