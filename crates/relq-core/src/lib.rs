//! RELQ Core - Schema catalog and request-time query compilation.
//!
//! This crate turns parsed filter/sort requests into relational queries:
//! dotted relationship paths become aliased LEFT joins, to-many paths
//! become correlated EXISTS subqueries, and the result renders as SQL.

pub mod builder;
pub mod error;
pub mod query;
pub mod schema;

pub use builder::{
    CompareOp, Conjunction, Join, JoinCondition, OrderClause, OrderTarget, Predicate,
    QueryBuilder, WhereClause,
};
pub use error::Error;
pub use query::{
    cardinality_of, Cardinality, ColumnResolution, Compiler, FilterCompiler, JoinEmitter,
    QueryContext, SortCompiler,
};
pub use schema::{
    EntityDef, MorphDef, PivotDef, RelationDef, RelationKind, Resolved, Schema, ScopeArgs,
    ScopeFn,
};

/// Re-export the request DSL types.
pub use relq_dsl as dsl;
