//! Path resolution against the schema catalog.
//!
//! `QueryContext` turns a dotted path like `customer.address.city` into a
//! fully qualified column, emitting the joins each relationship hop needs
//! along the way. Scope hops hand control to the registered scope closure
//! instead of producing a column.

use tracing::debug;

use relq_dsl::Value;

use crate::builder::QueryBuilder;
use crate::error::Error;
use crate::query::join::JoinEmitter;
use crate::schema::{Resolved, Schema, ScopeArgs};

/// The outcome of resolving one dotted path.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnResolution {
    /// A fully qualified `alias.column` reference.
    Column(String),
    /// The path named a scope; it has already mutated the query and there
    /// is no column to predicate on.
    ScopeApplied,
}

/// How many related rows a path can reach per root row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// At most one related row per root row.
    Single,
    /// Possibly many related rows per root row.
    Multiple,
    /// Cannot be determined statically (scope or unresolvable hop).
    Unknown,
}

/// Classify a dotted path by the relationship hops it traverses. Any
/// to-many hop makes the whole path `Multiple`; a scope or unresolvable
/// hop makes it `Unknown`.
pub fn cardinality_of(schema: &Schema, entity: &str, path: &str) -> Cardinality {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.len() < 2 {
        return Cardinality::Single;
    }

    let mut current = entity.to_string();
    let mut cardinality = Cardinality::Single;
    for hop in &segments[..segments.len() - 1] {
        match schema.resolve_relationship(&current, hop) {
            Resolved::Relation(relation) => {
                if relation.kind.is_to_many() {
                    cardinality = Cardinality::Multiple;
                }
                current = relation.target.clone();
            }
            Resolved::Scope(_) | Resolved::Unknown => return Cardinality::Unknown,
        }
    }
    cardinality
}

/// Resolution context for one query compilation.
pub struct QueryContext<'a> {
    schema: &'a Schema,
    entity: String,
    builder: &'a mut QueryBuilder,
}

impl std::fmt::Debug for QueryContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryContext")
            .field("entity", &self.entity)
            .field("builder", &self.builder)
            .finish_non_exhaustive()
    }
}

impl<'a> QueryContext<'a> {
    /// Create a context rooted at an entity known to the schema.
    pub fn new(
        schema: &'a Schema,
        entity: impl Into<String>,
        builder: &'a mut QueryBuilder,
    ) -> Result<Self, Error> {
        let entity = entity.into();
        if schema.entity(&entity).is_none() {
            return Err(Error::UnknownEntity { entity });
        }
        Ok(Self {
            schema,
            entity,
            builder,
        })
    }

    /// Root entity of this compilation.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// The query being built.
    pub fn builder(&mut self) -> &mut QueryBuilder {
        self.builder
    }

    /// Resolve a dotted path into a qualified column, emitting any joins
    /// the hops need. `params` are forwarded to scope closures.
    pub fn resolve_column(&mut self, path: &str, params: &[Value]) -> Result<ColumnResolution, Error> {
        let path = path.trim();

        // Expressions pass through untouched. A computed select like
        // `COUNT(items.id) as item_count` is the caller's responsibility.
        if path.contains('(') || path.to_ascii_lowercase().contains(" as ") {
            return Ok(ColumnResolution::Column(path.to_string()));
        }
        if path.len() >= 2 && path.starts_with('`') && path.ends_with('`') {
            return Ok(ColumnResolution::Column(path.to_string()));
        }

        let schema = self.schema;
        let segments: Vec<&str> = path.split('.').collect();
        let (hops, field) = segments.split_at(segments.len() - 1);
        let field = field[0];

        let root_pk = schema
            .primary_key(&self.entity)
            .ok_or_else(|| Error::UnknownEntity {
                entity: self.entity.clone(),
            })?;
        let emitter = JoinEmitter::new(schema, self.builder.alias(), root_pk);

        let mut current_entity = self.entity.clone();
        let mut source_alias = self.builder.alias().to_string();
        let mut alias_path: Vec<String> = Vec::new();

        for hop in hops {
            alias_path.push((*hop).to_string());
            let alias = alias_path.join("_");

            match schema.resolve_relationship(&current_entity, hop) {
                Resolved::Relation(relation) => {
                    emitter.ensure_join(self.builder, relation, &source_alias, &alias)?;
                    current_entity = relation.target.clone();
                    source_alias = alias;
                }
                Resolved::Scope(scope) => {
                    debug!(path, hop, "path hop resolved to a scope");
                    let args = ScopeArgs {
                        params: params.to_vec(),
                        alias_path: alias_path.clone(),
                    };
                    scope(self.builder, &args);
                    self.requalify();
                    return Ok(ColumnResolution::ScopeApplied);
                }
                Resolved::Unknown => {
                    return Err(Error::UnresolvablePath {
                        path: path.to_string(),
                        hop: (*hop).to_string(),
                    });
                }
            }
        }

        // A backtick-quoted final segment is taken on faith; everything
        // else must exist as a column on the resolved entity.
        let quoted = field.starts_with('`') && field.ends_with('`') && field.len() >= 2;
        let field = if quoted {
            field.trim_matches('`')
        } else {
            field
        };
        if !quoted && !schema.has_column(&current_entity, field) {
            // A bare key can also name a scope on the root entity.
            if hops.is_empty() {
                if let Resolved::Scope(scope) = schema.resolve_relationship(&current_entity, field) {
                    debug!(path, "bare key resolved to a scope");
                    let args = ScopeArgs {
                        params: params.to_vec(),
                        alias_path: Vec::new(),
                    };
                    scope(self.builder, &args);
                    self.requalify();
                    return Ok(ColumnResolution::ScopeApplied);
                }
            }
            return Err(Error::UnknownColumn {
                entity: current_entity,
                column: field.to_string(),
            });
        }

        if !hops.is_empty() {
            self.requalify();
        }

        Ok(ColumnResolution::Column(format!("{source_alias}.{field}")))
    }

    /// Once joins exist, bare root-column references added earlier become
    /// ambiguous; qualify them with the root alias.
    fn requalify(&mut self) {
        let schema = self.schema;
        let entity = self.entity.clone();
        self.builder
            .qualify_root_columns(&|column| schema.has_column(&entity, column));
    }
}
