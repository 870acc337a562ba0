//! The schema registry: entities, relationships, and scopes.

use std::collections::HashMap;

use relq_dsl::Value;

use super::{EntityDef, RelationDef};
use crate::builder::QueryBuilder;

/// Arguments handed to a scope when a path resolves to it.
#[derive(Debug, Clone, Default)]
pub struct ScopeArgs {
    /// Caller-supplied parameters (the filter values for the path).
    pub params: Vec<Value>,
    /// Relationship hops resolved before the scope was reached.
    pub alias_path: Vec<String>,
}

/// A named, arbitrary query mutator substituting for a column reference.
pub type ScopeFn = dyn Fn(&mut QueryBuilder, &ScopeArgs) + Send + Sync;

/// Result of resolving a name against an entity's relationships and scopes.
pub enum Resolved<'a> {
    /// The name is a relationship.
    Relation(&'a RelationDef),
    /// The name is a registered scope.
    Scope(&'a ScopeFn),
    /// The name matches nothing.
    Unknown,
}

/// The schema: a read-only registry of entities, relationships keyed by
/// `(entity, name)`, and scope callbacks.
///
/// Built once at schema-definition time; resolution performs no side effects
/// and is called once per path hop.
#[derive(Default)]
pub struct Schema {
    entities: HashMap<String, EntityDef>,
    relations: HashMap<(String, String), RelationDef>,
    scopes: HashMap<(String, String), Box<ScopeFn>>,
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity.
    pub fn with_entity(mut self, entity: EntityDef) -> Self {
        self.entities.insert(entity.name.clone(), entity);
        self
    }

    /// Register a relationship on a source entity.
    pub fn with_relation(mut self, entity: impl Into<String>, relation: RelationDef) -> Self {
        self.relations
            .insert((entity.into(), relation.name.clone()), relation);
        self
    }

    /// Register a scope on an entity.
    pub fn with_scope<F>(mut self, entity: impl Into<String>, name: impl Into<String>, scope: F) -> Self
    where
        F: Fn(&mut QueryBuilder, &ScopeArgs) + Send + Sync + 'static,
    {
        self.scopes.insert((entity.into(), name.into()), Box::new(scope));
        self
    }

    /// Get an entity definition by name.
    pub fn entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    /// Resolve a name against an entity: relationship, scope, or unknown.
    /// Relationships shadow scopes of the same name.
    pub fn resolve_relationship(&self, entity: &str, name: &str) -> Resolved<'_> {
        let key = (entity.to_string(), name.to_string());
        if let Some(relation) = self.relations.get(&key) {
            return Resolved::Relation(relation);
        }
        if let Some(scope) = self.scopes.get(&key) {
            return Resolved::Scope(scope.as_ref());
        }
        Resolved::Unknown
    }

    /// Primary key column of an entity.
    pub fn primary_key(&self, entity: &str) -> Option<&str> {
        self.entities.get(entity).map(|e| e.primary_key.as_str())
    }

    /// Soft-delete column of an entity, if declared.
    pub fn soft_delete_column(&self, entity: &str) -> Option<&str> {
        self.entities
            .get(entity)
            .and_then(|e| e.soft_delete_column.as_deref())
    }

    /// Check whether a column exists on an entity.
    pub fn has_column(&self, entity: &str, column: &str) -> bool {
        self.entities
            .get(entity)
            .is_some_and(|e| e.has_column(column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_schema() -> Schema {
        Schema::new()
            .with_entity(EntityDef::new("orders", "id").with_columns(["status", "customer_id"]))
            .with_entity(EntityDef::new("customers", "id").with_column("name"))
            .with_relation(
                "orders",
                RelationDef::belongs_to("customer", "customers", "customer_id", "id"),
            )
            .with_scope("orders", "recent", |builder, _args| {
                builder.and_where_raw("orders.created_at >= NOW() - INTERVAL 30 DAY");
            })
    }

    #[test]
    fn test_resolve_relationship() {
        let schema = test_schema();

        assert!(matches!(
            schema.resolve_relationship("orders", "customer"),
            Resolved::Relation(rel) if rel.target == "customers"
        ));
        assert!(matches!(
            schema.resolve_relationship("orders", "recent"),
            Resolved::Scope(_)
        ));
        assert!(matches!(
            schema.resolve_relationship("orders", "nothing"),
            Resolved::Unknown
        ));
        assert!(matches!(
            schema.resolve_relationship("customers", "customer"),
            Resolved::Unknown
        ));
    }

    #[test]
    fn test_metadata_lookups() {
        let schema = test_schema();

        assert_eq!(schema.primary_key("orders"), Some("id"));
        assert_eq!(schema.primary_key("missing"), None);
        assert_eq!(schema.soft_delete_column("orders"), None);
        assert!(schema.has_column("orders", "status"));
        assert!(!schema.has_column("orders", "nope"));
    }
}
