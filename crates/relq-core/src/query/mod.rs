//! Query compilation: path resolution, join emission, filter and sort
//! compilers, and the [`Compiler`] facade tying them together.

pub mod context;
pub mod filter;
pub mod join;
pub mod sort;

pub use context::{cardinality_of, Cardinality, ColumnResolution, QueryContext};
pub use filter::FilterCompiler;
pub use join::JoinEmitter;
pub use sort::SortCompiler;

use relq_dsl::{FilterTree, SortEntry};

use crate::builder::QueryBuilder;
use crate::error::Error;
use crate::schema::Schema;

/// Compiles a filter tree and sort list onto a query in one call.
pub struct Compiler<'a> {
    schema: &'a Schema,
}

impl<'a> Compiler<'a> {
    /// Create a compiler over a schema.
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Start a query rooted at an entity.
    pub fn query(&self, entity: &str) -> Result<QueryBuilder, Error> {
        let def = self
            .schema
            .entity(entity)
            .ok_or_else(|| Error::UnknownEntity {
                entity: entity.to_string(),
            })?;
        Ok(QueryBuilder::new(def.name.clone()))
    }

    /// Apply a filter tree and sort list to an existing query.
    pub fn compile(
        &self,
        builder: &mut QueryBuilder,
        entity: &str,
        filter: Option<&FilterTree>,
        sort: &[SortEntry],
    ) -> Result<(), Error> {
        if let Some(tree) = filter {
            FilterCompiler::new(self.schema).apply(builder, entity, tree)?;
        }
        SortCompiler::new(self.schema).apply(builder, entity, sort)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EntityDef, RelationDef};
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new()
            .with_entity(
                EntityDef::new("orders", "id").with_columns(["customer_id", "status"]),
            )
            .with_entity(
                EntityDef::new("customers", "id")
                    .with_column("name")
                    .with_soft_delete("deleted_at"),
            )
            .with_relation(
                "orders",
                RelationDef::belongs_to("customer", "customers", "customer_id", "id"),
            )
    }

    #[test]
    fn test_filter_and_sort_share_joins() {
        let schema = schema();
        let compiler = Compiler::new(&schema);
        let tree = FilterTree::parse(&json!({"customer.name": {"like": "Dan"}})).unwrap();
        let sort = vec![SortEntry::asc("customer.name")];

        let mut builder = compiler.query("orders").unwrap();
        compiler
            .compile(&mut builder, "orders", Some(&tree), &sort)
            .unwrap();

        // One join serves both the predicate and the ORDER BY.
        assert_eq!(builder.joins().len(), 1);
        assert_eq!(
            builder.to_sql(),
            "SELECT orders.* FROM orders \
             LEFT JOIN customers AS customer \
             ON customer.id = orders.customer_id AND customer.deleted_at IS NULL \
             WHERE customer.name LIKE '%Dan%' \
             ORDER BY customer.name ASC"
        );
    }

    #[test]
    fn test_unknown_root_entity() {
        let schema = schema();
        let compiler = Compiler::new(&schema);
        assert!(matches!(
            compiler.query("missing").unwrap_err(),
            Error::UnknownEntity { .. }
        ));
    }
}
