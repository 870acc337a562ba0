//! Sort compilation.
//!
//! Sort columns go through the same path resolution as filters, so a sort
//! on `customer.name` reuses (or emits) the same join a filter on that path
//! would. Entries carrying an explicit expression order on it verbatim.

use tracing::debug;

use relq_dsl::SortEntry;

use crate::builder::{OrderTarget, QueryBuilder};
use crate::error::Error;
use crate::query::context::{ColumnResolution, QueryContext};
use crate::schema::Schema;

/// Compiles sort entries onto a query.
pub struct SortCompiler<'a> {
    schema: &'a Schema,
}

impl<'a> SortCompiler<'a> {
    /// Create a compiler over a schema.
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Resolve each entry and append its ORDER BY clause in source order.
    pub fn apply(
        &self,
        builder: &mut QueryBuilder,
        entity: &str,
        entries: &[SortEntry],
    ) -> Result<(), Error> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut ctx = QueryContext::new(self.schema, entity, builder)?;
        let mut resolved = Vec::with_capacity(entries.len());
        for entry in entries {
            // The column is resolved even when an expression overrides the
            // ORDER BY target: the expression may reference the joins the
            // column path emits.
            let resolution = ctx.resolve_column(&entry.column, &[])?;
            if let Some(expression) = &entry.expression {
                resolved.push((OrderTarget::Raw(expression.clone()), entry.order));
                continue;
            }
            match resolution {
                ColumnResolution::Column(column) => {
                    resolved.push((OrderTarget::Column(column), entry.order));
                }
                ColumnResolution::ScopeApplied => {
                    // A scope mutates the query but gives nothing to order on.
                    debug!(column = entry.column.as_str(), "sort key resolved to a scope");
                }
            }
        }

        for (target, order) in resolved {
            builder.add_order_by(target, order);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relq_dsl::{SortEntry, SortOrder};

    use crate::schema::{EntityDef, RelationDef, Schema};

    fn schema() -> Schema {
        Schema::new()
            .with_entity(
                EntityDef::new("orders", "id").with_columns(["customer_id", "created_at"]),
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
    fn test_local_sort() {
        let schema = schema();
        let mut builder = QueryBuilder::new("orders");
        SortCompiler::new(&schema)
            .apply(&mut builder, "orders", &[SortEntry::desc("created_at")])
            .unwrap();

        assert_eq!(
            builder.to_sql(),
            "SELECT orders.* FROM orders ORDER BY orders.created_at DESC"
        );
    }

    #[test]
    fn test_relationship_sort_emits_join() {
        let schema = schema();
        let mut builder = QueryBuilder::new("orders");
        SortCompiler::new(&schema)
            .apply(&mut builder, "orders", &[SortEntry::asc("customer.name")])
            .unwrap();

        assert_eq!(
            builder.to_sql(),
            "SELECT orders.* FROM orders \
             LEFT JOIN customers AS customer \
             ON customer.id = orders.customer_id AND customer.deleted_at IS NULL \
             ORDER BY customer.name ASC"
        );
    }

    #[test]
    fn test_expression_sort_orders_on_expression() {
        let schema = schema();
        let mut builder = QueryBuilder::new("orders");
        let entry = SortEntry::desc("created_at").with_expression("DATE(orders.created_at)");
        SortCompiler::new(&schema)
            .apply(&mut builder, "orders", &[entry])
            .unwrap();

        assert_eq!(
            builder.to_sql(),
            "SELECT orders.* FROM orders ORDER BY DATE(orders.created_at) DESC"
        );
    }

    #[test]
    fn test_expression_sort_still_emits_column_joins() {
        let schema = schema();
        let mut builder = QueryBuilder::new("orders");
        let entry = SortEntry::desc("customer.name").with_expression("UPPER(customer.name)");
        SortCompiler::new(&schema)
            .apply(&mut builder, "orders", &[entry])
            .unwrap();

        // The expression references the alias the column path joins in.
        assert_eq!(
            builder.to_sql(),
            "SELECT orders.* FROM orders \
             LEFT JOIN customers AS customer \
             ON customer.id = orders.customer_id AND customer.deleted_at IS NULL \
             ORDER BY UPPER(customer.name) DESC"
        );
    }

    #[test]
    fn test_unknown_sort_column_errors() {
        let schema = schema();
        let mut builder = QueryBuilder::new("orders");
        let err = SortCompiler::new(&schema)
            .apply(&mut builder, "orders", &[SortEntry::asc("nope")])
            .unwrap_err();
        assert!(matches!(err, Error::UnknownColumn { .. }));
    }
}
