//! Sort DSL: ordered sort entries with direction aliases.

use crate::error::Error;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Ascending order.
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

impl SortOrder {
    /// Normalize a direction string through the alias table.
    ///
    /// `asc`/`ascending`/`a-z` map to ascending, `desc`/`descending`/`z-a`
    /// to descending; anything else defaults to ascending. Case-insensitive.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "desc" | "descending" | "z-a" => SortOrder::Desc,
            _ => SortOrder::Asc,
        }
    }

    /// SQL keyword for this direction.
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// One sort entry. Entry order is the tie-break order in the emitted query.
#[derive(Debug, Clone, PartialEq)]
pub struct SortEntry {
    /// Column path to resolve (joins are added for dotted paths).
    pub column: String,
    /// Sort direction.
    pub order: SortOrder,
    /// Optional raw expression ordered by instead of the column. The column
    /// is still resolved for its join side effects, so the expression can
    /// reference the joined alias.
    pub expression: Option<String>,
}

impl SortEntry {
    /// Create an ascending sort entry.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: SortOrder::Asc,
            expression: None,
        }
    }

    /// Create a descending sort entry.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: SortOrder::Desc,
            expression: None,
        }
    }

    /// Order by a raw expression instead of the resolved column.
    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }
}

/// Parse a sort list from JSON.
///
/// Accepts either an array of `{column, order, expression?}` objects or the
/// shorthand map form `{column: order}`.
pub fn parse_sort(json: &serde_json::Value) -> Result<Vec<SortEntry>, Error> {
    match json {
        serde_json::Value::Array(items) => items.iter().map(parse_sort_object).collect(),
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(column, order)| {
                let order = order
                    .as_str()
                    .ok_or_else(|| {
                        Error::InvalidSort(format!("order for '{column}' must be a string"))
                    })?;
                Ok(SortEntry {
                    column: column.clone(),
                    order: SortOrder::parse(order),
                    expression: None,
                })
            })
            .collect(),
        _ => Err(Error::InvalidSort(
            "sort must be a JSON array or object".to_string(),
        )),
    }
}

fn parse_sort_object(json: &serde_json::Value) -> Result<SortEntry, Error> {
    let map = json
        .as_object()
        .ok_or_else(|| Error::InvalidSort("sort entry must be an object".to_string()))?;

    let column = map
        .get("column")
        .and_then(|c| c.as_str())
        .ok_or_else(|| Error::InvalidSort("sort entry requires a 'column' string".to_string()))?;

    let order = map
        .get("order")
        .and_then(|o| o.as_str())
        .map(SortOrder::parse)
        .unwrap_or_default();

    let expression = map
        .get("expression")
        .and_then(|e| e.as_str())
        .map(String::from);

    Ok(SortEntry {
        column: column.to_string(),
        order,
        expression,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_order_alias_table() {
        assert_eq!(SortOrder::parse("asc"), SortOrder::Asc);
        assert_eq!(SortOrder::parse("ascending"), SortOrder::Asc);
        assert_eq!(SortOrder::parse("a-z"), SortOrder::Asc);
        assert_eq!(SortOrder::parse("desc"), SortOrder::Desc);
        assert_eq!(SortOrder::parse("DESCENDING"), SortOrder::Desc);
        assert_eq!(SortOrder::parse("z-a"), SortOrder::Desc);
        // Unknown directions default to ascending.
        assert_eq!(SortOrder::parse("sideways"), SortOrder::Asc);
    }

    #[test]
    fn test_parse_entry_list() {
        let entries = parse_sort(&json!([
            { "column": "customer.name", "order": "desc" },
            { "column": "id" },
        ]))
        .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], SortEntry::desc("customer.name"));
        assert_eq!(entries[1], SortEntry::asc("id"));
    }

    #[test]
    fn test_parse_shorthand_map() {
        let entries = parse_sort(&json!({ "name": "desc", "id": "asc" })).unwrap();

        assert_eq!(entries[0], SortEntry::desc("name"));
        assert_eq!(entries[1], SortEntry::asc("id"));
    }

    #[test]
    fn test_parse_expression_entry() {
        let entries = parse_sort(&json!([
            { "column": "orders.total", "order": "desc", "expression": "SUM(orders.total)" },
        ]))
        .unwrap();

        assert_eq!(
            entries[0],
            SortEntry::desc("orders.total").with_expression("SUM(orders.total)")
        );
    }

    #[test]
    fn test_entry_without_column_rejected() {
        assert!(parse_sort(&json!([{ "order": "desc" }])).is_err());
        assert!(parse_sort(&json!("name")).is_err());
    }
}
