//! The mutable query-builder object extended during compilation.
//!
//! A `QueryBuilder` is exclusively owned by one compilation and threaded
//! explicitly through every recursive call; it is never shared between
//! threads. The compilers extend it in place with joins, predicates,
//! grouping, and ordering, and `to_sql` renders the final statement.

use relq_dsl::{SortOrder, Value};

/// One condition inside a join's ON clause.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinCondition {
    /// Column-to-column equality.
    ColumnEq {
        /// Left-hand qualified column.
        left: String,
        /// Right-hand qualified column.
        right: String,
    },
    /// Column-to-literal equality (morph type constraints, relation
    /// conditions).
    ValueEq {
        /// Qualified column.
        column: String,
        /// Literal value.
        value: Value,
    },
    /// Column must be NULL (soft-delete exclusion).
    IsNull {
        /// Qualified column.
        column: String,
    },
}

impl JoinCondition {
    fn to_sql(&self) -> String {
        match self {
            JoinCondition::ColumnEq { left, right } => format!("{left} = {right}"),
            JoinCondition::ValueEq { column, value } => {
                format!("{column} = {}", value.to_sql_literal())
            }
            JoinCondition::IsNull { column } => format!("{column} IS NULL"),
        }
    }
}

/// A single LEFT join, keyed by its alias.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// Joined table.
    pub table: String,
    /// Join alias, one per distinct relationship path.
    pub alias: String,
    /// ON conditions, ANDed together.
    pub on: Vec<JoinCondition>,
}

impl Join {
    /// Create a join with no conditions yet.
    pub fn new(table: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: alias.into(),
            on: Vec::new(),
        }
    }

    /// Add an ON condition.
    pub fn with_on(mut self, condition: JoinCondition) -> Self {
        self.on.push(condition);
        self
    }

    /// Add an ON condition unless an identical one is already present.
    pub fn add_on_unique(&mut self, condition: JoinCondition) {
        if !self.on.contains(&condition) {
            self.on.push(condition);
        }
    }

    fn to_sql(&self) -> String {
        let on = self
            .on
            .iter()
            .map(JoinCondition::to_sql)
            .collect::<Vec<_>>()
            .join(" AND ");
        format!("LEFT JOIN {} AS {} ON {on}", self.table, self.alias)
    }
}

/// How a WHERE clause combines with the clause before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conjunction {
    /// AND.
    And,
    /// OR.
    Or,
}

/// Comparison operators usable in predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`.
    Eq,
    /// `!=`.
    Ne,
    /// `<`.
    Lt,
    /// `<=`.
    Le,
    /// `>`.
    Gt,
    /// `>=`.
    Ge,
    /// `LIKE`.
    Like,
    /// `NOT LIKE`.
    NotLike,
}

impl CompareOp {
    /// SQL spelling of this operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Like => "LIKE",
            CompareOp::NotLike => "NOT LIKE",
        }
    }
}

/// A WHERE predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Column compared to a literal.
    Compare {
        /// Qualified column.
        column: String,
        /// Comparison operator.
        op: CompareOp,
        /// Literal value.
        value: Value,
    },
    /// Column-to-column equality (subquery correlation).
    ColumnEq {
        /// Left-hand qualified column.
        left: String,
        /// Right-hand qualified column.
        right: String,
    },
    /// Membership test.
    InList {
        /// Qualified column.
        column: String,
        /// Member values.
        values: Vec<Value>,
        /// `NOT IN` when set.
        negated: bool,
    },
    /// NULL test.
    Null {
        /// Qualified column.
        column: String,
        /// `IS NOT NULL` when set.
        negated: bool,
    },
    /// Raw SQL fragment, rendered verbatim.
    Raw(String),
    /// Parenthesised sub-group of clauses.
    Group(Vec<WhereClause>),
    /// Correlated existence subquery.
    Exists(Box<QueryBuilder>),
}

/// A predicate with its conjunction. The first clause's conjunction is not
/// rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    /// AND/OR with the previous clause.
    pub conjunction: Conjunction,
    /// The predicate.
    pub predicate: Predicate,
}

impl WhereClause {
    /// An AND clause.
    pub fn and(predicate: Predicate) -> Self {
        Self {
            conjunction: Conjunction::And,
            predicate,
        }
    }

    /// An OR clause.
    pub fn or(predicate: Predicate) -> Self {
        Self {
            conjunction: Conjunction::Or,
            predicate,
        }
    }
}

/// What an ORDER BY entry orders on.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderTarget {
    /// A resolved, qualified column.
    Column(String),
    /// A raw expression.
    Raw(String),
}

/// One ORDER BY entry.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderClause {
    /// The column or expression ordered on.
    pub target: OrderTarget,
    /// Direction.
    pub order: SortOrder,
}

/// A mutable relational query under construction.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBuilder {
    table: String,
    alias: String,
    select: Option<String>,
    joins: Vec<Join>,
    wheres: Vec<WhereClause>,
    group_by: Vec<String>,
    order_by: Vec<OrderClause>,
}

impl QueryBuilder {
    /// Create a query rooted at a table; the root alias is the table name.
    pub fn new(table: impl Into<String>) -> Self {
        let table = table.into();
        let alias = table.clone();
        Self {
            table,
            alias,
            select: None,
            joins: Vec::new(),
            wheres: Vec::new(),
            group_by: Vec::new(),
            order_by: Vec::new(),
        }
    }

    /// Re-alias the root table (used for existence subqueries).
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    /// Override the select list with a raw expression.
    pub fn select_raw(&mut self, select: impl Into<String>) {
        self.select = Some(select.into());
    }

    /// Root table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Root alias.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Whether a join with this alias is already present.
    pub fn has_join(&self, alias: &str) -> bool {
        self.joins.iter().any(|j| j.alias == alias)
    }

    /// Aliases of all joins currently on the query.
    pub fn join_aliases(&self) -> Vec<&str> {
        self.joins.iter().map(|j| j.alias.as_str()).collect()
    }

    /// Add a join; a join whose alias is already present is ignored.
    pub fn add_join(&mut self, join: Join) {
        if !self.has_join(&join.alias) {
            self.joins.push(join);
        }
    }

    /// Joins currently on the query.
    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    /// Append a WHERE clause.
    pub fn add_where(&mut self, clause: WhereClause) {
        self.wheres.push(clause);
    }

    /// Append an AND predicate.
    pub fn and_where(&mut self, predicate: Predicate) {
        self.wheres.push(WhereClause::and(predicate));
    }

    /// Append an OR predicate.
    pub fn or_where(&mut self, predicate: Predicate) {
        self.wheres.push(WhereClause::or(predicate));
    }

    /// Append a raw AND fragment.
    pub fn and_where_raw(&mut self, fragment: impl Into<String>) {
        self.and_where(Predicate::Raw(fragment.into()));
    }

    /// Attach a correlated existence subquery.
    pub fn where_exists(&mut self, subquery: QueryBuilder) {
        self.and_where(Predicate::Exists(Box::new(subquery)));
    }

    /// WHERE clauses currently on the query.
    pub fn wheres(&self) -> &[WhereClause] {
        &self.wheres
    }

    /// Replace the GROUP BY column set.
    pub fn set_group_by(&mut self, columns: Vec<String>) {
        self.group_by = columns;
    }

    /// GROUP BY columns currently on the query.
    pub fn group_by(&self) -> &[String] {
        &self.group_by
    }

    /// Drop the GROUP BY (existence subqueries need no aggregation).
    pub fn clear_group_by(&mut self) {
        self.group_by.clear();
    }

    /// Append an ORDER BY entry.
    pub fn add_order_by(&mut self, target: OrderTarget, order: SortOrder) {
        self.order_by.push(OrderClause { target, order });
    }

    /// ORDER BY entries currently on the query.
    pub fn order_by(&self) -> &[OrderClause] {
        &self.order_by
    }

    /// Rewrite previously added predicates that reference an unqualified
    /// root-entity column to be alias-qualified. Run once any join lands on
    /// the query, since new joins can make bare column names ambiguous.
    ///
    /// Nested groups are rewritten; subqueries are not (they carry their own
    /// root alias).
    pub fn qualify_root_columns(&mut self, is_root_column: &dyn Fn(&str) -> bool) {
        let alias = self.alias.clone();
        qualify_clauses(&mut self.wheres, &alias, is_root_column);
    }

    /// Render the query as SQL text.
    pub fn to_sql(&self) -> String {
        let select = self
            .select
            .clone()
            .unwrap_or_else(|| format!("{}.*", self.alias));

        let mut sql = format!("SELECT {select} FROM {}", self.table);
        if self.alias != self.table {
            sql.push_str(&format!(" AS {}", self.alias));
        }

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.to_sql());
        }

        if !self.wheres.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&render_clauses(&self.wheres));
        }

        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        if !self.order_by.is_empty() {
            let orders = self
                .order_by
                .iter()
                .map(|o| {
                    let target = match &o.target {
                        OrderTarget::Column(c) => c.as_str(),
                        OrderTarget::Raw(r) => r.as_str(),
                    };
                    format!("{target} {}", o.order.as_sql())
                })
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(" ORDER BY ");
            sql.push_str(&orders);
        }

        sql
    }
}

fn render_clauses(clauses: &[WhereClause]) -> String {
    let mut out = String::new();
    for (i, clause) in clauses.iter().enumerate() {
        if i > 0 {
            out.push_str(match clause.conjunction {
                Conjunction::And => " AND ",
                Conjunction::Or => " OR ",
            });
        }
        out.push_str(&render_predicate(&clause.predicate));
    }
    out
}

fn render_predicate(predicate: &Predicate) -> String {
    match predicate {
        Predicate::Compare { column, op, value } => {
            format!("{column} {} {}", op.as_sql(), value.to_sql_literal())
        }
        Predicate::ColumnEq { left, right } => format!("{left} = {right}"),
        Predicate::InList {
            column,
            values,
            negated,
        } => {
            let list = values
                .iter()
                .map(Value::to_sql_literal)
                .collect::<Vec<_>>()
                .join(", ");
            let op = if *negated { "NOT IN" } else { "IN" };
            format!("{column} {op} ({list})")
        }
        Predicate::Null { column, negated } => {
            if *negated {
                format!("{column} IS NOT NULL")
            } else {
                format!("{column} IS NULL")
            }
        }
        Predicate::Raw(fragment) => fragment.clone(),
        Predicate::Group(clauses) => format!("({})", render_clauses(clauses)),
        Predicate::Exists(subquery) => format!("EXISTS ({})", subquery.to_sql()),
    }
}

fn qualify_clauses(clauses: &mut [WhereClause], alias: &str, is_root_column: &dyn Fn(&str) -> bool) {
    for clause in clauses {
        match &mut clause.predicate {
            Predicate::Compare { column, .. }
            | Predicate::InList { column, .. }
            | Predicate::Null { column, .. } => qualify_column(column, alias, is_root_column),
            Predicate::ColumnEq { left, right } => {
                qualify_column(left, alias, is_root_column);
                qualify_column(right, alias, is_root_column);
            }
            Predicate::Group(inner) => qualify_clauses(inner, alias, is_root_column),
            Predicate::Raw(_) | Predicate::Exists(_) => {}
        }
    }
}

fn qualify_column(column: &mut String, alias: &str, is_root_column: &dyn Fn(&str) -> bool) {
    if !column.contains('.') && is_root_column(column) {
        *column = format!("{alias}.{column}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_render() {
        let mut builder = QueryBuilder::new("orders");
        builder.and_where(Predicate::Compare {
            column: "orders.status".to_string(),
            op: CompareOp::Eq,
            value: Value::from("active"),
        });

        assert_eq!(
            builder.to_sql(),
            "SELECT orders.* FROM orders WHERE orders.status = 'active'"
        );
    }

    #[test]
    fn test_join_is_idempotent_per_alias() {
        let mut builder = QueryBuilder::new("orders");
        let join = Join::new("customers", "customer").with_on(JoinCondition::ColumnEq {
            left: "customer.id".to_string(),
            right: "orders.customer_id".to_string(),
        });
        builder.add_join(join.clone());
        builder.add_join(join);

        assert_eq!(builder.joins().len(), 1);
        assert!(builder.has_join("customer"));
        assert_eq!(builder.join_aliases(), vec!["customer"]);
    }

    #[test]
    fn test_join_render() {
        let mut builder = QueryBuilder::new("orders");
        builder.add_join(
            Join::new("customers", "customer")
                .with_on(JoinCondition::ColumnEq {
                    left: "customer.id".to_string(),
                    right: "orders.customer_id".to_string(),
                })
                .with_on(JoinCondition::IsNull {
                    column: "customer.deleted_at".to_string(),
                }),
        );

        assert_eq!(
            builder.to_sql(),
            "SELECT orders.* FROM orders \
             LEFT JOIN customers AS customer \
             ON customer.id = orders.customer_id AND customer.deleted_at IS NULL"
        );
    }

    #[test]
    fn test_group_and_or_render() {
        let mut builder = QueryBuilder::new("users");
        builder.and_where(Predicate::Group(vec![
            WhereClause::and(Predicate::Compare {
                column: "users.name".to_string(),
                op: CompareOp::Like,
                value: Value::from("%Dan%"),
            }),
            WhereClause::or(Predicate::Compare {
                column: "users.email".to_string(),
                op: CompareOp::Like,
                value: Value::from("%Dan%"),
            }),
        ]));

        assert_eq!(
            builder.to_sql(),
            "SELECT users.* FROM users \
             WHERE (users.name LIKE '%Dan%' OR users.email LIKE '%Dan%')"
        );
    }

    #[test]
    fn test_exists_render_with_aliased_subquery() {
        let mut sub = QueryBuilder::new("orders").with_alias("orders__sub");
        sub.select_raw("1");
        sub.and_where(Predicate::ColumnEq {
            left: "orders__sub.id".to_string(),
            right: "orders.id".to_string(),
        });

        let mut builder = QueryBuilder::new("orders");
        builder.where_exists(sub);

        assert_eq!(
            builder.to_sql(),
            "SELECT orders.* FROM orders \
             WHERE EXISTS (SELECT 1 FROM orders AS orders__sub \
             WHERE orders__sub.id = orders.id)"
        );
    }

    #[test]
    fn test_qualify_root_columns_rewrites_bare_names() {
        let mut builder = QueryBuilder::new("orders");
        builder.and_where(Predicate::Compare {
            column: "status".to_string(),
            op: CompareOp::Eq,
            value: Value::from("A"),
        });
        builder.and_where(Predicate::Compare {
            column: "customer.name".to_string(),
            op: CompareOp::Eq,
            value: Value::from("Dan"),
        });

        builder.qualify_root_columns(&|col| col == "status");

        assert_eq!(
            builder.to_sql(),
            "SELECT orders.* FROM orders \
             WHERE orders.status = 'A' AND customer.name = 'Dan'"
        );
    }

    #[test]
    fn test_qualify_skips_subqueries() {
        let mut sub = QueryBuilder::new("orders").with_alias("orders__sub");
        sub.select_raw("1");
        sub.and_where(Predicate::Compare {
            column: "status".to_string(),
            op: CompareOp::Eq,
            value: Value::from("A"),
        });

        let mut builder = QueryBuilder::new("orders");
        builder.where_exists(sub);
        builder.qualify_root_columns(&|col| col == "status");

        // The subquery's bare column is left for its own compilation pass.
        assert_eq!(
            builder.to_sql(),
            "SELECT orders.* FROM orders \
             WHERE EXISTS (SELECT 1 FROM orders AS orders__sub WHERE status = 'A')"
        );
    }

    #[test]
    fn test_group_by_and_order_by_render() {
        let mut builder = QueryBuilder::new("orders");
        builder.set_group_by(vec!["orders.id".to_string()]);
        builder.add_order_by(
            OrderTarget::Column("orders.created_at".to_string()),
            SortOrder::Desc,
        );
        builder.add_order_by(OrderTarget::Raw("SUM(orders.total)".to_string()), SortOrder::Asc);

        assert_eq!(
            builder.to_sql(),
            "SELECT orders.* FROM orders \
             GROUP BY orders.id \
             ORDER BY orders.created_at DESC, SUM(orders.total) ASC"
        );
    }

    #[test]
    fn test_clear_group_by() {
        let mut builder = QueryBuilder::new("orders");
        builder.set_group_by(vec!["orders.id".to_string()]);
        builder.clear_group_by();

        assert!(builder.group_by().is_empty());
    }

    #[test]
    fn test_on_condition_dedup() {
        let mut join = Join::new("posts", "posts");
        let cond = JoinCondition::ValueEq {
            column: "posts.published".to_string(),
            value: Value::Bool(true),
        };
        join.add_on_unique(cond.clone());
        join.add_on_unique(cond);

        assert_eq!(join.on.len(), 1);
    }
}
