//! Filter compilation.
//!
//! Entries whose paths stay at to-one cardinality become predicates on the
//! joined root query. Entries that cross a to-many (or statically unknown)
//! hop would multiply or drop root rows under plain predicates, so they are
//! diverted into a single correlated EXISTS subquery where one matching
//! related row satisfies all of them together.

use tracing::{debug, warn};

use relq_dsl::{BoolOp, FilterEntry, FilterKey, FilterNode, FilterTree, Operand, Operator, Value};

use crate::builder::{CompareOp, Conjunction, Predicate, QueryBuilder, WhereClause};
use crate::error::Error;
use crate::query::context::{cardinality_of, Cardinality, ColumnResolution, QueryContext};
use crate::schema::Schema;

/// Compiles a parsed filter tree onto a query.
pub struct FilterCompiler<'a> {
    schema: &'a Schema,
}

impl<'a> FilterCompiler<'a> {
    /// Create a compiler over a schema.
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Compile the whole tree onto `builder`, rooted at `entity`.
    pub fn apply(
        &self,
        builder: &mut QueryBuilder,
        entity: &str,
        tree: &FilterTree,
    ) -> Result<(), Error> {
        if tree.is_empty() {
            return Ok(());
        }

        let entries = flatten_top(tree);
        let (direct, sub): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|entry| !self.is_multiple(entity, entry));
        debug!(
            direct = direct.len(),
            subquery = sub.len(),
            "partitioned filter entries by cardinality"
        );

        if !direct.is_empty() {
            let mut ctx = QueryContext::new(self.schema, entity, builder)?;
            let clauses = self.compile_entries(&mut ctx, &direct, Conjunction::And)?;
            for clause in clauses {
                builder.add_where(clause);
            }
        }

        if !sub.is_empty() {
            let subquery = self.build_subquery(builder, entity, &sub)?;
            builder.where_exists(subquery);
        }

        Ok(())
    }

    /// One EXISTS subquery carries every to-many entry, so a single related
    /// row must satisfy all of them at once.
    fn build_subquery(
        &self,
        builder: &QueryBuilder,
        entity: &str,
        entries: &[&FilterEntry],
    ) -> Result<QueryBuilder, Error> {
        let root_alias = builder.alias().to_string();
        let sub_alias = format!("{root_alias}__sub");
        let pk = self
            .schema
            .primary_key(entity)
            .ok_or_else(|| Error::UnknownEntity {
                entity: entity.to_string(),
            })?
            .to_string();

        let table = self
            .schema
            .entity(entity)
            .ok_or_else(|| Error::UnknownEntity {
                entity: entity.to_string(),
            })?
            .name
            .clone();

        let mut sub = QueryBuilder::new(table).with_alias(&sub_alias);
        sub.select_raw("1");

        {
            let mut ctx = QueryContext::new(self.schema, entity, &mut sub)?;
            let clauses = self.compile_entries(&mut ctx, entries, Conjunction::And)?;
            for clause in clauses {
                sub.add_where(clause);
            }
        }

        // The subquery tests existence, not aggregation.
        sub.clear_group_by();
        sub.and_where(Predicate::ColumnEq {
            left: format!("{sub_alias}.{pk}"),
            right: format!("{root_alias}.{pk}"),
        });

        Ok(sub)
    }

    /// A group goes to the subquery side as a whole if any path anywhere in
    /// its subtree crosses a to-many or unresolvable hop.
    fn is_multiple(&self, entity: &str, entry: &FilterEntry) -> bool {
        match &entry.key {
            FilterKey::Path(path) => !matches!(
                cardinality_of(self.schema, entity, path),
                Cardinality::Single
            ),
            FilterKey::Group(_) => match &entry.node {
                FilterNode::Group(tree) => tree.paths().iter().any(|path| {
                    !matches!(cardinality_of(self.schema, entity, path), Cardinality::Single)
                }),
                _ => false,
            },
        }
    }

    fn compile_entries(
        &self,
        ctx: &mut QueryContext<'_>,
        entries: &[&FilterEntry],
        conjunction: Conjunction,
    ) -> Result<Vec<WhereClause>, Error> {
        let mut out = Vec::new();
        for entry in entries {
            match (&entry.key, &entry.node) {
                (FilterKey::Group(op), FilterNode::Group(tree)) => {
                    let inner_conj = match op {
                        BoolOp::And => Conjunction::And,
                        BoolOp::Or => Conjunction::Or,
                    };
                    let inner_refs: Vec<&FilterEntry> = tree.entries.iter().collect();
                    let inner = self.compile_entries(ctx, &inner_refs, inner_conj)?;
                    if !inner.is_empty() {
                        out.push(WhereClause {
                            conjunction,
                            predicate: Predicate::Group(inner),
                        });
                    }
                }
                (FilterKey::Path(path), node) => {
                    let clauses = self.compile_path_entry(ctx, path, node)?;
                    match (clauses.len(), conjunction) {
                        (0, _) => {}
                        (1, _) => {
                            if let Some(mut clause) = clauses.into_iter().next() {
                                clause.conjunction = conjunction;
                                out.push(clause);
                            }
                        }
                        // Under OR, a multi-clause field stays one unit.
                        (_, Conjunction::Or) => out.push(WhereClause {
                            conjunction,
                            predicate: Predicate::Group(clauses),
                        }),
                        (_, Conjunction::And) => out.extend(clauses),
                    }
                }
                (FilterKey::Group(op), _) => {
                    return Err(Error::Dsl(relq_dsl::Error::MalformedGroup(format!(
                        "{op:?}"
                    ))));
                }
            }
        }
        Ok(out)
    }

    /// Compile one path entry into AND-joined clauses. Returns an empty
    /// vector when the entry resolves to a scope or contributes nothing.
    fn compile_path_entry(
        &self,
        ctx: &mut QueryContext<'_>,
        path: &str,
        node: &FilterNode,
    ) -> Result<Vec<WhereClause>, Error> {
        let params = scope_params(node);
        let column = match ctx.resolve_column(path, &params)? {
            ColumnResolution::Column(column) => column,
            ColumnResolution::ScopeApplied => return Ok(Vec::new()),
        };

        let mut clauses = Vec::new();
        match node {
            FilterNode::Scalar(value) => {
                clauses.push(WhereClause::and(scalar_predicate(&column, value)));
            }
            FilterNode::List(values) => {
                if let Some(predicate) = membership_predicate(&column, values, false) {
                    clauses.push(WhereClause::and(predicate));
                }
            }
            FilterNode::Ops(ops) => {
                for (operator, operand) in ops {
                    if let Some(predicate) = operator_predicate(&column, operator, operand) {
                        clauses.push(WhereClause::and(predicate));
                    }
                }
            }
            FilterNode::Group(_) => {
                return Err(Error::Dsl(relq_dsl::Error::InvalidFilter(format!(
                    "nested group under field key {path:?}"
                ))));
            }
        }
        Ok(clauses)
    }
}

/// Entries of the tree with identity `and` wrappers at the top level
/// unwrapped one step, so their children partition independently.
fn flatten_top(tree: &FilterTree) -> Vec<&FilterEntry> {
    let mut out = Vec::new();
    for entry in &tree.entries {
        match (&entry.key, &entry.node) {
            (FilterKey::Group(BoolOp::And), FilterNode::Group(sub)) => {
                out.extend(sub.entries.iter());
            }
            _ => out.push(entry),
        }
    }
    out
}

/// Values forwarded to a scope closure if the path turns out to name one.
fn scope_params(node: &FilterNode) -> Vec<Value> {
    match node {
        FilterNode::Scalar(value) => vec![value.clone()],
        FilterNode::List(values) => values.clone(),
        FilterNode::Ops(_) | FilterNode::Group(_) => Vec::new(),
    }
}

fn scalar_predicate(column: &str, value: &Value) -> Predicate {
    if value.is_null() {
        Predicate::Null {
            column: column.to_string(),
            negated: false,
        }
    } else {
        Predicate::Compare {
            column: column.to_string(),
            op: CompareOp::Eq,
            value: value.clone(),
        }
    }
}

/// Membership with the null-ish sentinel split out: concrete values go to
/// IN, null-ish ones become an OR'd IS NULL.
fn membership_predicate(column: &str, values: &[Value], negated: bool) -> Option<Predicate> {
    if values.is_empty() {
        debug!(column, "empty membership list, skipping");
        return None;
    }

    let (nullish, concrete): (Vec<&Value>, Vec<&Value>) =
        values.iter().partition(|v| v.is_nullish());

    let in_list = (!concrete.is_empty()).then(|| Predicate::InList {
        column: column.to_string(),
        values: concrete.into_iter().cloned().collect(),
        negated,
    });
    let null_test = (!nullish.is_empty()).then(|| Predicate::Null {
        column: column.to_string(),
        negated,
    });

    match (in_list, null_test) {
        // `IN (..) OR IS NULL` negates to `NOT IN (..) AND IS NOT NULL`.
        (Some(in_list), Some(null_test)) => {
            let null_clause = if negated {
                WhereClause::and(null_test)
            } else {
                WhereClause::or(null_test)
            };
            Some(Predicate::Group(vec![WhereClause::and(in_list), null_clause]))
        }
        (Some(predicate), None) | (None, Some(predicate)) => Some(predicate),
        (None, None) => None,
    }
}

fn operator_predicate(column: &str, operator: &Operator, operand: &Operand) -> Option<Predicate> {
    match operator {
        Operator::Null => {
            let truthy = match operand {
                Operand::Scalar(value) => value.is_truthy(),
                Operand::List(_) => {
                    debug!(column, "list operand for null test, skipping");
                    return None;
                }
            };
            Some(Predicate::Null {
                column: column.to_string(),
                negated: !truthy,
            })
        }
        Operator::Eq => match operand {
            Operand::Scalar(value) => Some(scalar_predicate(column, value)),
            Operand::List(values) => membership_predicate(column, values, false),
        },
        Operator::Ne => match operand {
            Operand::Scalar(value) => {
                if value.is_null() {
                    Some(Predicate::Null {
                        column: column.to_string(),
                        negated: true,
                    })
                } else {
                    Some(Predicate::Compare {
                        column: column.to_string(),
                        op: CompareOp::Ne,
                        value: value.clone(),
                    })
                }
            }
            Operand::List(values) => membership_predicate(column, values, true),
        },
        Operator::Like | Operator::NotLike => {
            let value = scalar_operand(column, operand)?;
            let op = if matches!(operator, Operator::Like) {
                CompareOp::Like
            } else {
                CompareOp::NotLike
            };
            Some(Predicate::Compare {
                column: column.to_string(),
                op,
                value: wrap_wildcards(&value),
            })
        }
        Operator::Gte | Operator::Lte | Operator::Gt | Operator::Lt => {
            let value = scalar_operand(column, operand)?;
            let op = match operator {
                Operator::Gte => CompareOp::Ge,
                Operator::Lte => CompareOp::Le,
                Operator::Gt => CompareOp::Gt,
                _ => CompareOp::Lt,
            };
            Some(Predicate::Compare {
                column: column.to_string(),
                op,
                value,
            })
        }
        Operator::Raw => {
            let value = scalar_operand(column, operand)?;
            warn!(column, "raw filter operator is deprecated");
            Some(Predicate::Raw(format!("({})", value.to_plain_string())))
        }
        Operator::Unknown(key) => {
            debug!(column, operator = key.as_str(), "unknown filter operator, skipping");
            None
        }
    }
}

fn scalar_operand(column: &str, operand: &Operand) -> Option<Value> {
    match operand {
        Operand::Scalar(value) => Some(value.clone()),
        Operand::List(_) => {
            debug!(column, "list operand for scalar operator, skipping");
            None
        }
    }
}

/// LIKE operands are substring matches unless the caller brought wildcards.
fn wrap_wildcards(value: &Value) -> Value {
    let text = value.to_plain_string();
    if text.contains('%') {
        Value::String(text)
    } else {
        Value::String(format!("%{text}%"))
    }
}
