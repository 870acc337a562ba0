//! Typed filter tree parsed from the JSON filter DSL.
//!
//! The filter DSL is a recursively nested map. Keys are either a boolean
//! grouping marker (`and`/`or`) or a field path, possibly dotted for
//! relationship traversal (`customer.address.city`). Values are a scalar
//! (equality), an array of scalars (membership), or a map of operator to
//! value. Entry order is preserved: it decides predicate emission order.

use crate::error::Error;
use crate::value::Value;

/// Boolean grouping marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    /// All sub-filters must match.
    And,
    /// At least one sub-filter must match.
    Or,
}

impl BoolOp {
    /// Match a grouping key, if it is one.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "and" => Some(BoolOp::And),
            "or" => Some(BoolOp::Or),
            _ => None,
        }
    }
}

/// A filter-map key: grouping marker or field path.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterKey {
    /// An `and`/`or` grouping marker.
    Group(BoolOp),
    /// A field path, possibly dotted.
    Path(String),
}

/// A per-field filter operator.
///
/// Unknown keys are carried through as `Unknown` rather than rejected; the
/// compiler skips them silently so custom extension points can claim them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    /// `IS NULL` / `IS NOT NULL`, switched by value truthiness.
    Null,
    /// `>=` (aliases: `from`, `start`).
    Gte,
    /// `<=` (aliases: `to`, `end`).
    Lte,
    /// `>`.
    Gt,
    /// `<`.
    Lt,
    /// `LIKE`, wrapped in wildcards.
    Like,
    /// `NOT LIKE`, wrapped in wildcards.
    NotLike,
    /// `!=`; an array operand becomes `NOT IN`.
    Ne,
    /// `=`; an array operand becomes `IN`.
    Eq,
    /// Deprecated raw passthrough, wrapped verbatim in parentheses.
    Raw,
    /// Any other key; skipped by the compiler.
    Unknown(String),
}

impl Operator {
    /// Parse an operator key, mapping aliases onto their canonical operator.
    pub fn parse(key: &str) -> Self {
        match key {
            "null" => Operator::Null,
            ">=" | "from" | "start" => Operator::Gte,
            "<=" | "to" | "end" => Operator::Lte,
            ">" => Operator::Gt,
            "<" => Operator::Lt,
            "like" => Operator::Like,
            "not like" => Operator::NotLike,
            "!=" => Operator::Ne,
            "=" => Operator::Eq,
            "raw" => Operator::Raw,
            other => Operator::Unknown(other.to_string()),
        }
    }
}

/// The operand of a per-field operator: scalar or list.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A single scalar value.
    Scalar(Value),
    /// A list of scalar values.
    List(Vec<Value>),
}

/// The value side of a filter entry.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    /// Scalar value: equality.
    Scalar(Value),
    /// List of scalars: membership.
    List(Vec<Value>),
    /// Operator map, applied as AND of each operator.
    Ops(Vec<(Operator, Operand)>),
    /// Nested group under an `and`/`or` key.
    Group(FilterTree),
}

/// One ordered entry of a filter map.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterEntry {
    /// The entry's key.
    pub key: FilterKey,
    /// The entry's value.
    pub node: FilterNode,
}

/// An ordered filter tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterTree {
    /// Entries in source order.
    pub entries: Vec<FilterEntry>,
}

impl FilterTree {
    /// Parse a filter tree from a JSON object.
    ///
    /// Anything other than an object at the top level is rejected; an
    /// `and`/`or` key whose value is not itself an object fails with
    /// [`Error::MalformedGroup`].
    pub fn parse(json: &serde_json::Value) -> Result<Self, Error> {
        let map = json
            .as_object()
            .ok_or_else(|| Error::InvalidFilter("filter must be a JSON object".to_string()))?;

        let mut entries = Vec::with_capacity(map.len());
        for (key, value) in map {
            entries.push(parse_entry(key, value)?);
        }
        Ok(FilterTree { entries })
    }

    /// True if the tree holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All field paths referenced anywhere in the tree, in source order.
    pub fn paths(&self) -> Vec<&str> {
        let mut out = Vec::new();
        collect_paths(self, &mut out);
        out
    }
}

fn collect_paths<'a>(tree: &'a FilterTree, out: &mut Vec<&'a str>) {
    for entry in &tree.entries {
        match (&entry.key, &entry.node) {
            (FilterKey::Path(path), _) => out.push(path),
            (FilterKey::Group(_), FilterNode::Group(sub)) => collect_paths(sub, out),
            _ => {}
        }
    }
}

fn parse_entry(key: &str, value: &serde_json::Value) -> Result<FilterEntry, Error> {
    if let Some(op) = BoolOp::from_key(key) {
        // A grouping key must hold a filter object, never a plain list.
        let node = match value {
            serde_json::Value::Object(_) => FilterNode::Group(FilterTree::parse(value)?),
            _ => return Err(Error::MalformedGroup(key.to_string())),
        };
        return Ok(FilterEntry {
            key: FilterKey::Group(op),
            node,
        });
    }

    let node = match value {
        serde_json::Value::Array(items) => FilterNode::List(parse_scalar_list(key, items)?),
        serde_json::Value::Object(ops) => {
            let mut parsed = Vec::with_capacity(ops.len());
            for (op_key, op_value) in ops {
                parsed.push((Operator::parse(op_key), parse_operand(key, op_value)?));
            }
            FilterNode::Ops(parsed)
        }
        scalar => FilterNode::Scalar(scalar_value(key, scalar)?),
    };

    Ok(FilterEntry {
        key: FilterKey::Path(key.to_string()),
        node,
    })
}

fn parse_operand(path: &str, value: &serde_json::Value) -> Result<Operand, Error> {
    match value {
        serde_json::Value::Array(items) => Ok(Operand::List(parse_scalar_list(path, items)?)),
        serde_json::Value::Object(_) => Err(Error::InvalidFilter(format!(
            "operator value for '{path}' must be a scalar or list"
        ))),
        scalar => Ok(Operand::Scalar(scalar_value(path, scalar)?)),
    }
}

fn parse_scalar_list(path: &str, items: &[serde_json::Value]) -> Result<Vec<Value>, Error> {
    items.iter().map(|item| scalar_value(path, item)).collect()
}

fn scalar_value(path: &str, json: &serde_json::Value) -> Result<Value, Error> {
    Value::from_json(json)
        .ok_or_else(|| Error::InvalidFilter(format!("value for '{path}' must be a scalar")))
}
