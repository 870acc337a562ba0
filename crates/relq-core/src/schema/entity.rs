//! Entity definitions.

/// An entity definition: a relational table with a primary key, columns, and
/// an optional soft-delete column.
///
/// The entity name doubles as the table name; join aliases are derived from
/// relationship paths, never from the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDef {
    /// Entity (and table) name, unique within the schema.
    pub name: String,
    /// Primary key column.
    pub primary_key: String,
    /// Plain column names.
    pub columns: Vec<String>,
    /// Soft-delete timestamp column, if the entity uses soft deletes.
    pub soft_delete_column: Option<String>,
}

impl EntityDef {
    /// Create a new entity definition.
    pub fn new(name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: primary_key.into(),
            columns: Vec::new(),
            soft_delete_column: None,
        }
    }

    /// Add a column.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    /// Add multiple columns.
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Enable soft deletes on the given column.
    pub fn with_soft_delete(mut self, column: impl Into<String>) -> Self {
        self.soft_delete_column = Some(column.into());
        self
    }

    /// Check whether a column exists on this entity. The primary key and the
    /// soft-delete column count as columns.
    pub fn has_column(&self, name: &str) -> bool {
        name == self.primary_key
            || self.columns.iter().any(|c| c == name)
            || self.soft_delete_column.as_deref() == Some(name)
    }
}
