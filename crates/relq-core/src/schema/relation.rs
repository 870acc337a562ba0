//! Relationship definitions between entities.

use relq_dsl::Value;

/// The closed set of relationship kinds.
///
/// The kind fully determines join shape and cardinality; it never changes
/// after schema definition, and join emission matches exhaustively over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// Child joins to parent via a foreign key on the source row.
    BelongsTo,
    /// Parent joins to a single child via a foreign key on the target row.
    HasOne,
    /// Parent joins to many children via a foreign key on the target row.
    HasMany,
    /// Many-to-many through a pivot table.
    BelongsToMany,
    /// Single polymorphic child, constrained by a stored type column.
    MorphOne,
    /// Many polymorphic children, constrained by a stored type column.
    MorphMany,
    /// Many-to-many through a polymorphic pivot table.
    MorphToMany,
    /// Polymorphic parent with a row-dependent target table. Cannot be
    /// expressed as a static join; any path crossing it fails.
    MorphTo,
}

impl RelationKind {
    /// Whether a join of this kind may multiply source rows.
    pub fn is_to_many(self) -> bool {
        matches!(
            self,
            RelationKind::HasMany
                | RelationKind::BelongsToMany
                | RelationKind::MorphMany
                | RelationKind::MorphToMany
        )
    }

    /// Whether this kind joins through a pivot table.
    pub fn uses_pivot(self) -> bool {
        matches!(self, RelationKind::BelongsToMany | RelationKind::MorphToMany)
    }
}

/// Pivot table metadata for many-to-many relationships.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotDef {
    /// Pivot table name.
    pub table: String,
    /// Pivot column referencing the source entity.
    pub source_key: String,
    /// Pivot column referencing the target entity.
    pub target_key: String,
}

/// Polymorphic type constraint metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MorphDef {
    /// Column storing the related type discriminator.
    pub type_column: String,
    /// The discriminator value selecting this relationship's source.
    pub type_value: String,
}

/// A relationship definition from one entity to another.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationDef {
    /// Relationship name, unique per source entity.
    pub name: String,
    /// Relationship kind.
    pub kind: RelationKind,
    /// Target entity name.
    pub target: String,
    /// Key column on the source side of the join.
    pub source_key: String,
    /// Key column on the target side of the join.
    pub target_key: String,
    /// Pivot metadata for many-to-many kinds.
    pub pivot: Option<PivotDef>,
    /// Morph type constraint for polymorphic kinds. For `MorphToMany` the
    /// type column lives on the pivot table, otherwise on the target.
    pub morph: Option<MorphDef>,
    /// Extra conditions inherited from the relationship's own definition,
    /// merged into the join's ON clause.
    pub conditions: Vec<(String, Value)>,
}

impl RelationDef {
    fn base(name: impl Into<String>, kind: RelationKind, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            target: target.into(),
            source_key: String::new(),
            target_key: String::new(),
            pivot: None,
            morph: None,
            conditions: Vec::new(),
        }
    }

    /// Child-to-parent relationship: `source_key` is the foreign key on the
    /// source row, `target_key` is (usually) the target's primary key.
    pub fn belongs_to(
        name: impl Into<String>,
        target: impl Into<String>,
        source_key: impl Into<String>,
        target_key: impl Into<String>,
    ) -> Self {
        let mut rel = Self::base(name, RelationKind::BelongsTo, target);
        rel.source_key = source_key.into();
        rel.target_key = target_key.into();
        rel
    }

    /// One-to-one relationship with the foreign key on the target row.
    pub fn has_one(
        name: impl Into<String>,
        target: impl Into<String>,
        source_key: impl Into<String>,
        target_key: impl Into<String>,
    ) -> Self {
        let mut rel = Self::base(name, RelationKind::HasOne, target);
        rel.source_key = source_key.into();
        rel.target_key = target_key.into();
        rel
    }

    /// One-to-many relationship with the foreign key on the target rows.
    pub fn has_many(
        name: impl Into<String>,
        target: impl Into<String>,
        source_key: impl Into<String>,
        target_key: impl Into<String>,
    ) -> Self {
        let mut rel = Self::base(name, RelationKind::HasMany, target);
        rel.source_key = source_key.into();
        rel.target_key = target_key.into();
        rel
    }

    /// Many-to-many relationship through a pivot table.
    pub fn belongs_to_many(
        name: impl Into<String>,
        target: impl Into<String>,
        source_key: impl Into<String>,
        pivot_table: impl Into<String>,
        pivot_source_key: impl Into<String>,
        pivot_target_key: impl Into<String>,
        target_key: impl Into<String>,
    ) -> Self {
        let mut rel = Self::base(name, RelationKind::BelongsToMany, target);
        rel.source_key = source_key.into();
        rel.target_key = target_key.into();
        rel.pivot = Some(PivotDef {
            table: pivot_table.into(),
            source_key: pivot_source_key.into(),
            target_key: pivot_target_key.into(),
        });
        rel
    }

    /// Single polymorphic child with a type column on the target.
    pub fn morph_one(
        name: impl Into<String>,
        target: impl Into<String>,
        source_key: impl Into<String>,
        target_key: impl Into<String>,
        type_column: impl Into<String>,
        type_value: impl Into<String>,
    ) -> Self {
        let mut rel = Self::base(name, RelationKind::MorphOne, target);
        rel.source_key = source_key.into();
        rel.target_key = target_key.into();
        rel.morph = Some(MorphDef {
            type_column: type_column.into(),
            type_value: type_value.into(),
        });
        rel
    }

    /// Many polymorphic children with a type column on the target.
    pub fn morph_many(
        name: impl Into<String>,
        target: impl Into<String>,
        source_key: impl Into<String>,
        target_key: impl Into<String>,
        type_column: impl Into<String>,
        type_value: impl Into<String>,
    ) -> Self {
        let mut rel = Self::morph_one(name, target, source_key, target_key, type_column, type_value);
        rel.kind = RelationKind::MorphMany;
        rel
    }

    /// Many-to-many through a polymorphic pivot; the type column constrains
    /// the pivot rows.
    #[allow(clippy::too_many_arguments)]
    pub fn morph_to_many(
        name: impl Into<String>,
        target: impl Into<String>,
        source_key: impl Into<String>,
        pivot_table: impl Into<String>,
        pivot_source_key: impl Into<String>,
        pivot_target_key: impl Into<String>,
        target_key: impl Into<String>,
        type_column: impl Into<String>,
        type_value: impl Into<String>,
    ) -> Self {
        let mut rel = Self::belongs_to_many(
            name,
            target,
            source_key,
            pivot_table,
            pivot_source_key,
            pivot_target_key,
            target_key,
        );
        rel.kind = RelationKind::MorphToMany;
        rel.morph = Some(MorphDef {
            type_column: type_column.into(),
            type_value: type_value.into(),
        });
        rel
    }

    /// Polymorphic parent. Declared so that paths crossing it fail loudly
    /// instead of resolving to nothing.
    pub fn morph_to(name: impl Into<String>) -> Self {
        Self::base(name, RelationKind::MorphTo, "")
    }

    /// Add an extra join condition inherited from this relationship's
    /// definition (a relationship pre-scoped to a subset of rows).
    pub fn with_condition(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }
}
