//! Join emission for relationship hops.
//!
//! Each distinct relationship path gets exactly one LEFT join, keyed by its
//! alias. To-many hops additionally collapse the result set back to one row
//! per root entity via GROUP BY on the root primary key.

use crate::builder::{Join, JoinCondition, QueryBuilder};
use crate::error::Error;
use crate::schema::{RelationDef, RelationKind, Schema};

/// Emits joins for relationship hops onto a query.
pub struct JoinEmitter<'a> {
    schema: &'a Schema,
    root_alias: String,
    root_pk: String,
}

impl<'a> JoinEmitter<'a> {
    /// Create an emitter for a query rooted at the given entity.
    pub fn new(schema: &'a Schema, root_alias: impl Into<String>, root_pk: impl Into<String>) -> Self {
        Self {
            schema,
            root_alias: root_alias.into(),
            root_pk: root_pk.into(),
        }
    }

    /// Emit the join(s) for one relationship hop, unless a join with this
    /// alias is already on the query.
    ///
    /// `source_alias` is the alias of the hop's source side; `alias` is the
    /// alias the hop's target table will carry.
    pub fn ensure_join(
        &self,
        builder: &mut QueryBuilder,
        relation: &RelationDef,
        source_alias: &str,
        alias: &str,
    ) -> Result<(), Error> {
        if builder.has_join(alias) {
            return Ok(());
        }

        // Row-dependent target, no static table to join.
        if relation.kind == RelationKind::MorphTo {
            return Err(Error::UnsupportedRelationship {
                relation: relation.name.clone(),
            });
        }

        let target = self
            .schema
            .entity(&relation.target)
            .ok_or_else(|| Error::UnknownEntity {
                entity: relation.target.clone(),
            })?;

        match relation.kind {
            RelationKind::BelongsTo | RelationKind::HasOne | RelationKind::HasMany => {
                let mut join = Join::new(&target.name, alias).with_on(JoinCondition::ColumnEq {
                    left: format!("{alias}.{}", relation.target_key),
                    right: format!("{source_alias}.{}", relation.source_key),
                });
                self.finish_target_join(&mut join, relation, target.soft_delete_column.as_deref(), alias);
                builder.add_join(join);
            }
            RelationKind::MorphOne | RelationKind::MorphMany => {
                let morph = relation
                    .morph
                    .as_ref()
                    .ok_or_else(|| Error::Schema(format!("relation {} has no morph mapping", relation.name)))?;
                let mut join = Join::new(&target.name, alias)
                    .with_on(JoinCondition::ColumnEq {
                        left: format!("{alias}.{}", relation.target_key),
                        right: format!("{source_alias}.{}", relation.source_key),
                    })
                    .with_on(JoinCondition::ValueEq {
                        column: format!("{alias}.{}", morph.type_column),
                        value: morph.type_value.clone().into(),
                    });
                self.finish_target_join(&mut join, relation, target.soft_delete_column.as_deref(), alias);
                builder.add_join(join);
            }
            RelationKind::BelongsToMany | RelationKind::MorphToMany => {
                let pivot = relation
                    .pivot
                    .as_ref()
                    .ok_or_else(|| Error::Schema(format!("relation {} has no pivot table", relation.name)))?;
                let pivot_alias = format!("{alias}_pivot");

                let mut pivot_join =
                    Join::new(&pivot.table, &pivot_alias).with_on(JoinCondition::ColumnEq {
                        left: format!("{pivot_alias}.{}", pivot.source_key),
                        right: format!("{source_alias}.{}", relation.source_key),
                    });
                if relation.kind == RelationKind::MorphToMany {
                    let morph = relation
                        .morph
                        .as_ref()
                        .ok_or_else(|| Error::Schema(format!("relation {} has no morph mapping", relation.name)))?;
                    pivot_join = pivot_join.with_on(JoinCondition::ValueEq {
                        column: format!("{pivot_alias}.{}", morph.type_column),
                        value: morph.type_value.clone().into(),
                    });
                }
                builder.add_join(pivot_join);

                let mut join = Join::new(&target.name, alias).with_on(JoinCondition::ColumnEq {
                    left: format!("{alias}.{}", relation.target_key),
                    right: format!("{pivot_alias}.{}", pivot.target_key),
                });
                self.finish_target_join(&mut join, relation, target.soft_delete_column.as_deref(), alias);
                builder.add_join(join);
            }
            RelationKind::MorphTo => {
                return Err(Error::UnsupportedRelationship {
                    relation: relation.name.clone(),
                });
            }
        }

        if relation.kind.is_to_many() {
            builder.set_group_by(vec![format!("{}.{}", self.root_alias, self.root_pk)]);
        }

        Ok(())
    }

    /// Soft-delete exclusion and per-relation extra conditions go into the
    /// target side's ON clause so the join stays optional.
    fn finish_target_join(
        &self,
        join: &mut Join,
        relation: &RelationDef,
        soft_delete: Option<&str>,
        alias: &str,
    ) {
        if let Some(column) = soft_delete {
            join.add_on_unique(JoinCondition::IsNull {
                column: format!("{alias}.{column}"),
            });
        }
        for (column, value) in &relation.conditions {
            join.add_on_unique(JoinCondition::ValueEq {
                column: format!("{alias}.{column}"),
                value: value.clone(),
            });
        }
    }
}
