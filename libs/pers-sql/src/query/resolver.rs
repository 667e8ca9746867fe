// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Field path resolution.
//!
//! A field such as `customer.address.city` is resolved by walking from the query's base entity
//! through its bridge properties. Each hop allocates (or reuses) a table alias and a join, and
//! the final segment must name a column. A toMany hop hands the rest of the path to a child
//! query instead.

use std::collections::HashSet;

use crate::{
    config::QueryConfig,
    query_error::ResolutionError,
    schema::{Entity, EntitySchema, Property},
    sql::DatabaseConnector,
};

use super::{
    MountPoint,
    context::{BuildContext, Binding, JoinEntry, KeyOrigin, MapInfo},
};

/// The clause a field appears in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Context {
    Select,
    Index,
    AliasSelect,
    Where,
    Having,
    OrderBy,
    GroupBy,
}

impl Context {
    /// Where `*`, `!`, and toMany hops are allowed
    fn is_select(self) -> bool {
        self == Context::Select
    }

    /// Whether relations reached from this clause show up in the mapped graph
    fn materializes(self) -> bool {
        matches!(self, Context::Select | Context::Index)
    }
}

/// A resolved column: the join path of its table, the physical column, and the name it is
/// reported under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ColumnRef {
    pub path: String,
    pub column: String,
    pub label: String,
}

impl ColumnRef {
    fn new(path: &str, column: &str) -> Self {
        Self {
            path: path.to_string(),
            column: column.to_string(),
            label: column.to_string(),
        }
    }

    fn same_column(&self, other: &ColumnRef) -> bool {
        self.path == other.path && self.column == other.column
    }
}

/// A select field that continues through a toMany property. The remaining path becomes a
/// select of the child query mounted at `mount`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ToManyHop {
    pub mount: MountPoint,
    pub target: String,
    pub fk: String,
    pub field: String,
    pub negated: bool,
}

pub(crate) struct FieldResolver<'a> {
    schema: &'a dyn EntitySchema,
    config: &'a QueryConfig,
    pub(super) connector: &'a dyn DatabaseConnector,
    base: &'a Entity,
    pub context: BuildContext,
    pub errors: Vec<ResolutionError>,
    pub hops: Vec<ToManyHop>,
}

impl<'a> FieldResolver<'a> {
    pub fn new(
        schema: &'a dyn EntitySchema,
        config: &'a QueryConfig,
        connector: &'a dyn DatabaseConnector,
        base: &'a Entity,
    ) -> Self {
        Self {
            schema,
            config,
            connector,
            base,
            context: BuildContext::new(base),
            errors: vec![],
            hops: vec![],
        }
    }

    /// Resolve a list of fields: resolve each one, drop the negated ones, and de-duplicate.
    pub fn resolve_fields(&mut self, fields: &[String], context: Context) -> Vec<ColumnRef> {
        let mut positive = vec![];
        let mut negative = vec![];

        for field in fields {
            let field = field.trim();
            if field.is_empty() {
                self.errors.push(ResolutionError::EmptyField {
                    field_list: fields.join(", "),
                });
                continue;
            }

            match field.strip_prefix('!') {
                Some(_) if !context.is_select() => {
                    self.errors.push(ResolutionError::NegationOutsideSelect);
                }
                Some(excluded) => {
                    negative.extend(self.resolve_field(excluded.trim(), context, true))
                }
                None => positive.extend(self.resolve_field(field, context, false)),
            }
        }

        positive.retain(|column| !negative.iter().any(|n| n.same_column(column)));
        dedup(positive)
    }

    /// Resolve the select list. Besides the caller's fields, this selects `extra` (the index
    /// field, which negation doesn't remove), the primary keys of the relations in
    /// `relation_paths`, and the primary key of every joined relation that ends up in the
    /// graph.
    pub fn resolve_select(
        &mut self,
        fields: &[String],
        extra: Vec<ColumnRef>,
        relation_paths: &[String],
    ) -> Vec<ColumnRef> {
        let mut columns = self.resolve_fields(fields, Context::Select);
        columns.extend(extra);

        for path in relation_paths {
            self.register_relation_path(path);
        }

        for path in self.context.required_pk_paths() {
            let Some(primary_key) = self.context.alias(&path).map(|a| a.primary_key.clone())
            else {
                continue;
            };
            let key = ColumnRef::new(&path, &primary_key);

            if columns.iter().any(|column| column.same_column(&key)) {
                self.context.set_key_origin(&path, KeyOrigin::User);
            } else {
                self.context.set_key_origin(&path, KeyOrigin::Auto);
                columns.push(key);
            }
        }

        dedup(columns)
    }

    /// Make sure the bridge chain `path` (relative to the base entity) is joined and present in
    /// the graph, and that its primary key is selected.
    pub fn register_relation_path(&mut self, path: &str) {
        let mut entity = self.base;
        let mut current = String::new();

        for part in path.split('.').filter(|part| !part.is_empty()) {
            match entity.property(part) {
                Some(Property::Bridge {
                    name,
                    bound_fk,
                    target,
                }) => match self.enter_bridge(&current, name, bound_fk, target, Context::Select) {
                    Some((next_path, next_entity)) => {
                        current = next_path;
                        entity = next_entity;
                    }
                    None => return,
                },
                _ => {
                    self.errors.push(ResolutionError::UnresolvedField {
                        field: part.to_string(),
                        entity: entity.name.clone(),
                    });
                    return;
                }
            }
        }

        self.context.require_pk(&current);
    }

    fn resolve_field(&mut self, field: &str, context: Context, negated: bool) -> Vec<ColumnRef> {
        let parts: Vec<&str> = field.split('.').map(str::trim).collect();
        let mut entity = self.base;
        let mut path = String::new();

        for (index, part) in parts.iter().enumerate() {
            let is_last = index == parts.len() - 1;

            if *part == "*" {
                if !context.is_select() {
                    self.errors.push(ResolutionError::WildcardOutsideSelect);
                    return vec![];
                }
                if !is_last {
                    self.unresolved(part, entity);
                    return vec![];
                }
                return entity
                    .columns()
                    .map(|column| ColumnRef::new(&path, column))
                    .collect();
            }

            match entity.property(part) {
                Some(Property::Column { name }) => {
                    if !is_last {
                        self.unresolved(part, entity);
                        return vec![];
                    }
                    return vec![ColumnRef::new(&path, name)];
                }
                Some(Property::Bridge {
                    name,
                    bound_fk,
                    target,
                }) => {
                    if is_last {
                        self.errors.push(ResolutionError::TableValuedTerminal {
                            expression: field.to_string(),
                        });
                        return vec![];
                    }

                    if negated {
                        // Exclusions only name columns; they must not add joins
                        let schema = self.schema;
                        match schema.entity(target) {
                            Some(target_entity) => {
                                path = join_path(&path, name);
                                entity = target_entity;
                            }
                            None => {
                                self.errors
                                    .push(ResolutionError::UnknownEntity(target.clone()));
                                return vec![];
                            }
                        }
                    } else {
                        match self.enter_bridge(&path, name, bound_fk, target, context) {
                            Some((next_path, next_entity)) => {
                                path = next_path;
                                entity = next_entity;
                            }
                            None => return vec![],
                        }
                    }
                }
                Some(Property::ToMany {
                    name,
                    target,
                    fk_on_target,
                }) => {
                    if !context.is_select() {
                        self.errors.push(ResolutionError::ToManyOutsideSelect {
                            expression: field.to_string(),
                        });
                        return vec![];
                    }
                    if is_last {
                        self.errors.push(ResolutionError::TableValuedTerminal {
                            expression: field.to_string(),
                        });
                        return vec![];
                    }

                    if !negated {
                        self.context.require_pk(&path);
                    }
                    self.hops.push(ToManyHop {
                        mount: MountPoint {
                            owner_path: path,
                            property: name.clone(),
                        },
                        target: target.clone(),
                        fk: fk_on_target.clone(),
                        field: parts[index + 1..].join("."),
                        negated,
                    });
                    return vec![];
                }
                None => {
                    if is_last && let Some(column) = self.with_affix(entity, part) {
                        let label = if context.materializes() {
                            part.to_string()
                        } else {
                            column.clone()
                        };
                        return vec![ColumnRef {
                            path,
                            column,
                            label,
                        }];
                    }
                    self.unresolved(part, entity);
                    return vec![];
                }
            }
        }

        vec![]
    }

    /// Follow the bridge `name` out of the relation at `path`: allocate its alias, register
    /// the join, and for select-like clauses record where its object is attached.
    fn enter_bridge(
        &mut self,
        path: &str,
        name: &str,
        bound_fk: &str,
        target: &str,
        context: Context,
    ) -> Option<(String, &'a Entity)> {
        let schema = self.schema;
        let Some(target_entity) = schema.entity(target) else {
            self.errors
                .push(ResolutionError::UnknownEntity(target.to_string()));
            return None;
        };

        let parent_alias = self.context.alias_key(path).to_string();
        let next_path = join_path(path, name);
        let alias = self
            .context
            .alias_or_create(&next_path, target_entity)
            .key
            .clone();

        self.context.register_join(
            &next_path,
            JoinEntry {
                alias: alias.clone(),
                table: target_entity.table.clone(),
                primary_key: target_entity.primary_key.clone(),
                parent_alias: parent_alias.clone(),
                bound_fk: bound_fk.to_string(),
            },
        );

        if context.materializes() {
            self.context.materialize(
                &alias,
                MapInfo {
                    entity: target_entity.name.clone(),
                    binding: Some(Binding {
                        parent_alias,
                        property: name.to_string(),
                    }),
                },
            );
            self.context.require_pk(&next_path);
        }

        Some((next_path, target_entity))
    }

    /// The second lookup attempt: the name with the configured affix applied
    fn with_affix(&self, entity: &Entity, name: &str) -> Option<String> {
        let affix = self.config.field_affix.as_ref()?;
        let physical = affix.apply(name);
        entity.has_column(&physical).then_some(physical)
    }

    fn unresolved(&mut self, field: &str, entity: &Entity) {
        self.errors.push(ResolutionError::UnresolvedField {
            field: field.to_string(),
            entity: entity.name.clone(),
        });
    }
}

pub(crate) fn join_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

fn dedup(columns: Vec<ColumnRef>) -> Vec<ColumnRef> {
    let mut seen = HashSet::new();
    columns
        .into_iter()
        .filter(|column| seen.insert(column.clone()))
        .collect()
}
