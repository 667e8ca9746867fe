// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{fmt, sync::Arc};

use tracing::{debug, instrument};

use crate::{
    mapper::{AliasPlan, Attachment, IndexTarget, MappingPlan, MountPlan},
    query_error::{BuildError, ResolutionError},
    sql::{
        ExpressionBuilder,
        column::{Fragment, QualifiedColumn, SelectColumn},
        join::LeftJoin,
        placeholder::placeholder_positions,
        predicate::Predicate,
        select::{Count, Select},
        table::TableRef,
    },
    value::Val,
};

use super::{
    ChildLink, IndexSpec, Param, Query, ROOT_ALIAS,
    context::BuildContext,
    resolver::{ColumnRef, Context, FieldResolver},
};

/// A built query: the SQL text with `?` placeholders and its parameters, and what the result
/// mapper needs to rebuild objects from its rows.
#[derive(Clone)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Val>,
    /// The count query, if requested
    pub count: Option<(String, Vec<Val>)>,
    pub(crate) plan: MappingPlan,
}

impl fmt::Debug for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledQuery")
            .field("sql", &self.sql)
            .field("params", &self.params)
            .field("count", &self.count)
            .finish_non_exhaustive()
    }
}

impl Query {
    /// Resolve every clause and compose the SQL. Resolution problems are collected and
    /// reported together. Calling this again returns the same result until a clause changes.
    #[instrument(name = "Query::build", skip_all, fields(entity = self.dsl.from.as_deref()))]
    pub fn build(&mut self) -> Result<&CompiledQuery, BuildError> {
        let compiled = self.ensure_compiled()?;
        let compiled: &CompiledQuery = self.compiled.insert(compiled);
        Ok(compiled)
    }

    pub(super) fn ensure_compiled(&mut self) -> Result<Arc<CompiledQuery>, BuildError> {
        let compiled = match self.compiled.take() {
            Some(compiled) => compiled,
            None => Arc::new(self.compile()?),
        };
        self.compiled = Some(compiled.clone());
        Ok(compiled)
    }

    fn compile(&mut self) -> Result<CompiledQuery, BuildError> {
        let schema = self.schema.clone();
        let config = self.config.clone();
        let connector = self.connector.clone();

        let mut errors = self.errors.clone();

        let Some(from) = self.dsl.from.clone() else {
            errors.push(ResolutionError::MissingFrom);
            return Err(BuildError { errors });
        };
        let Some(base) = schema.entity(&from) else {
            if errors.is_empty() {
                errors.push(ResolutionError::UnknownEntity(from));
            }
            return Err(BuildError { errors });
        };

        let mut resolver = FieldResolver::new(schema.as_ref(), &config, connector.as_ref(), base);

        let fields = self.select_fields();

        // A child's foreign key is selected even if the caller excluded it
        let mut extra = resolver.resolve_fields(&self.dsl.forced_selects, Context::Select);
        let index = match &self.dsl.index {
            Some(IndexSpec::Field(field)) => {
                let columns = resolver.resolve_fields(&[field.clone()], Context::Index);
                match columns.as_slice() {
                    [column] => {
                        let label = column_label(&resolver.context, column);
                        extra.push(column.clone());
                        Some(IndexTarget::Label(label))
                    }
                    _ => None,
                }
            }
            Some(IndexSpec::Computed(key)) => Some(IndexTarget::Computed(key.clone())),
            None => None,
        };

        let columns = resolver.resolve_select(&fields, extra, &self.dsl.relation_paths);

        let alias_selects: Vec<Fragment> = self
            .dsl
            .alias_selects
            .iter()
            .filter_map(|expression| resolver.resolve_expression(expression, Context::AliasSelect))
            .map(Fragment::new)
            .collect();

        let mut predicates = vec![];
        if let Some((expression, params)) = &mut self.dsl.filter
            && let Some(text) = resolver.resolve_expression(expression, Context::Where)
        {
            let fragment = splice_params(expression, &text, params, &mut resolver.errors);
            predicates.push(Predicate::Fragment(fragment));
        }

        if let Some(discriminator) = &base.discriminator {
            predicates.push(Predicate::Eq(
                root_column(&discriminator.column),
                Val::from(discriminator.value.as_str()),
            ));
        }

        if let Some(ChildLink {
            fk,
            parent_keys: Some(keys),
        }) = &self.link
        {
            predicates.push(Predicate::In(root_column(fk), keys.clone()));
        }

        let group_by = self
            .dsl
            .group
            .as_ref()
            .and_then(|expression| resolver.resolve_expression(expression, Context::GroupBy))
            .map(Fragment::new);

        let having = self.dsl.having.as_ref().and_then(|(expression, params)| {
            resolver
                .resolve_expression(expression, Context::Having)
                .map(|text| Fragment::with_params(text, params.clone()))
        });

        let order_by = self
            .dsl
            .order
            .as_ref()
            .and_then(|expression| resolver.resolve_expression(expression, Context::OrderBy))
            .map(Fragment::new);

        let limit = self
            .dsl
            .limit
            .as_ref()
            .map(|(text, params)| Fragment::with_params(text.clone(), params.clone()));

        let hops = std::mem::take(&mut resolver.hops);
        errors.append(&mut resolver.errors);
        if !errors.is_empty() {
            return Err(BuildError { errors });
        }
        let context = resolver.context;

        // Select fields continuing through a toMany property become selects of the child, once
        for hop in hops.iter().filter(|hop| !hop.negated) {
            let child = self.child_for(hop.mount.clone(), &hop.target, &hop.fk);
            if !child.dsl.selects.contains(&hop.field) {
                child.select(&hop.field);
            }
        }
        for hop in hops.iter().filter(|hop| hop.negated) {
            let field = format!("!{}", hop.field);
            if let Some(child) = self.children.get_mut(&hop.mount)
                && !child.dsl.selects.contains(&field)
            {
                child.select(&field);
            }
        }

        let plan = self.mapping_plan(&context, index);

        let select = Select {
            options: self.dsl.options.clone(),
            distinct: self.dsl.distinct,
            columns: columns
                .iter()
                .map(|column| {
                    let alias = context.alias_key(&column.path);
                    SelectColumn {
                        column: QualifiedColumn {
                            alias: alias.to_string(),
                            column: column.column.clone(),
                        },
                        label: column_label(&context, column),
                    }
                })
                .collect(),
            extra_columns: alias_selects,
            table: TableRef::aliased(base.table.as_str(), ROOT_ALIAS),
            joins: context
                .joins()
                .map(|join| LeftJoin {
                    table: TableRef::aliased(join.table.as_str(), join.alias.as_str()),
                    primary_key: QualifiedColumn {
                        alias: join.alias.clone(),
                        column: join.primary_key.clone(),
                    },
                    foreign_key: QualifiedColumn {
                        alias: join.parent_alias.clone(),
                        column: join.bound_fk.clone(),
                    },
                })
                .collect(),
            predicates,
            group_by,
            having,
            order_by,
            limit,
        };

        let (sql, params) = select.to_sql(connector.as_ref());
        let count = self
            .dsl
            .count_without_limit
            .then(|| Count(&select).to_sql(connector.as_ref()));

        debug!(sql = %sql, params = params.len(), "Built query");

        Ok(CompiledQuery {
            sql,
            params,
            count,
            plan,
        })
    }

    /// The select list: `select` fields and expanded `select_with` fields, or `*` if neither
    /// (nor an alias select) was given.
    fn select_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = self
            .dsl
            .selects
            .iter()
            .flat_map(|list| split_fields(list))
            .collect();

        for (prefix, list) in &self.dsl.select_withs {
            fields.extend(split_fields(list).map(|field| {
                if field.is_empty() {
                    field
                } else if let Some(excluded) = field.strip_prefix('!') {
                    format!("!{prefix}.{}", excluded.trim())
                } else {
                    format!("{prefix}.{field}")
                }
            }));
        }

        if fields.is_empty() && self.dsl.alias_selects.is_empty() {
            fields.push("*".to_string());
        }

        fields
    }

    fn mapping_plan(&self, context: &BuildContext, index: Option<IndexTarget>) -> MappingPlan {
        let aliases = context
            .map_info()
            .filter_map(|(alias, info)| {
                let (_, entry) = context.find_alias(alias)?;
                Some(AliasPlan {
                    alias: alias.to_string(),
                    entity: info.entity.clone(),
                    primary_key: entry.primary_key.clone(),
                    attachment: info.binding.as_ref().map(|binding| Attachment {
                        parent_alias: binding.parent_alias.clone(),
                        property: binding.property.clone(),
                    }),
                    strip_primary_key: info.binding.is_some()
                        && !self.config.keep_injected_keys
                        && context.is_auto_key(alias),
                })
            })
            .collect();

        let mounts = self
            .children
            .keys()
            .filter_map(|mount| {
                let owner = context.alias(&mount.owner_path)?;
                Some(MountPlan {
                    mount: mount.clone(),
                    owner_alias: owner.key.clone(),
                    key_label: format!("{}.{}", owner.key, owner.primary_key),
                    property: mount.property.clone(),
                })
            })
            .collect();

        MappingPlan {
            aliases,
            mounts,
            index,
        }
    }
}

fn split_fields(list: &str) -> impl Iterator<Item = String> + '_ {
    list.split(',').map(|field| field.trim().to_string())
}

/// The result label of a selected column: `<alias>.<field>`
fn column_label(context: &BuildContext, column: &ColumnRef) -> String {
    format!("{}.{}", context.alias_key(&column.path), column.label)
}

fn root_column(column: &str) -> QualifiedColumn {
    QualifiedColumn {
        alias: ROOT_ALIAS.to_string(),
        column: column.to_string(),
    }
}

/// Bind the where clause parameters to the placeholders of `text` (the rewritten
/// `expression`). A subquery replaces its placeholder with its own parenthesized SQL, and its
/// parameters take the placeholder's place in the list.
fn splice_params(
    expression: &str,
    text: &str,
    params: &mut [Param],
    errors: &mut Vec<ResolutionError>,
) -> Fragment {
    let positions = placeholder_positions(text);
    if params.len() > positions.len() {
        errors.push(ResolutionError::PlaceholderMismatch {
            expression: expression.to_string(),
            placeholders: positions.len(),
            values: params.len(),
        });
        return Fragment::new(text);
    }

    let mut spliced = String::with_capacity(text.len());
    let mut values = vec![];
    let mut last = 0;

    for (position, param) in positions.into_iter().zip(params.iter_mut()) {
        spliced.push_str(&text[last..position]);
        match param {
            Param::Value(value) => {
                spliced.push('?');
                values.push(value.clone());
            }
            Param::Subquery(query) => match query.build() {
                Ok(compiled) => {
                    spliced.push('(');
                    spliced.push_str(&compiled.sql);
                    spliced.push(')');
                    values.extend(compiled.params.iter().cloned());
                }
                Err(error) => errors.extend(error.errors),
            },
        }
        last = position + 1;
    }
    spliced.push_str(&text[last..]);

    Fragment::with_params(spliced, values)
}
