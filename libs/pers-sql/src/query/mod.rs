// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The query DSL.
//!
//! A [`Query`] only records clauses as they are given. [`Query::build`] resolves them all at
//! once against the entity schema, producing the SQL text, its parameters, and the plan the
//! result mapper follows to turn flat rows back into object graphs. [`Query::exec`] runs the
//! query together with its toMany child queries.
//!
//! ```ignore
//! let mut query = session.query();
//! query
//!     .from("Order")
//!     .select("*, customer.name, items.quantity")
//!     .filter_with("{customer.name} LIKE ?", vec!["A%".into()])
//!     .order("{dateTime} DESC");
//! let orders = query.exec().await?;
//! ```

mod compile;
mod context;
mod curly;
mod exec;
mod output;
mod resolver;
mod to_many;

#[cfg(test)]
mod test_util;

use std::{fmt, sync::Arc};

use indexmap::IndexMap;

use crate::{
    config::QueryConfig,
    query_error::ResolutionError,
    schema::EntitySchema,
    sql::DatabaseConnector,
    value::{Object, Val},
};

pub use compile::CompiledQuery;
pub use output::{Items, QueryOutput};

pub(crate) use context::ROOT_ALIAS;

/// A value bound to a `?` of a where clause: a plain value, or a query whose SQL is embedded
/// in place of the placeholder.
pub enum Param {
    Value(Val),
    Subquery(Box<Query>),
}

impl<T: Into<Val>> From<T> for Param {
    fn from(value: T) -> Self {
        Param::Value(value.into())
    }
}

impl From<Query> for Param {
    fn from(query: Query) -> Self {
        Param::Subquery(Box::new(query))
    }
}

pub type IndexFn = Arc<dyn Fn(&Object) -> Val + Send + Sync>;

/// How results are keyed when the caller asks for a map instead of a list
#[derive(Clone)]
pub(crate) enum IndexSpec {
    Field(String),
    Computed(IndexFn),
}

/// Where a child query's results go: `property` of the objects at the join path `owner_path`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct MountPoint {
    pub owner_path: String,
    pub property: String,
}

/// Ties a toMany child query to its parent. `parent_keys` is set once the parent's rows are
/// known.
#[derive(Debug, Clone)]
pub(crate) struct ChildLink {
    pub fk: String,
    pub parent_keys: Option<Vec<Val>>,
}

type ObjectCallback = Box<dyn FnMut(Object, Option<Val>) + Send>;
type CountCallback = Box<dyn FnMut(i64) + Send>;
type EndCallback = Box<dyn FnMut() + Send>;

#[derive(Default)]
struct Callbacks {
    on_object: Option<ObjectCallback>,
    on_count: Option<CountCallback>,
    on_end: Option<EndCallback>,
}

impl Callbacks {
    fn is_streaming(&self) -> bool {
        self.on_object.is_some() || self.on_count.is_some() || self.on_end.is_some()
    }
}

/// The clauses as given, before resolution
#[derive(Default)]
struct Dsl {
    from: Option<String>,
    selects: Vec<String>,
    select_withs: Vec<(String, String)>,
    alias_selects: Vec<String>,
    /// Fields a child query always selects (its foreign key)
    forced_selects: Vec<String>,
    /// Bridge paths whose primary key must be selected for `to_many`
    relation_paths: Vec<String>,
    filter: Option<(String, Vec<Param>)>,
    having: Option<(String, Vec<Val>)>,
    order: Option<String>,
    group: Option<String>,
    limit: Option<(String, Vec<Val>)>,
    distinct: bool,
    options: Option<String>,
    index: Option<IndexSpec>,
    count_without_limit: bool,
}

pub struct Query {
    schema: Arc<dyn EntitySchema>,
    connector: Arc<dyn DatabaseConnector>,
    config: Arc<QueryConfig>,
    dsl: Dsl,
    /// Problems found while recording clauses, reported by `build()`
    errors: Vec<ResolutionError>,
    children: IndexMap<MountPoint, Query>,
    link: Option<ChildLink>,
    callbacks: Callbacks,
    compiled: Option<Arc<CompiledQuery>>,
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("from", &self.dsl.from)
            .field("sql", &self.sql())
            .field("children", &self.children.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Query {
    pub fn new(
        schema: Arc<dyn EntitySchema>,
        connector: Arc<dyn DatabaseConnector>,
        config: Arc<QueryConfig>,
    ) -> Self {
        Self {
            schema,
            connector,
            config,
            dsl: Dsl::default(),
            errors: vec![],
            children: IndexMap::new(),
            link: None,
            callbacks: Callbacks::default(),
            compiled: None,
        }
    }

    /// A fresh query sharing this query's schema, connector, and configuration
    pub fn sibling(&self) -> Query {
        Query::new(
            self.schema.clone(),
            self.connector.clone(),
            self.config.clone(),
        )
    }

    /// Clause changes invalidate an earlier build
    fn dsl_mut(&mut self) -> &mut Dsl {
        self.compiled = None;
        &mut self.dsl
    }

    /// Set the entity to query. Setting it twice, or naming an unknown entity, is reported by
    /// `build()`.
    pub fn from(&mut self, entity: &str) -> &mut Self {
        if self.dsl.from.is_some() {
            self.errors.push(ResolutionError::FromAlreadySet);
        } else {
            if self.schema.entity(entity).is_none() {
                self.errors
                    .push(ResolutionError::UnknownEntity(entity.to_string()));
            }
            self.dsl_mut().from = Some(entity.to_string());
        }
        self
    }

    /// Add comma-separated fields such as `"*, !dateTime, customer.name, items.*"`
    pub fn select(&mut self, fields: &str) -> &mut Self {
        if !fields.trim().is_empty() {
            self.dsl_mut().selects.push(fields.to_string());
        }
        self
    }

    /// Add fields relative to `prefix`: `select_with("customer", "name, !id")` is
    /// `select("customer.name, !customer.id")`.
    pub fn select_with(&mut self, prefix: &str, fields: &str) -> &mut Self {
        self.dsl_mut()
            .select_withs
            .push((prefix.to_string(), fields.to_string()));
        self
    }

    /// Add a raw select expression such as `UPPER({customer.name}) AS "buyer"`. Its result
    /// lands on the root object under its label.
    pub fn select_alias(&mut self, expression: &str) -> &mut Self {
        self.dsl_mut().alias_selects.push(expression.to_string());
        self
    }

    pub fn filter(&mut self, expression: &str) -> &mut Self {
        self.filter_with(expression, vec![])
    }

    /// Set the where clause. Each `?` is bound to the parameter at the same position; a
    /// [`Param::Subquery`] is embedded there as a parenthesized query.
    pub fn filter_with(&mut self, expression: &str, params: Vec<Param>) -> &mut Self {
        self.dsl_mut().filter = Some((expression.to_string(), params));
        self
    }

    pub fn having(&mut self, expression: &str) -> &mut Self {
        self.having_with(expression, vec![])
    }

    pub fn having_with(&mut self, expression: &str, params: Vec<Val>) -> &mut Self {
        self.dsl_mut().having = Some((expression.to_string(), params));
        self
    }

    pub fn order(&mut self, expression: &str) -> &mut Self {
        self.dsl_mut().order = Some(expression.to_string());
        self
    }

    pub fn group(&mut self, expression: &str) -> &mut Self {
        self.dsl_mut().group = Some(expression.to_string());
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit_with("?", vec![Val::from(limit)])
    }

    /// Set the limit clause verbatim, such as `limit_with("? OFFSET ?", vec![10.into(), 20.into()])`
    pub fn limit_with(&mut self, expression: &str, params: Vec<Val>) -> &mut Self {
        self.dsl_mut().limit = Some((expression.to_string(), params));
        self
    }

    pub fn distinct(&mut self) -> &mut Self {
        self.dsl_mut().distinct = true;
        self
    }

    /// Options emitted verbatim after `SELECT`, such as `SQL_NO_CACHE`
    pub fn options(&mut self, options: &str) -> &mut Self {
        self.dsl_mut().options = Some(options.to_string());
        self
    }

    /// Return results keyed by `field` instead of as a list
    pub fn index(&mut self, field: &str) -> &mut Self {
        self.dsl_mut().index = Some(IndexSpec::Field(field.to_string()));
        self
    }

    /// Return results keyed by a value computed from each mapped object
    pub fn index_with(
        &mut self,
        key: impl Fn(&Object) -> Val + Send + Sync + 'static,
    ) -> &mut Self {
        self.dsl_mut().index = Some(IndexSpec::Computed(Arc::new(key)));
        self
    }

    /// Also count the rows the query would return without its limit
    pub fn count_without_limit(&mut self) -> &mut Self {
        self.dsl_mut().count_without_limit = true;
        self
    }

    /// Deliver each mapped object (and its index key, if indexed) as it arrives instead of
    /// collecting them.
    pub fn on_object(
        &mut self,
        callback: impl FnMut(Object, Option<Val>) + Send + 'static,
    ) -> &mut Self {
        self.callbacks.on_object = Some(Box::new(callback));
        self
    }

    /// Receive the count requested through [`Self::count_without_limit`] when streaming
    pub fn on_count(&mut self, callback: impl FnMut(i64) + Send + 'static) -> &mut Self {
        self.callbacks.on_count = Some(Box::new(callback));
        self
    }

    /// Called once the last streamed row has been delivered
    pub fn on_end(&mut self, callback: impl FnMut() + Send + 'static) -> &mut Self {
        self.callbacks.on_end = Some(Box::new(callback));
        self
    }

    /// The SQL text, once built
    pub fn sql(&self) -> Option<&str> {
        self.compiled.as_deref().map(|compiled| compiled.sql.as_str())
    }

    /// The parameters of the SQL text, once built
    pub fn params(&self) -> Option<&[Val]> {
        self.compiled.as_deref().map(|compiled| compiled.params.as_slice())
    }

    /// The count query, once built with [`Self::count_without_limit`]
    pub fn count_sql(&self) -> Option<&str> {
        self.compiled
            .as_deref()
            .and_then(|compiled| compiled.count.as_ref())
            .map(|(sql, _)| sql.as_str())
    }

    pub fn count_params(&self) -> Option<&[Val]> {
        self.compiled
            .as_deref()
            .and_then(|compiled| compiled.count.as_ref())
            .map(|(_, params)| params.as_slice())
    }

    /// Get or create the child query for `mount`. A new child selects `fk` from `target`.
    fn child_for(&mut self, mount: MountPoint, target: &str, fk: &str) -> &mut Query {
        let mut child = self.sibling();
        self.compiled = None;

        self.children.entry(mount).or_insert_with(|| {
            child.from(target);
            child.dsl.forced_selects.push(fk.to_string());
            child.link = Some(ChildLink {
                fk: fk.to_string(),
                parent_keys: None,
            });
            child
        })
    }
}
