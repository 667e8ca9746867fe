// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Query execution: the query's own SQL first, then each toMany child query filtered by the
//! keys the parent rows carry, then mapping.

use std::collections::HashSet;

use async_recursion::async_recursion;
use indexmap::IndexMap;
use tracing::{debug, error, instrument, trace, warn};

use crate::{
    database_error::DatabaseError,
    mapper::{Group, MappingPlan, ResultMapper},
    query_error::{QueryError, UsageError},
    sql::DatabaseConnector,
    value::{Row, Val},
};

use super::{CompiledQuery, MountPoint, Query, QueryOutput, ROOT_ALIAS};

impl Query {
    /// Build and run the query.
    ///
    /// With callbacks registered, each mapped object goes to [`Query::on_object`] as its row
    /// arrives and the result is [`QueryOutput::Streamed`]. Streaming queries can't have toMany
    /// children. A query returned by [`Query::to_many`] only runs as part of its parent.
    #[instrument(name = "Query::exec", skip_all, fields(entity = self.dsl.from.as_deref()))]
    pub async fn exec(&mut self) -> Result<QueryOutput, QueryError> {
        if self.link.is_some() {
            return Err(UsageError::ChildExec.into());
        }

        let compiled = self.ensure_compiled()?;

        if self.callbacks.is_streaming() {
            if !self.children.is_empty() {
                return Err(UsageError::StreamingWithToMany.into());
            }
            return self.stream(&compiled).await;
        }

        let (rows, groups) = self.fetch(&compiled).await?;
        let items = ResultMapper::new(&compiled.plan, groups).map_rows(rows);

        match &compiled.count {
            Some((sql, params)) => {
                let total_count = count(self.connector.as_ref(), sql, params).await?;
                Ok(QueryOutput::Counted { items, total_count })
            }
            None => Ok(QueryOutput::Items(items)),
        }
    }

    async fn stream(&mut self, compiled: &CompiledQuery) -> Result<QueryOutput, QueryError> {
        let connector = self.connector.clone();
        let mapper = ResultMapper::new(&compiled.plan, IndexMap::new());
        let on_object = &mut self.callbacks.on_object;

        let mut sink = |row: Row| {
            let (object, index) = mapper.map_row(row);
            if let Some(on_object) = on_object.as_mut() {
                on_object(object, index);
            }
            Ok::<(), DatabaseError>(())
        };

        debug!(sql = %compiled.sql, params = compiled.params.len(), "Streaming query");
        connector
            .stream_query(&compiled.sql, &compiled.params, &mut sink)
            .await
            .inspect_err(|error| error!(%error, "Streaming query failed"))?;

        let total_count = match &compiled.count {
            Some((sql, params)) => {
                let total_count = count(connector.as_ref(), sql, params).await?;
                if let Some(on_count) = self.callbacks.on_count.as_mut() {
                    on_count(total_count);
                }
                Some(total_count)
            }
            None => None,
        };

        if let Some(on_end) = self.callbacks.on_end.as_mut() {
            on_end();
        }

        Ok(QueryOutput::Streamed { total_count })
    }

    /// Run this query's SQL, then each child's (recursively), returning the rows and the
    /// children's results grouped by the key they belong to.
    #[async_recursion]
    async fn fetch(
        &mut self,
        compiled: &CompiledQuery,
    ) -> Result<(Vec<Row>, IndexMap<MountPoint, Group>), QueryError> {
        let connector = self.connector.clone();

        debug!(sql = %compiled.sql, params = compiled.params.len(), "Executing query");
        let rows = connector
            .query(&compiled.sql, &compiled.params)
            .await
            .inspect_err(|error| error!(%error, "Query failed"))?;

        let groups = self.fetch_children(&compiled.plan, &rows).await?;
        Ok((rows, groups))
    }

    async fn fetch_children(
        &mut self,
        plan: &MappingPlan,
        rows: &[Row],
    ) -> Result<IndexMap<MountPoint, Group>, QueryError> {
        let mut groups = IndexMap::new();

        for mount_plan in &plan.mounts {
            let Some(child) = self.children.get_mut(&mount_plan.mount) else {
                continue;
            };

            let mut seen = HashSet::new();
            let keys: Vec<Val> = rows
                .iter()
                .filter_map(|row| row.get(&mount_plan.key_label))
                .filter(|key| !key.is_null() && seen.insert(*key))
                .cloned()
                .collect();

            if keys.is_empty() {
                warn!(
                    property = %mount_plan.property,
                    "Skipping toMany query: no parent keys"
                );
                continue;
            }
            trace!(property = %mount_plan.property, keys = ?keys, "Running toMany query");

            let Some(fk) = child.set_parent_keys(keys) else {
                continue;
            };
            let fk_label = format!("{ROOT_ALIAS}.{fk}");

            let child_compiled = child.ensure_compiled()?;
            let (child_rows, child_groups) = child.fetch(&child_compiled).await?;

            let mapper = ResultMapper::new(&child_compiled.plan, child_groups);
            let mut group = Group::new(child_compiled.plan.is_indexed());
            for row in child_rows {
                let key = row.get(&fk_label).cloned().unwrap_or_default();
                let (object, index) = mapper.map_row(row);
                group.add(key, object, index);
            }

            groups.insert(mount_plan.mount.clone(), group);
        }

        Ok(groups)
    }

    /// Filter this child query by its parent's keys. Returns the foreign key the keys are
    /// matched against.
    fn set_parent_keys(&mut self, keys: Vec<Val>) -> Option<String> {
        let link = self.link.as_mut()?;
        link.parent_keys = Some(keys);
        self.compiled = None;
        Some(link.fk.clone())
    }
}

async fn count(
    connector: &dyn DatabaseConnector,
    sql: &str,
    params: &[Val],
) -> Result<i64, QueryError> {
    debug!(sql, params = params.len(), "Counting rows");
    let rows = connector
        .query(sql, params)
        .await
        .inspect_err(|error| error!(%error, "Count query failed"))?;

    rows.first()
        .and_then(|row| row.get("count"))
        .and_then(Val::as_i64)
        .ok_or_else(|| {
            QueryError::from(DatabaseError::Validation(
                "Count query did not return a count".to_string(),
            ))
        })
}
