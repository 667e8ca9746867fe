// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Object persistence on top of queries: loading by primary key, saving, and deleting.

use std::sync::Arc;

use tracing::{debug, error, instrument};

use crate::{
    config::QueryConfig,
    database_error::{DatabaseError, WithContext},
    query::{Param, Query},
    query_error::{QueryError, ResolutionError, UsageError},
    schema::{Entity, EntitySchema},
    sql::{
        DatabaseConnector, ExecuteResult, ExpressionBuilder, delete::Delete, insert::Insert,
        table::TableRef, update::Update,
    },
    value::{Object, Val},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    Saved,
    /// The statement ran but affected no row
    NotSaved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveCommand {
    Insert,
    Update,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaveResult {
    pub status: SaveStatus,
    pub command: SaveCommand,
    pub last_insert_id: Option<Val>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStatus {
    Deleted,
    NotDeleted,
}

/// Entry point for queries and object persistence over one schema and connector
#[derive(Clone)]
pub struct Session {
    schema: Arc<dyn EntitySchema>,
    connector: Arc<dyn DatabaseConnector>,
    config: Arc<QueryConfig>,
}

impl Session {
    pub fn new(
        schema: Arc<dyn EntitySchema>,
        connector: Arc<dyn DatabaseConnector>,
        config: QueryConfig,
    ) -> Self {
        Self {
            schema,
            connector,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn connector(&self) -> &Arc<dyn DatabaseConnector> {
        &self.connector
    }

    pub fn query(&self) -> Query {
        Query::new(
            self.schema.clone(),
            self.connector.clone(),
            self.config.clone(),
        )
    }

    /// A session whose statements all go through one pooled connection, such as for a
    /// transaction. Hand the connection back with [`Session::release`].
    pub async fn acquire(&self) -> Result<Session, DatabaseError> {
        Ok(Session {
            schema: self.schema.clone(),
            connector: self.connector.acquire().await?,
            config: self.config.clone(),
        })
    }

    pub async fn release(self) -> Result<(), DatabaseError> {
        self.connector.release().await
    }

    /// Load the object of `entity` whose primary key is `id`. An empty `fields` selects every
    /// column.
    #[instrument(name = "Session::load_by_id", skip(self, id, fields))]
    pub async fn load_by_id(
        &self,
        entity: &str,
        id: impl Into<Val>,
        fields: &str,
    ) -> Result<Option<Object>, QueryError> {
        let primary_key = self.entity(entity)?.primary_key.clone();

        let mut query = self.query();
        query
            .from(entity)
            .select(fields)
            .filter_with(&format!("{{{primary_key}}} = ?"), vec![Param::from(id)])
            .limit(1);

        let items = query.exec().await?.into_items();
        Ok(items.and_then(|items| items.into_list().into_iter().next()))
    }

    /// Reload `object` by its primary key and merge the loaded fields into it, recursing into
    /// related objects it already holds. Returns whether the object was found.
    pub async fn hydrate(&self, object: &mut Object, fields: &str) -> Result<bool, QueryError> {
        let entity = self.entity(object.entity())?;
        let id = primary_key_value(entity, object)
            .ok_or(UsageError::MissingPrimaryKey {
                operation: "hydrate",
            })?
            .clone();

        let name = object.entity().to_string();
        match self.load_by_id(&name, id, fields).await? {
            Some(loaded) => {
                merge(object, loaded);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Insert `object` if its primary key is unset, otherwise update it.
    pub async fn save(&self, object: &mut Object) -> Result<SaveResult, QueryError> {
        let entity = self.entity(object.entity())?;
        let command = match primary_key_value(entity, object) {
            Some(_) => SaveCommand::Update,
            None => SaveCommand::Insert,
        };
        self.persist(object, command).await
    }

    /// Insert `object`, even if its primary key is set.
    pub async fn insert(&self, object: &mut Object) -> Result<SaveResult, QueryError> {
        self.persist(object, SaveCommand::Insert).await
    }

    #[instrument(name = "Session::persist", skip_all, fields(entity = object.entity(), command = ?command))]
    async fn persist(
        &self,
        object: &mut Object,
        command: SaveCommand,
    ) -> Result<SaveResult, QueryError> {
        let entity = self.entity(object.entity())?;
        let primary_key = entity.primary_key.as_str();

        let mut values: Vec<(String, Val)> = object
            .fields()
            .filter(|(field, value)| {
                entity.has_column(field)
                    && match command {
                        SaveCommand::Insert => *field != primary_key || !value.is_null(),
                        SaveCommand::Update => *field != primary_key,
                    }
            })
            .map(|(field, value)| (field.to_string(), value.clone()))
            .collect();

        if values.is_empty() {
            return Err(UsageError::NothingToSave.into());
        }

        if let Some(discriminator) = &entity.discriminator
            && !values.iter().any(|(column, _)| *column == discriminator.column)
        {
            let value = Val::from(discriminator.value.as_str());
            object.insert(&discriminator.column, value.clone());
            values.push((discriminator.column.clone(), value));
        }

        let table = TableRef::plain(entity.table.as_str());
        let result = match command {
            SaveCommand::Insert => {
                let insert = Insert {
                    table,
                    values,
                    returning: self
                        .connector
                        .supports_returning()
                        .then(|| primary_key.to_string()),
                };
                let result = self.execute(&insert).await?;
                if let Some(id) = &result.last_insert_id {
                    object.insert(primary_key, id.clone());
                }
                result
            }
            SaveCommand::Update => {
                let key = primary_key_value(entity, object)
                    .ok_or(UsageError::MissingPrimaryKey {
                        operation: "update",
                    })?
                    .clone();
                let update = Update {
                    table,
                    values,
                    key: (primary_key.to_string(), key),
                };
                self.execute(&update).await?
            }
        };

        Ok(SaveResult {
            status: if result.row_count > 0 {
                SaveStatus::Saved
            } else {
                SaveStatus::NotSaved
            },
            command,
            last_insert_id: result.last_insert_id,
        })
    }

    #[instrument(name = "Session::delete_by_id", skip(self, id))]
    pub async fn delete_by_id(
        &self,
        entity: &str,
        id: impl Into<Val>,
    ) -> Result<DeleteStatus, QueryError> {
        let definition = self.entity(entity)?;
        let delete = Delete {
            table: TableRef::plain(definition.table.as_str()),
            key: (definition.primary_key.clone(), id.into()),
        };

        let result = self.execute(&delete).await?;
        Ok(if result.row_count > 0 {
            DeleteStatus::Deleted
        } else {
            DeleteStatus::NotDeleted
        })
    }

    pub async fn delete_object(&self, object: &Object) -> Result<DeleteStatus, QueryError> {
        let entity = self.entity(object.entity())?;
        let id = primary_key_value(entity, object)
            .ok_or(UsageError::MissingPrimaryKey {
                operation: "delete",
            })?
            .clone();

        self.delete_by_id(object.entity(), id).await
    }

    async fn execute(
        &self,
        statement: &impl ExpressionBuilder,
    ) -> Result<ExecuteResult, QueryError> {
        let (sql, params) = statement.to_sql(self.connector.as_ref());
        debug!(sql = %sql, params = params.len(), "Executing statement");

        let result = self
            .connector
            .execute(&sql, &params)
            .await
            .inspect_err(|error| error!(%error, "Statement failed"))
            .with_context(format!("While executing '{sql}'"))?;
        Ok(result)
    }

    fn entity(&self, name: &str) -> Result<&Entity, ResolutionError> {
        self.schema
            .entity(name)
            .ok_or_else(|| ResolutionError::UnknownEntity(name.to_string()))
    }
}

fn primary_key_value<'a>(entity: &Entity, object: &'a Object) -> Option<&'a Val> {
    object
        .get(&entity.primary_key)
        .filter(|value| !value.is_null())
}

/// Copy `loaded` into `object`, merging into related objects `object` already holds.
fn merge(object: &mut Object, loaded: Object) {
    for (field, value) in loaded {
        match value {
            Val::Object(incoming) => match object.get_mut(&field) {
                Some(Val::Object(existing)) => merge(existing, incoming),
                _ => {
                    object.insert(field, incoming);
                }
            },
            value => {
                object.insert(field, value);
            }
        }
    }
}
