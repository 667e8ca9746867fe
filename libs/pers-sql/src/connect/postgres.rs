// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! A [`DatabaseConnector`] over a deadpool-postgres connection pool.

use std::{error::Error, ops::Deref, str::FromStr, sync::Arc};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use deadpool_postgres::{Client, Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use futures::{TryStreamExt, pin_mut};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tokio_postgres::{
    NoTls,
    types::{IsNull, ToSql, Type, to_sql_checked},
};
use tracing::{debug, instrument};

use crate::{
    config::Environment,
    database_error::DatabaseError,
    sql::{
        DatabaseConnector, EscapeStyle, ExecuteResult, RowSink, placeholder::numbered_placeholders,
    },
    value::{Row, Val, ValNumber},
};

pub const PERS_POSTGRES_URL: &str = "PERS_POSTGRES_URL";
pub const PERS_CONNECTION_POOL_SIZE: &str = "PERS_CONNECTION_POOL_SIZE";

const DEFAULT_POOL_SIZE: usize = 10;

pub struct PostgresConnector {
    pool: Pool,
    /// Set for connectors returned by `acquire`; `None` inside once released
    pinned: Option<Mutex<Option<Client>>>,
}

impl PostgresConnector {
    pub fn from_env(env: &dyn Environment) -> Result<Self, DatabaseError> {
        let url = env.get(PERS_POSTGRES_URL).ok_or_else(|| {
            DatabaseError::Config(format!("Env {PERS_POSTGRES_URL} must be provided"))
        })?;

        let pool_size = match env.get(PERS_CONNECTION_POOL_SIZE) {
            Some(size) => size.parse().map_err(|_| {
                DatabaseError::Config(format!(
                    "Env {PERS_CONNECTION_POOL_SIZE} must be a positive number, got '{size}'"
                ))
            })?,
            None => DEFAULT_POOL_SIZE,
        };

        Self::from_db_url(&url, pool_size)
    }

    pub fn from_db_url(url: &str, pool_size: usize) -> Result<Self, DatabaseError> {
        let config = tokio_postgres::Config::from_str(url).map_err(|e| {
            DatabaseError::Delegate(e).with_context("Failed to parse PostgreSQL URL".into())
        })?;

        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let manager = Manager::from_config(config, NoTls, manager_config);

        let pool = Pool::builder(manager)
            .max_size(pool_size)
            .build()
            .map_err(|e| DatabaseError::Config(format!("Failed to create a pool: {e}")))?;

        Ok(Self { pool, pinned: None })
    }

    async fn client(&self) -> Result<Checkout<'_>, DatabaseError> {
        match &self.pinned {
            Some(pinned) => MutexGuard::try_map(pinned.lock().await, Option::as_mut)
                .map(Checkout::Pinned)
                .map_err(|_| DatabaseError::Config("The connection was already released".into())),
            None => Ok(Checkout::Pooled(self.pool.get().await?)),
        }
    }

    async fn take_pinned(&self) -> Option<Client> {
        match &self.pinned {
            Some(pinned) => pinned.lock().await.take(),
            None => None,
        }
    }
}

enum Checkout<'a> {
    Pooled(Client),
    Pinned(MappedMutexGuard<'a, Client>),
}

impl Deref for Checkout<'_> {
    type Target = tokio_postgres::Client;

    fn deref(&self) -> &Self::Target {
        match self {
            Checkout::Pooled(client) => client,
            Checkout::Pinned(client) => client,
        }
    }
}

fn sql_params(params: &[Val]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|param| param as &(dyn ToSql + Sync)).collect()
}

#[async_trait]
impl DatabaseConnector for PostgresConnector {
    fn escape_identifier(&self, name: &str) -> String {
        EscapeStyle::DoubleQuote.escape(name)
    }

    fn supports_returning(&self) -> bool {
        true
    }

    #[instrument(name = "PostgresConnector::execute", skip_all)]
    async fn execute(&self, sql: &str, params: &[Val]) -> Result<ExecuteResult, DatabaseError> {
        let client = self.client().await?;
        let sql = numbered_placeholders(sql);
        debug!(%sql, "Executing statement");

        if sql.contains(" RETURNING ") {
            let rows = client.query(&sql, &sql_params(params)).await?;
            let last_insert_id = match rows.first() {
                Some(row) if !row.is_empty() => Some(column_value(row, 0)?),
                _ => None,
            };
            Ok(ExecuteResult {
                last_insert_id,
                row_count: rows.len() as u64,
            })
        } else {
            let row_count = client.execute(&sql, &sql_params(params)).await?;
            Ok(ExecuteResult {
                last_insert_id: None,
                row_count,
            })
        }
    }

    #[instrument(name = "PostgresConnector::query", skip_all)]
    async fn query(&self, sql: &str, params: &[Val]) -> Result<Vec<Row>, DatabaseError> {
        let client = self.client().await?;
        let sql = numbered_placeholders(sql);
        debug!(%sql, "Running query");

        client
            .query(&sql, &sql_params(params))
            .await?
            .iter()
            .map(to_row)
            .collect()
    }

    async fn stream_query(
        &self,
        sql: &str,
        params: &[Val],
        sink: &mut RowSink<'_>,
    ) -> Result<(), DatabaseError> {
        let client = self.client().await?;
        let sql = numbered_placeholders(sql);
        debug!(%sql, "Streaming query");

        let stream = client.query_raw(&sql, sql_params(params)).await?;
        pin_mut!(stream);

        while let Some(row) = stream.try_next().await? {
            sink(to_row(&row)?)?;
        }
        Ok(())
    }

    async fn acquire(&self) -> Result<Arc<dyn DatabaseConnector>, DatabaseError> {
        let client = self.pool.get().await?;
        Ok(Arc::new(PostgresConnector {
            pool: self.pool.clone(),
            pinned: Some(Mutex::new(Some(client))),
        }))
    }

    async fn release(&self) -> Result<(), DatabaseError> {
        // Dropping a pooled client hands it back to the pool
        drop(self.take_pinned().await);
        Ok(())
    }

    async fn destroy(&self) -> Result<(), DatabaseError> {
        if let Some(client) = self.take_pinned().await {
            drop(Object::take(client));
        }
        Ok(())
    }
}

fn to_row(row: &tokio_postgres::Row) -> Result<Row, DatabaseError> {
    (0..row.len())
        .map(|index| {
            let label = row.columns()[index].name().to_string();
            Ok((label, column_value(row, index)?))
        })
        .collect()
}

fn column_value(row: &tokio_postgres::Row, index: usize) -> Result<Val, DatabaseError> {
    let value: Val = match *row.columns()[index].type_() {
        Type::BOOL => row.try_get::<_, Option<bool>>(index)?.into(),
        Type::INT2 => row.try_get::<_, Option<i16>>(index)?.map(i32::from).into(),
        Type::INT4 => row.try_get::<_, Option<i32>>(index)?.into(),
        Type::INT8 => row.try_get::<_, Option<i64>>(index)?.into(),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(index)?.into(),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(index)?.into(),
        Type::BYTEA => row
            .try_get::<_, Option<Vec<u8>>>(index)?
            .map(Bytes::from)
            .into(),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(index)?
            .map(|value| value.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            .into(),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(index)?
            .map(|value| value.to_rfc3339())
            .into(),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(index)?
            .map(|value| value.to_string())
            .into(),
        _ => row.try_get::<_, Option<String>>(index)?.into(),
    };
    Ok(value)
}

type ToSqlResult = Result<IsNull, Box<dyn Error + Sync + Send>>;

impl ToSql for Val {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> ToSqlResult {
        match self {
            Val::Null => Ok(IsNull::Yes),
            Val::Bool(value) => value.to_sql(ty, out),
            Val::Number(number) => number_to_sql(number, ty, out),
            Val::String(value) => match *ty {
                Type::TIMESTAMPTZ => value.parse::<DateTime<FixedOffset>>()?.to_sql(ty, out),
                Type::TIMESTAMP => value.parse::<NaiveDateTime>()?.to_sql(ty, out),
                Type::DATE => value.parse::<NaiveDate>()?.to_sql(ty, out),
                _ => value.to_sql(ty, out),
            },
            Val::Binary(value) => value.as_ref().to_sql(ty, out),
            Val::List(_) | Val::Map(_) | Val::Object(_) => Err(unsupported(self, ty)),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true // Conversion is driven by `ty` in `to_sql`
    }

    to_sql_checked!();
}

fn number_to_sql(number: &ValNumber, ty: &Type, out: &mut BytesMut) -> ToSqlResult {
    let integer = || number.as_i64().ok_or_else(|| unsupported(number, ty));
    let float = || number.as_f64().ok_or_else(|| unsupported(number, ty));

    match *ty {
        Type::INT2 => i16::try_from(integer()?)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(integer()?)?.to_sql(ty, out),
        Type::INT8 => integer()?.to_sql(ty, out),
        Type::FLOAT4 => (float()? as f32).to_sql(ty, out),
        Type::FLOAT8 => float()?.to_sql(ty, out),
        _ => number.to_string().to_sql(ty, out),
    }
}

fn unsupported(value: &impl std::fmt::Display, ty: &Type) -> Box<dyn Error + Sync + Send> {
    Box::new(DatabaseError::Validation(format!(
        "Can't bind {value} as a parameter of type {ty}"
    )))
}
