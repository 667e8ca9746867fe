// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    database_error::DatabaseError,
    value::{Row, Val},
};

/// Outcome of an INSERT, UPDATE, or DELETE
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecuteResult {
    pub last_insert_id: Option<Val>,
    pub row_count: u64,
}

/// Receives streamed rows one at a time. Returning an error stops the stream.
pub type RowSink<'a> = dyn FnMut(Row) -> Result<(), DatabaseError> + Send + 'a;

/// The driver layer beneath queries.
///
/// Statements use `?` placeholders with a parallel parameter list; translating them into the
/// dialect's own placeholder syntax is up to the implementation, as are pooling and
/// transactions. Rows come back keyed by the column labels of the statement.
#[async_trait]
pub trait DatabaseConnector: Send + Sync {
    fn escape_identifier(&self, name: &str) -> String;

    /// Whether `INSERT ... RETURNING` is understood
    fn supports_returning(&self) -> bool {
        false
    }

    async fn execute(&self, sql: &str, params: &[Val]) -> Result<ExecuteResult, DatabaseError>;

    async fn query(&self, sql: &str, params: &[Val]) -> Result<Vec<Row>, DatabaseError>;

    /// Deliver rows to `sink` as they arrive. The default buffers through [`Self::query`].
    async fn stream_query(
        &self,
        sql: &str,
        params: &[Val],
        sink: &mut RowSink<'_>,
    ) -> Result<(), DatabaseError> {
        for row in self.query(sql, params).await? {
            sink(row)?;
        }
        Ok(())
    }

    /// A connector pinned to a single connection, for work that must not hop between pooled
    /// connections (such as a transaction).
    async fn acquire(&self) -> Result<Arc<dyn DatabaseConnector>, DatabaseError>;

    /// Give a connection obtained through [`Self::acquire`] back to its pool.
    async fn release(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    /// Close a connection obtained through [`Self::acquire`] instead of returning it.
    async fn destroy(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

/// Identifier quoting conventions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EscapeStyle {
    /// `"name"`, used by Postgres and SQLite
    #[default]
    DoubleQuote,
    /// `` `name` ``, used by MySQL
    Backtick,
}

impl EscapeStyle {
    pub fn escape(&self, name: &str) -> String {
        let quote = match self {
            EscapeStyle::DoubleQuote => '"',
            EscapeStyle::Backtick => '`',
        };

        let mut escaped = String::with_capacity(name.len() + 2);
        escaped.push(quote);
        for c in name.chars() {
            if c == quote {
                escaped.push(quote);
            }
            escaped.push(c);
        }
        escaped.push(quote);
        escaped
    }
}
