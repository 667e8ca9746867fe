// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! An in-memory connector that replays queued results and records every statement it is
//! given.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;

use crate::{
    database_error::DatabaseError,
    sql::{DatabaseConnector, EscapeStyle, ExecuteResult},
    value::{Row, Val},
};

#[derive(Default)]
pub struct ScriptedConnector {
    style: EscapeStyle,
    returning: bool,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    rows: VecDeque<Result<Vec<Row>, String>>,
    executions: VecDeque<ExecuteResult>,
    statements: Vec<(String, Vec<Val>)>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_style(style: EscapeStyle) -> Self {
        Self {
            style,
            ..Self::default()
        }
    }

    /// Report support for `INSERT ... RETURNING`
    pub fn with_returning(mut self) -> Self {
        self.returning = true;
        self
    }

    /// Queue the rows for the next `query` call. Calls with nothing queued return no rows.
    pub fn push_rows(&self, rows: Vec<Row>) {
        self.state().rows.push_back(Ok(rows));
    }

    /// Make the next `query` call fail with `message`.
    pub fn push_failure(&self, message: &str) {
        self.state().rows.push_back(Err(message.to_string()));
    }

    /// Queue the result of the next `execute` call. Calls with nothing queued affect one row.
    pub fn push_execute(&self, result: ExecuteResult) {
        self.state().executions.push_back(result);
    }

    /// Every statement received so far, in order
    pub fn statements(&self) -> Vec<(String, Vec<Val>)> {
        self.state().statements.clone()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, sql: &str, params: &[Val]) {
        self.state()
            .statements
            .push((sql.to_string(), params.to_vec()));
    }
}

#[async_trait]
impl DatabaseConnector for ScriptedConnector {
    fn escape_identifier(&self, name: &str) -> String {
        self.style.escape(name)
    }

    fn supports_returning(&self) -> bool {
        self.returning
    }

    async fn execute(&self, sql: &str, params: &[Val]) -> Result<ExecuteResult, DatabaseError> {
        self.record(sql, params);
        Ok(self
            .state()
            .executions
            .pop_front()
            .unwrap_or(ExecuteResult {
                last_insert_id: None,
                row_count: 1,
            }))
    }

    async fn query(&self, sql: &str, params: &[Val]) -> Result<Vec<Row>, DatabaseError> {
        self.record(sql, params);
        match self.state().rows.pop_front() {
            Some(Ok(rows)) => Ok(rows),
            Some(Err(message)) => Err(DatabaseError::Validation(message)),
            None => Ok(vec![]),
        }
    }

    async fn acquire(&self) -> Result<Arc<dyn DatabaseConnector>, DatabaseError> {
        Ok(Arc::new(ScriptedConnector::with_style(self.style)))
    }
}

/// A row from `(label, value)` pairs
pub fn row<const N: usize>(cells: [(&str, Val); N]) -> Row {
    cells
        .into_iter()
        .map(|(label, value)| (label.to_string(), value))
        .collect()
}
