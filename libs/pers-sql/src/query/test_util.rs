// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

#![cfg(test)]

use std::sync::Arc;

use crate::{
    config::QueryConfig,
    schema::{Schema, test_helper::shop_schema},
    sql::EscapeStyle,
    testing::ScriptedConnector,
    value::Val,
};

use super::Query;

pub struct TestSetup {
    pub schema: Arc<Schema>,
    pub connector: Arc<ScriptedConnector>,
    pub config: Arc<QueryConfig>,
}

impl TestSetup {
    pub fn new() -> Self {
        Self::configured(QueryConfig::default(), EscapeStyle::DoubleQuote)
    }

    fn configured(config: QueryConfig, style: EscapeStyle) -> Self {
        Self {
            schema: Arc::new(shop_schema()),
            connector: Arc::new(ScriptedConnector::with_style(style)),
            config: Arc::new(config),
        }
    }

    pub fn with_setup(test_fn: impl Fn(TestSetup)) {
        test_fn(Self::new())
    }

    pub fn with_config(config: QueryConfig, style: EscapeStyle, test_fn: impl Fn(TestSetup)) {
        test_fn(Self::configured(config, style))
    }

    pub fn query(&self) -> Query {
        Query::new(
            self.schema.clone(),
            self.connector.clone(),
            self.config.clone(),
        )
    }

    /// Build `query`, panicking on resolution errors, and return its SQL and parameters.
    pub fn built(&self, query: &mut Query) -> (String, Vec<Val>) {
        let compiled = query.build().unwrap();
        (compiled.sql.clone(), compiled.params.clone())
    }
}
