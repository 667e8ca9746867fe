// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use super::{ExpressionBuilder, SQLBuilder};

/// A table with an optional alias such as `"Order" "#0"`
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub table: String,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn aliased(table: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: Some(alias.into()),
        }
    }

    pub fn plain(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: None,
        }
    }
}

impl ExpressionBuilder for TableRef {
    fn build(&self, builder: &mut SQLBuilder) {
        builder.push_identifier(&self.table);
        if let Some(alias) = &self.alias {
            builder.push_space();
            builder.push_identifier(alias);
        }
    }
}
