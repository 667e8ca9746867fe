// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::value::Val;

use super::{ExpressionBuilder, SQLBuilder, table::TableRef};

/// An insert of a single row.
#[derive(Debug)]
pub struct Insert {
    pub table: TableRef,
    /// Column names and the values to insert into them
    pub values: Vec<(String, Val)>,
    /// The column to return, for connectors that support `RETURNING`
    pub returning: Option<String>,
}

impl ExpressionBuilder for Insert {
    /// Build the insert statement for the form `INSERT INTO <table> (<columns>) VALUES (<values>)
    /// RETURNING <column>`.
    fn build(&self, builder: &mut SQLBuilder) {
        builder.push_str("INSERT INTO ");
        self.table.build(builder);

        if self.values.is_empty() {
            builder.push_str(" DEFAULT VALUES");
        } else {
            builder.push_str(" (");
            builder.push_iter(self.values.iter(), ", ", |builder, (column, _)| {
                builder.push_identifier(column);
            });
            builder.push_str(") VALUES (");
            builder.push_iter(self.values.iter(), ", ", |builder, (_, value)| {
                builder.push_param(value.clone());
            });
            builder.push(')');
        }

        if let Some(returning) = &self.returning {
            builder.push_str(" RETURNING ");
            builder.push_identifier(returning);
        }
    }
}
