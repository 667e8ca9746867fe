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

/// An update of the single row identified by its primary key.
#[derive(Debug)]
pub struct Update {
    pub table: TableRef,
    pub values: Vec<(String, Val)>,
    /// The primary key column and its value
    pub key: (String, Val),
}

impl ExpressionBuilder for Update {
    /// Build the update statement for the form `UPDATE <table> SET <column> = <value>, ...
    /// WHERE <key column> = <key value>`.
    fn build(&self, builder: &mut SQLBuilder) {
        builder.push_str("UPDATE ");
        self.table.build(builder);
        builder.push_str(" SET ");
        builder.push_iter(self.values.iter(), ", ", |builder, (column, value)| {
            builder.push_identifier(column);
            builder.push_str(" = ");
            builder.push_param(value.clone());
        });

        let (key_column, key_value) = &self.key;
        builder.push_str(" WHERE ");
        builder.push_identifier(key_column);
        builder.push_str(" = ");
        builder.push_param(key_value.clone());
    }
}
