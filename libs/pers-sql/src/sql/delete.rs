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

/// A delete of the single row identified by its primary key.
#[derive(Debug)]
pub struct Delete {
    pub table: TableRef,
    pub key: (String, Val),
}

impl ExpressionBuilder for Delete {
    /// Build the statement `DELETE FROM <table> WHERE <key column> = <key value>`.
    fn build(&self, builder: &mut SQLBuilder) {
        builder.push_str("DELETE FROM ");
        self.table.build(builder);

        let (key_column, key_value) = &self.key;
        builder.push_str(" WHERE ");
        builder.push_identifier(key_column);
        builder.push_str(" = ");
        builder.push_param(key_value.clone());
    }
}
