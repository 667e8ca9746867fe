// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use super::{ExpressionBuilder, SQLBuilder, column::QualifiedColumn, table::TableRef};

/// A join that brings in the target of a bridge relation. Always a left join, so that a
/// missing related row shows up as NULL columns rather than dropping the owner's row.
#[derive(Debug, Clone, PartialEq)]
pub struct LeftJoin {
    /// The joined table such as `"Customer" "#1"`
    pub table: TableRef,
    /// The joined table's primary key such as `"#1"."id"`
    pub primary_key: QualifiedColumn,
    /// The owner's foreign key such as `"#0"."customerId"`
    pub foreign_key: QualifiedColumn,
}

impl ExpressionBuilder for LeftJoin {
    /// Build expression of the form `LEFT JOIN <table> ON <primary key> = <foreign key>`.
    fn build(&self, builder: &mut SQLBuilder) {
        builder.push_str("LEFT JOIN ");
        self.table.build(builder);
        builder.push_str(" ON ");
        self.primary_key.build(builder);
        builder.push_str(" = ");
        self.foreign_key.build(builder);
    }
}
