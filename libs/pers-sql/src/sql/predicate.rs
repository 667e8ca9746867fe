// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::value::Val;

use super::{ExpressionBuilder, SQLBuilder, column::Fragment, column::QualifiedColumn};

/// One conjunct of a WHERE clause
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Caller-written condition, parenthesized since it may contain its own ORs
    Fragment(Fragment),
    Eq(QualifiedColumn, Val),
    In(QualifiedColumn, Vec<Val>),
}

impl ExpressionBuilder for Predicate {
    fn build(&self, builder: &mut SQLBuilder) {
        match self {
            Predicate::Fragment(fragment) => {
                builder.push('(');
                fragment.build(builder);
                builder.push(')');
            }
            Predicate::Eq(column, value) => {
                column.build(builder);
                builder.push_str(" = ");
                builder.push_param(value.clone());
            }
            Predicate::In(column, values) => {
                column.build(builder);
                builder.push_str(" IN (");
                builder.push_iter(values.iter(), ", ", |builder, value| {
                    builder.push_param(value.clone());
                });
                builder.push(')');
            }
        }
    }
}
