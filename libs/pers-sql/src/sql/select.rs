// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use super::{
    ExpressionBuilder, SQLBuilder, column::Fragment, column::SelectColumn, join::LeftJoin,
    predicate::Predicate, table::TableRef,
};

/// A select statement
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    /// Verbatim select options such as `SQL_NO_CACHE`
    pub options: Option<String>,
    pub distinct: bool,
    /// The resolved columns to select
    pub columns: Vec<SelectColumn>,
    /// Caller-written select expressions such as `COUNT(*) AS "n"`
    pub extra_columns: Vec<Fragment>,
    /// The table to select from
    pub table: TableRef,
    pub joins: Vec<LeftJoin>,
    /// Conjuncts of the WHERE clause
    pub predicates: Vec<Predicate>,
    pub group_by: Option<Fragment>,
    pub having: Option<Fragment>,
    pub order_by: Option<Fragment>,
    pub limit: Option<Fragment>,
}

impl Select {
    fn build_body(&self, builder: &mut SQLBuilder, paged: bool) {
        builder.push_str("SELECT ");
        if let Some(options) = &self.options {
            builder.push_str(options);
            builder.push_space();
        }
        if self.distinct {
            builder.push_str("DISTINCT ");
        }

        builder.push_elems(&self.columns, ", ");
        if !self.columns.is_empty() && !self.extra_columns.is_empty() {
            builder.push_str(", ");
        }
        builder.push_elems(&self.extra_columns, ", ");

        builder.push_str(" FROM ");
        self.table.build(builder);

        for join in &self.joins {
            builder.push_space();
            join.build(builder);
        }

        if !self.predicates.is_empty() {
            builder.push_str(" WHERE ");
            builder.push_elems(&self.predicates, " AND ");
        }
        if let Some(group_by) = &self.group_by {
            builder.push_str(" GROUP BY ");
            group_by.build(builder);
        }
        if let Some(having) = &self.having {
            builder.push_str(" HAVING ");
            having.build(builder);
        }

        if paged {
            if let Some(order_by) = &self.order_by {
                builder.push_str(" ORDER BY ");
                order_by.build(builder);
            }
            if let Some(limit) = &self.limit {
                builder.push_str(" LIMIT ");
                limit.build(builder);
            }
        }
    }
}

impl ExpressionBuilder for Select {
    fn build(&self, builder: &mut SQLBuilder) {
        self.build_body(builder, true);
    }
}

/// Counts the rows a select would produce without its ORDER BY and LIMIT clauses.
#[derive(Debug)]
pub struct Count<'a>(pub &'a Select);

impl ExpressionBuilder for Count<'_> {
    /// Build expression of the form `SELECT COUNT(*) AS "count" FROM (<select>) AS "derived"`
    fn build(&self, builder: &mut SQLBuilder) {
        builder.push_str("SELECT COUNT(*) AS ");
        builder.push_identifier("count");
        builder.push_str(" FROM (");
        self.0.build_body(builder, false);
        builder.push_str(") AS ");
        builder.push_identifier("derived");
    }
}
