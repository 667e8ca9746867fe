// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::value::Val;

use super::{DatabaseConnector, SQLBuilder};

/// Statement parts that render themselves, with their parameters, into an [`SQLBuilder`].
/// Statements are built by nesting parts: a select builds its columns, joins and predicates.
pub trait ExpressionBuilder {
    /// Build the SQL expression into the given SQL builder
    fn build(&self, builder: &mut SQLBuilder);

    /// Build the SQL expression into a string and its parameters, quoting identifiers the way
    /// `connector` expects.
    fn to_sql(&self, connector: &dyn DatabaseConnector) -> (String, Vec<Val>)
    where
        Self: Sized,
    {
        let mut builder = SQLBuilder::new(connector);
        self.build(&mut builder);
        builder.into_sql()
    }
}
