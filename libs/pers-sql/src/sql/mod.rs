// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Lower level SQL primitives. Each statement part implements [`ExpressionBuilder`] and
//! renders itself, with `?` placeholders, into an [`SQLBuilder`].

#[macro_use]
#[cfg(test)]
mod test_util;

mod connector;
mod expression_builder;
mod sql_builder;

pub(crate) mod column;
pub(crate) mod delete;
pub(crate) mod insert;
pub(crate) mod join;
pub mod placeholder;
pub(crate) mod predicate;
pub(crate) mod select;
pub(crate) mod table;
pub(crate) mod update;

pub use connector::{DatabaseConnector, EscapeStyle, ExecuteResult, RowSink};
pub use expression_builder::ExpressionBuilder;
pub use sql_builder::SQLBuilder;
