// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! A query compiler for entity graphs described by dotted field expressions.
//!
//! Clauses of a [`Query`] name fields by path from the query's root entity (`customer.name`,
//! `items.product.price`), either directly in a select list or inside `{...}` in free-form SQL
//! fragments. Building the query resolves each path against an [`EntitySchema`], turning
//! one-to-one hops into LEFT JOINs with short aliases (`#0`, `#1`, ...) and one-to-many hops
//! into child queries. Executing it runs the SQL through a [`DatabaseConnector`] and maps the
//! flat rows back into nested [`Object`]s.
//!
//! The crate doesn't talk to any database by itself. Connectors translate the `?` placeholder
//! SQL into their own dialect; [`connect::postgres`] (feature `postgres`) is one for
//! PostgreSQL.

#[macro_use]
mod sql;

mod mapper;

pub mod config;
pub mod connect;
pub mod database_error;
pub mod logging;
pub mod query;
pub mod query_error;
pub mod schema;
pub mod session;
pub mod value;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

/// Public types at the root level of this crate
pub use config::{
    AffixKind, EnvError, Environment, FieldAffix, MapEnvironment, QueryConfig, SystemEnvironment,
};
pub use database_error::{DatabaseError, WithContext};
pub use query::{CompiledQuery, IndexFn, Items, Param, Query, QueryOutput};
pub use query_error::{BuildError, QueryError, ResolutionError, UsageError};
pub use schema::{
    Discriminator, Entity, EntityBuilder, EntitySchema, Property, Schema, SchemaBuilder,
};
pub use session::{DeleteStatus, SaveCommand, SaveResult, SaveStatus, Session};
pub use sql::{DatabaseConnector, EscapeStyle, ExecuteResult, RowSink, placeholder};
pub use value::{Object, Row, Val, ValNumber};
