// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use thiserror::Error;

use crate::database_error::DatabaseError;

/// A problem with a single field expression or DSL clause. These accumulate while a query is
/// built and are reported together through [`BuildError`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Field '{field}' cannot be resolved in the table '{entity}'.")]
    UnresolvedField { field: String, entity: String },

    #[error("'{expression}' represents a table, so you must specify some fields to be used in the query.")]
    TableValuedTerminal { expression: String },

    #[error("* symbol is not valid outside of select or selectWith sections.")]
    WildcardOutsideSelect,

    #[error("Negation symbol ! is not valid outside of select or selectWith sections.")]
    NegationOutsideSelect,

    #[error("toMany expressions are not allowed outside the select expressions: '{expression}'")]
    ToManyOutsideSelect { expression: String },

    #[error("Found an empty field in the field list: '{field_list}'")]
    EmptyField { field_list: String },

    #[error("Bridge field '{field}' in table '{entity}' creates a name collision.")]
    BridgeNameCollision { field: String, entity: String },

    #[error("No entity named '{0}' is defined.")]
    UnknownEntity(String),

    #[error("From table is already set.")]
    FromAlreadySet,

    #[error("No from table is set.")]
    MissingFrom,

    #[error("{values} values were supplied for {placeholders} placeholders in '{expression}'")]
    PlaceholderMismatch {
        expression: String,
        placeholders: usize,
        values: usize,
    },

    #[error("'{expression}' is a simple field and cannot be part of a toMany expression.")]
    SimpleFieldInToManyPath { expression: String },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
}

/// Every resolution error collected during one `build()`.
#[derive(Error, Debug, Clone, Default, PartialEq, Eq)]
#[error("{}", join_messages(.errors))]
pub struct BuildError {
    pub errors: Vec<ResolutionError>,
}

fn join_messages(errors: &[ResolutionError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

impl From<ResolutionError> for BuildError {
    fn from(error: ResolutionError) -> Self {
        BuildError {
            errors: vec![error],
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    #[error(
        "'{expression}' does not resolve to a toMany field. Last item in a toMany expression must be a toMany field but '{last}' is not."
    )]
    NotToMany { expression: String, last: String },

    #[error("Streaming queries may not have toMany fields.")]
    StreamingWithToMany,

    #[error("A toMany query runs as part of the query it belongs to; call exec on that query.")]
    ChildExec,

    #[error("Can't {operation} without the primary key set.")]
    MissingPrimaryKey { operation: &'static str },

    #[error("Can't save: no fields on the object are set.")]
    NothingToSave,
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error(transparent)]
    Execution(#[from] DatabaseError),
}
