// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Entity metadata consumed by the query compiler.
//!
//! Schema introspection lives outside this crate. Anything that can answer "what does the
//! entity named X look like" implements [`EntitySchema`]; [`Schema`] is a ready-made
//! implementation assembled through [`SchemaBuilder`].

mod builder;
#[cfg(test)]
pub(crate) mod test_helper;

use std::collections::HashMap;

use indexmap::IndexMap;

pub use builder::{EntityBuilder, SchemaBuilder};

pub trait EntitySchema: Send + Sync {
    fn entity(&self, name: &str) -> Option<&Entity>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub name: String,
    /// Physical table. Differs from `name` only for single-table-inheritance subtypes.
    pub table: String,
    pub primary_key: String,
    pub properties: IndexMap<String, Property>,
    pub discriminator: Option<Discriminator>,
}

impl Entity {
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    /// Names of the plain (non-relationship) properties in declaration order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.properties.values().filter_map(|property| match property {
            Property::Column { name } => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn has_column(&self, name: &str) -> bool {
        matches!(self.property(name), Some(Property::Column { .. }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Property {
    Column {
        name: String,
    },
    /// A one-to-one relation through `bound_fk`, a column of the owning entity that refers to
    /// the primary key of `target`.
    Bridge {
        name: String,
        bound_fk: String,
        target: String,
    },
    /// A one-to-many relation: rows of `target` whose `fk_on_target` equals the owner's
    /// primary key.
    ToMany {
        name: String,
        target: String,
        fk_on_target: String,
    },
}

impl Property {
    pub fn name(&self) -> &str {
        match self {
            Property::Column { name }
            | Property::Bridge { name, .. }
            | Property::ToMany { name, .. } => name,
        }
    }
}

/// Marks a single-table-inheritance subtype: rows of the shared table whose `column` holds
/// `value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discriminator {
    pub column: String,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    entities: HashMap<String, Entity>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }
}

impl EntitySchema for Schema {
    fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }
}
