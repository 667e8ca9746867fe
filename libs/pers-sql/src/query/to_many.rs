// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::{
    query_error::{QueryError, ResolutionError, UsageError},
    schema::Property,
};

use super::{MountPoint, Query, resolver::join_path};

impl Query {
    /// The child query for the toMany relation that `path` ends in, such as `orders` or
    /// `customer.orders.items`. The path is relative to this query: bridges along it stay
    /// joins of this query, and each toMany property hands the rest of the path to its child.
    ///
    /// Children are created on first use, so repeated calls return the same query and clauses
    /// given to it accumulate.
    pub fn to_many(&mut self, path: &str) -> Result<&mut Query, QueryError> {
        let parts: Vec<&str> = path.split('.').map(str::trim).collect();
        self.to_many_parts(path, &parts)
    }

    fn to_many_parts(
        &mut self,
        expression: &str,
        parts: &[&str],
    ) -> Result<&mut Query, QueryError> {
        let schema = self.schema.clone();
        let from = self.dsl.from.clone().ok_or(ResolutionError::MissingFrom)?;
        let mut entity = schema
            .entity(&from)
            .ok_or_else(|| ResolutionError::UnknownEntity(from.clone()))?;
        let mut owner_path = String::new();

        for (index, part) in parts.iter().enumerate() {
            match entity.property(part) {
                Some(Property::Bridge { name, target, .. }) => {
                    entity = schema
                        .entity(target)
                        .ok_or_else(|| ResolutionError::UnknownEntity(target.clone()))?;
                    owner_path = join_path(&owner_path, name);
                }
                Some(Property::ToMany {
                    name,
                    target,
                    fk_on_target,
                }) => {
                    // The owner's key is what the child is filtered by
                    if !self.dsl.relation_paths.contains(&owner_path) {
                        self.dsl_mut().relation_paths.push(owner_path.clone());
                    }

                    let mount = MountPoint {
                        owner_path,
                        property: name.clone(),
                    };
                    let child = self.child_for(mount, target, fk_on_target);

                    let rest = &parts[index + 1..];
                    return if rest.is_empty() {
                        Ok(child)
                    } else {
                        child.to_many_parts(expression, rest)
                    };
                }
                Some(Property::Column { .. }) => {
                    return Err(ResolutionError::SimpleFieldInToManyPath {
                        expression: expression.to_string(),
                    }
                    .into());
                }
                None => {
                    return Err(ResolutionError::UnresolvedField {
                        field: part.to_string(),
                        entity: entity.name.clone(),
                    }
                    .into());
                }
            }
        }

        Err(UsageError::NotToMany {
            expression: expression.to_string(),
            last: parts.last().copied().unwrap_or_default().to_string(),
        }
        .into())
    }
}
