// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::query_error::ResolutionError;

use super::{Discriminator, Entity, Property, Schema};

#[derive(Debug, Default)]
pub struct SchemaBuilder {
    entities: Vec<EntityBuilder>,
}

impl SchemaBuilder {
    pub fn entity(mut self, entity: EntityBuilder) -> Self {
        self.entities.push(entity);
        self
    }

    /// Assemble the schema, checking that every relation points at an existing entity and
    /// column. Reports the first problem found.
    pub fn build(self) -> Result<Schema, ResolutionError> {
        let mut entities = HashMap::new();

        for builder in self.entities {
            if let Some(error) = builder.errors.into_iter().next() {
                return Err(error);
            }
            let entity = builder.entity;
            if entities.contains_key(&entity.name) {
                return Err(ResolutionError::InvalidSchema(format!(
                    "An entity with the name '{}' is already defined.",
                    entity.name
                )));
            }
            entities.insert(entity.name.clone(), entity);
        }

        for entity in entities.values() {
            validate(entity, &entities)?;
        }

        Ok(Schema { entities })
    }
}

fn validate(entity: &Entity, entities: &HashMap<String, Entity>) -> Result<(), ResolutionError> {
    let invalid = |message: String| Err(ResolutionError::InvalidSchema(message));

    if !entity.has_column(&entity.primary_key) {
        return invalid(format!(
            "Primary key '{}' is not a column of '{}'.",
            entity.primary_key, entity.name
        ));
    }

    if let Some(discriminator) = &entity.discriminator
        && !entity.has_column(&discriminator.column)
    {
        return invalid(format!(
            "Discriminator '{}' is not a column of '{}'.",
            discriminator.column, entity.name
        ));
    }

    for property in entity.properties.values() {
        match property {
            Property::Column { .. } => {}
            Property::Bridge {
                bound_fk, target, ..
            } => {
                if !entity.has_column(bound_fk) {
                    return invalid(format!(
                        "No field with the name '{bound_fk}' exists in table '{}'.",
                        entity.table
                    ));
                }
                if !entities.contains_key(target) {
                    return Err(ResolutionError::UnknownEntity(target.clone()));
                }
            }
            Property::ToMany {
                target,
                fk_on_target,
                ..
            } => match entities.get(target) {
                Some(target) if target.has_column(fk_on_target) => {}
                Some(target) => {
                    return invalid(format!(
                        "No column with the name '{fk_on_target}' in the table '{}' is found.",
                        target.table
                    ));
                }
                None => return Err(ResolutionError::UnknownEntity(target.clone())),
            },
        }
    }

    Ok(())
}

/// Declares one entity. The table defaults to the entity name and the primary key to `id`.
#[derive(Debug)]
pub struct EntityBuilder {
    entity: Entity,
    errors: Vec<ResolutionError>,
}

impl EntityBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            entity: Entity {
                table: name.clone(),
                name,
                primary_key: "id".to_string(),
                properties: IndexMap::new(),
                discriminator: None,
            },
            errors: vec![],
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.entity.table = table.into();
        self
    }

    pub fn primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.entity.primary_key = primary_key.into();
        self
    }

    pub fn column(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.add(Property::Column { name });
        self
    }

    pub fn columns<S: Into<String>>(self, names: impl IntoIterator<Item = S>) -> Self {
        names.into_iter().fold(self, |builder, name| builder.column(name))
    }

    pub fn bridge(
        mut self,
        name: impl Into<String>,
        bound_fk: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        let name = name.into();
        if self.entity.properties.contains_key(&name) {
            self.errors.push(ResolutionError::BridgeNameCollision {
                field: name,
                entity: self.entity.table.clone(),
            });
        } else {
            self.add(Property::Bridge {
                name,
                bound_fk: bound_fk.into(),
                target: target.into(),
            });
        }
        self
    }

    pub fn to_many(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        fk_on_target: impl Into<String>,
    ) -> Self {
        self.add(Property::ToMany {
            name: name.into(),
            target: target.into(),
            fk_on_target: fk_on_target.into(),
        });
        self
    }

    pub fn discriminator(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.entity.discriminator = Some(Discriminator {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    fn add(&mut self, property: Property) {
        let name = property.name().to_string();
        if self.entity.properties.contains_key(&name) {
            self.errors.push(ResolutionError::InvalidSchema(format!(
                "There is already a field named '{name}' in the entity '{}'.",
                self.entity.name
            )));
        } else {
            self.entity.properties.insert(name, property);
        }
    }
}

#[cfg(test)]
mod tests {
    use multiplatform_test::multiplatform_test;

    use crate::schema::EntitySchema;

    use super::*;

    fn customer() -> EntityBuilder {
        EntityBuilder::new("Customer").columns(["id", "name"])
    }

    #[multiplatform_test]
    fn builds_relations() {
        let schema = Schema::builder()
            .entity(customer().to_many("orders", "Order", "customerId"))
            .entity(
                EntityBuilder::new("Order")
                    .columns(["id", "customerId"])
                    .bridge("customer", "customerId", "Customer"),
            )
            .build()
            .unwrap();

        let order = schema.entity("Order").unwrap();
        assert_eq!(order.columns().collect::<Vec<_>>(), vec!["id", "customerId"]);
        assert!(matches!(
            order.property("customer"),
            Some(Property::Bridge { target, .. }) if target == "Customer"
        ));
    }

    #[multiplatform_test]
    fn bridge_name_collision() {
        let result = Schema::builder()
            .entity(customer())
            .entity(
                EntityBuilder::new("Order")
                    .columns(["id", "customer"])
                    .bridge("customer", "customer", "Customer"),
            )
            .build();

        assert_eq!(
            result.unwrap_err().to_string(),
            "Bridge field 'customer' in table 'Order' creates a name collision."
        );
    }

    #[multiplatform_test]
    fn unknown_target() {
        let result = Schema::builder()
            .entity(customer().to_many("orders", "Order", "customerId"))
            .build();

        assert_eq!(
            result.unwrap_err(),
            ResolutionError::UnknownEntity("Order".into())
        );
    }

    #[multiplatform_test]
    fn to_many_fk_must_exist_on_target() {
        let result = Schema::builder()
            .entity(customer().to_many("orders", "Order", "buyerId"))
            .entity(EntityBuilder::new("Order").columns(["id", "customerId"]))
            .build();

        assert!(matches!(result, Err(ResolutionError::InvalidSchema(_))));
    }

    #[multiplatform_test]
    fn primary_key_must_be_a_column() {
        let result = Schema::builder()
            .entity(EntityBuilder::new("Tag").column("label"))
            .build();

        assert!(matches!(result, Err(ResolutionError::InvalidSchema(_))));
    }
}
