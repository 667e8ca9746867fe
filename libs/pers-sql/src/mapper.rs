// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Turns flat result rows back into object graphs.
//!
//! Every selected column is labelled `<alias>.<field>`. The mapper creates one object per
//! materialized alias, routes each value to the object of its alias, and then attaches the
//! objects to each other bottom-up: bridged objects under their owning property, and toMany
//! children (fetched by separate queries) from their grouped results.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::{
    query::{IndexFn, Items, MountPoint},
    value::{Object, Row, Val},
};

/// Where an alias's object is attached: under `property` of the object of `parent_alias`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Attachment {
    pub parent_alias: String,
    pub property: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AliasPlan {
    pub alias: String,
    pub entity: String,
    pub primary_key: String,
    /// `None` for the root
    pub attachment: Option<Attachment>,
    /// The primary key was selected only to tell a missing relation from an empty one
    pub strip_primary_key: bool,
}

/// A toMany child result attached to each object of `owner_alias`, looked up by the owner's
/// key (selected under `key_label`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MountPlan {
    pub mount: MountPoint,
    pub owner_alias: String,
    pub key_label: String,
    pub property: String,
}

#[derive(Clone)]
pub(crate) enum IndexTarget {
    /// A selected column, by its label
    Label(String),
    Computed(IndexFn),
}

/// Everything the mapper needs to know about a compiled query
#[derive(Clone, Default)]
pub(crate) struct MappingPlan {
    /// In materialization order: an alias always comes after the alias it is attached to
    pub aliases: Vec<AliasPlan>,
    pub mounts: Vec<MountPlan>,
    pub index: Option<IndexTarget>,
}

impl MappingPlan {
    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }
}

/// A child query's mapped results, keyed by the foreign key value that ties each to its
/// owner. Values are lists, or maps if the child is indexed.
#[derive(Debug, Default)]
pub(crate) struct Group {
    pub indexed: bool,
    pub by_key: HashMap<Val, Val>,
}

impl Group {
    pub fn new(indexed: bool) -> Self {
        Self {
            indexed,
            by_key: HashMap::new(),
        }
    }

    pub fn add(&mut self, key: Val, object: Object, index: Option<Val>) {
        let indexed = self.indexed;
        let entry = self.by_key.entry(key).or_insert_with(|| empty_collection(indexed));

        match (entry, index) {
            (Val::Map(map), Some(index)) => {
                map.insert(index, Val::Object(object));
            }
            (Val::List(list), _) => list.push(Val::Object(object)),
            _ => {}
        }
    }

    fn get(&self, key: &Val) -> Val {
        self.by_key
            .get(key)
            .cloned()
            .unwrap_or_else(|| empty_collection(self.indexed))
    }
}

fn empty_collection(indexed: bool) -> Val {
    if indexed {
        Val::Map(IndexMap::new())
    } else {
        Val::List(vec![])
    }
}

pub(crate) struct ResultMapper<'a> {
    plan: &'a MappingPlan,
    /// Results of the child queries that ran
    groups: IndexMap<MountPoint, Group>,
}

impl<'a> ResultMapper<'a> {
    pub fn new(plan: &'a MappingPlan, groups: IndexMap<MountPoint, Group>) -> Self {
        Self { plan, groups }
    }

    /// Map one row to its root object, along with the row's index key if indexed.
    pub fn map_row(&self, row: Row) -> (Object, Option<Val>) {
        let mut objects: IndexMap<&str, Object> = self
            .plan
            .aliases
            .iter()
            .map(|alias| (alias.alias.as_str(), Object::new(&alias.entity)))
            .collect();

        let index = match &self.plan.index {
            Some(IndexTarget::Label(label)) => Some(row.get(label).cloned().unwrap_or_default()),
            _ => None,
        };

        let mount_keys: Vec<Val> = self
            .plan
            .mounts
            .iter()
            .map(|mount| row.get(&mount.key_label).cloned().unwrap_or_default())
            .collect();

        for (label, value) in row {
            match label.split_once('.') {
                Some((alias, field)) if objects.contains_key(alias) => {
                    if let Some(object) = objects.get_mut(alias) {
                        object.insert(field, value);
                    }
                }
                // Caller-written select expressions carry their own labels
                _ => {
                    if let Some(root) = objects.get_index_mut(0).map(|(_, root)| root) {
                        root.insert(&label, value);
                    }
                }
            }
        }

        for alias in self.plan.aliases.iter().rev() {
            let Some(mut object) = objects.shift_remove(alias.alias.as_str()) else {
                continue;
            };

            for (position, mount) in self.plan.mounts.iter().enumerate() {
                if mount.owner_alias != alias.alias {
                    continue;
                }
                let children = match self.groups.get(&mount.mount) {
                    Some(group) => group.get(&mount_keys[position]),
                    None => empty_collection(false),
                };
                object.insert(&mount.property, children);
            }

            let present = object
                .get(&alias.primary_key)
                .is_some_and(|key| !key.is_null());
            if alias.strip_primary_key {
                object.remove(&alias.primary_key);
            }

            match &alias.attachment {
                Some(attachment) => {
                    if let Some(parent) = objects.get_mut(attachment.parent_alias.as_str()) {
                        let value = if present { Val::Object(object) } else { Val::Null };
                        parent.insert(&attachment.property, value);
                    }
                }
                None => {
                    let index = match &self.plan.index {
                        Some(IndexTarget::Computed(key)) => Some(key(&object)),
                        _ => index,
                    };
                    return (object, index);
                }
            }
        }

        // Unreachable for plans that have a root alias
        (Object::default(), index)
    }

    /// Map every row, keyed by index if the plan asks for it
    pub fn map_rows(&self, rows: Vec<Row>) -> Items {
        if self.plan.is_indexed() {
            let mut indexed = IndexMap::new();
            for row in rows {
                let (object, index) = self.map_row(row);
                indexed.insert(index.unwrap_or_default(), object);
            }
            Items::Indexed(indexed)
        } else {
            Items::List(rows.into_iter().map(|row| self.map_row(row).0).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use multiplatform_test::multiplatform_test;

    use crate::testing::row;

    use super::*;

    fn order_plan(strip_customer_key: bool) -> MappingPlan {
        MappingPlan {
            aliases: vec![
                AliasPlan {
                    alias: "#0".into(),
                    entity: "Order".into(),
                    primary_key: "id".into(),
                    attachment: None,
                    strip_primary_key: false,
                },
                AliasPlan {
                    alias: "#1".into(),
                    entity: "Customer".into(),
                    primary_key: "id".into(),
                    attachment: Some(Attachment {
                        parent_alias: "#0".into(),
                        property: "customer".into(),
                    }),
                    strip_primary_key: strip_customer_key,
                },
                AliasPlan {
                    alias: "#2".into(),
                    entity: "Address".into(),
                    primary_key: "id".into(),
                    attachment: Some(Attachment {
                        parent_alias: "#1".into(),
                        property: "address".into(),
                    }),
                    strip_primary_key: true,
                },
            ],
            mounts: vec![],
            index: None,
        }
    }

    #[multiplatform_test]
    fn nested_bridges() {
        let plan = order_plan(true);
        let mapper = ResultMapper::new(&plan, IndexMap::new());

        let (order, index) = mapper.map_row(row([
            ("#0.id", 1.into()),
            ("#1.name", "Alice".into()),
            ("#1.id", 7.into()),
            ("#2.city", "Oslo".into()),
            ("#2.id", 3.into()),
        ]));

        assert_eq!(index, None);
        assert_eq!(order.entity(), "Order");
        assert_eq!(order.get("id"), Some(&Val::from(1)));

        let customer = order.get("customer").and_then(Val::as_object).unwrap();
        assert_eq!(customer.get("name"), Some(&Val::from("Alice")));
        assert!(!customer.contains("id"));
        assert_eq!(
            customer.get_path("address.city"),
            Some(&Val::from("Oslo"))
        );
    }

    #[multiplatform_test]
    fn missing_relation_is_null() {
        let plan = order_plan(false);
        let mapper = ResultMapper::new(&plan, IndexMap::new());

        let (order, _) = mapper.map_row(row([
            ("#0.id", 1.into()),
            ("#1.name", Val::Null),
            ("#1.id", Val::Null),
            ("#2.id", Val::Null),
        ]));

        assert_eq!(order.get("customer"), Some(&Val::Null));
    }

    #[multiplatform_test]
    fn unknown_labels_go_to_root() {
        let plan = order_plan(false);
        let mapper = ResultMapper::new(&plan, IndexMap::new());

        let (order, _) = mapper.map_row(row([("#0.id", 1.into()), ("itemCount", 4.into())]));

        assert_eq!(order.get("itemCount"), Some(&Val::from(4)));
    }

    #[multiplatform_test]
    fn child_groups_by_owner_key() {
        let items = MountPoint {
            owner_path: String::new(),
            property: "items".into(),
        };
        let plan = MappingPlan {
            mounts: vec![MountPlan {
                mount: items.clone(),
                owner_alias: "#0".into(),
                key_label: "#0.id".into(),
                property: "items".into(),
            }],
            ..order_plan(false)
        };

        let mut group = Group::new(false);
        group.add(1.into(), Object::new("OrderItem").with("quantity", 2), None);
        group.add(1.into(), Object::new("OrderItem").with("quantity", 5), None);

        let mapper = ResultMapper::new(&plan, IndexMap::from([(items, group)]));
        let (first, _) = mapper.map_row(row([("#0.id", 1.into())]));
        let (second, _) = mapper.map_row(row([("#0.id", 2.into())]));

        assert_eq!(first.get("items").and_then(Val::as_list).map(<[_]>::len), Some(2));
        assert_eq!(second.get("items"), Some(&Val::List(vec![])));
    }

    #[multiplatform_test]
    fn indexed_rows() {
        let plan = MappingPlan {
            index: Some(IndexTarget::Label("#0.id".into())),
            ..order_plan(false)
        };
        let mapper = ResultMapper::new(&plan, IndexMap::new());

        let items = mapper.map_rows(vec![
            row([("#0.id", 3.into())]),
            row([("#0.id", 1.into())]),
        ]);

        let Items::Indexed(indexed) = items else {
            panic!("expected indexed items");
        };
        assert_eq!(
            indexed.keys().cloned().collect::<Vec<_>>(),
            vec![Val::from(3), Val::from(1)]
        );
    }
}
