// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use indexmap::IndexMap;
use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::value::{Object, Val};

/// Mapped results: in row order, or keyed by the requested index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Items {
    List(Vec<Object>),
    Indexed(IndexMap<Val, Object>),
}

impl Items {
    pub fn len(&self) -> usize {
        match self {
            Items::List(list) => list.len(),
            Items::Indexed(indexed) => indexed.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = &Object> + '_> {
        match self {
            Items::List(list) => Box::new(list.iter()),
            Items::Indexed(indexed) => Box::new(indexed.values()),
        }
    }

    /// The object keyed by `key`. Always `None` for a list.
    pub fn get(&self, key: &Val) -> Option<&Object> {
        match self {
            Items::List(_) => None,
            Items::Indexed(indexed) => indexed.get(key),
        }
    }

    pub fn into_list(self) -> Vec<Object> {
        match self {
            Items::List(list) => list,
            Items::Indexed(indexed) => indexed.into_values().collect(),
        }
    }
}

impl Serialize for Items {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Items::List(list) => list.serialize(serializer),
            Items::Indexed(indexed) => {
                let mut map = serializer.serialize_map(Some(indexed.len()))?;
                for (key, object) in indexed {
                    map.serialize_entry(&key.to_string(), object)?;
                }
                map.end()
            }
        }
    }
}

/// What [`super::Query::exec`] resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutput {
    Items(Items),
    /// Results along with the number of rows the query would return without its limit
    Counted { items: Items, total_count: i64 },
    /// Results went to the registered callbacks
    Streamed { total_count: Option<i64> },
}

impl QueryOutput {
    pub fn items(&self) -> Option<&Items> {
        match self {
            QueryOutput::Items(items) | QueryOutput::Counted { items, .. } => Some(items),
            QueryOutput::Streamed { .. } => None,
        }
    }

    pub fn into_items(self) -> Option<Items> {
        match self {
            QueryOutput::Items(items) | QueryOutput::Counted { items, .. } => Some(items),
            QueryOutput::Streamed { .. } => None,
        }
    }

    pub fn total_count(&self) -> Option<i64> {
        match self {
            QueryOutput::Items(_) => None,
            QueryOutput::Counted { total_count, .. } => Some(*total_count),
            QueryOutput::Streamed { total_count } => *total_count,
        }
    }
}

impl Serialize for QueryOutput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            QueryOutput::Items(items) => items.serialize(serializer),
            QueryOutput::Counted { items, total_count } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("items", items)?;
                map.serialize_entry("totalCount", total_count)?;
                map.end()
            }
            QueryOutput::Streamed { total_count: None } => serializer.serialize_bool(true),
            QueryOutput::Streamed {
                total_count: Some(total_count),
            } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("items", &true)?;
                map.serialize_entry("totalCount", total_count)?;
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use multiplatform_test::multiplatform_test;
    use serde_json::json;

    use super::*;

    #[multiplatform_test]
    fn serialized_shapes() {
        let mut indexed = IndexMap::new();
        indexed.insert(Val::from(7), Object::new("Order").with("id", 7));

        let counted = QueryOutput::Counted {
            items: Items::Indexed(indexed),
            total_count: 12,
        };
        assert_eq!(
            serde_json::to_value(&counted).unwrap(),
            json!({"items": {"7": {"id": 7}}, "totalCount": 12})
        );

        let streamed = QueryOutput::Streamed { total_count: None };
        assert_eq!(serde_json::to_value(&streamed).unwrap(), json!(true));
    }
}
