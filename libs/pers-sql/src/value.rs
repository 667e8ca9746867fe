// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Dynamic values flowing through queries: bound parameters, row cells, and the mapped object
//! graph.

use std::{
    fmt::Display,
    hash::{Hash, Hasher},
};

use bytes::Bytes;
use indexmap::IndexMap;
use serde::{
    Serialize, Serializer,
    ser::{SerializeMap, SerializeSeq},
};

/// A row as returned by a [`DatabaseConnector`](crate::DatabaseConnector), keyed by column
/// label (such as `#1.name`).
pub type Row = IndexMap<String, Val>;

#[derive(Clone, Copy, Debug)]
pub enum ValNumber {
    I32(i32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl ValNumber {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ValNumber::F32(n) => Some(*n as f64),
            ValNumber::F64(n) => Some(*n),
            ValNumber::I32(n) => Some(*n as f64),
            ValNumber::I64(n) => Some(*n as f64),
            ValNumber::U64(n) => Some(*n as f64),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ValNumber::I32(n) => Some(*n as i64),
            ValNumber::I64(n) => Some(*n),
            ValNumber::U64(n) => i64::try_from(*n).ok(),
            ValNumber::F32(_) => None,
            ValNumber::F64(_) => None,
        }
    }

    /// Integers compare across widths; floats compare by bit pattern so that numbers can key
    /// hash maps.
    fn key(&self) -> NumberKey {
        match self {
            ValNumber::I32(n) => NumberKey::Integer(*n as i128),
            ValNumber::I64(n) => NumberKey::Integer(*n as i128),
            ValNumber::U64(n) => NumberKey::Integer(*n as i128),
            ValNumber::F32(n) => NumberKey::Float((*n as f64).to_bits()),
            ValNumber::F64(n) => NumberKey::Float(n.to_bits()),
        }
    }
}

#[derive(PartialEq, Eq, Hash)]
enum NumberKey {
    Integer(i128),
    Float(u64),
}

impl PartialEq for ValNumber {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ValNumber {}

impl Hash for ValNumber {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state)
    }
}

impl Display for ValNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValNumber::I32(n) => write!(f, "{n}"),
            ValNumber::I64(n) => write!(f, "{n}"),
            ValNumber::U64(n) => write!(f, "{n}"),
            ValNumber::F32(n) => write!(f, "{n}"),
            ValNumber::F64(n) => write!(f, "{n}"),
        }
    }
}

impl Serialize for ValNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ValNumber::I32(n) => serializer.serialize_i32(*n),
            ValNumber::I64(n) => serializer.serialize_i64(*n),
            ValNumber::U64(n) => serializer.serialize_u64(*n),
            ValNumber::F32(n) => serializer.serialize_f32(*n),
            ValNumber::F64(n) => serializer.serialize_f64(*n),
        }
    }
}

impl TryFrom<serde_json::Number> for ValNumber {
    type Error = ();

    fn try_from(value: serde_json::Number) -> Result<Self, Self::Error> {
        if let Some(n) = value.as_i64() {
            Ok(ValNumber::I64(n))
        } else if let Some(n) = value.as_u64() {
            Ok(ValNumber::U64(n))
        } else if let Some(n) = value.as_f64() {
            Ok(ValNumber::F64(n))
        } else {
            Err(())
        }
    }
}

/// A value in a query parameter list, a fetched row, or a mapped object graph.
///
/// `List` holds the members of a toMany relation, `Map` holds them when the child query is
/// indexed, and `Object` holds a bridged (one-to-one) relation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Val {
    #[default]
    Null,
    Bool(bool),
    Number(ValNumber),
    String(String),
    Binary(Bytes),
    List(Vec<Val>),
    Map(IndexMap<Val, Val>),
    Object(Object),
}

pub const TRUE: Val = Val::Bool(true);
pub const FALSE: Val = Val::Bool(false);

impl Val {
    pub fn is_null(&self) -> bool {
        matches!(self, Val::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Val::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Val::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Val::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Val::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Val::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Val]> {
        match self {
            Val::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<Val, Val>> {
        match self {
            Val::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Field lookup on an object value
    pub fn get(&self, key: &str) -> Option<&Val> {
        self.as_object().and_then(|o| o.get(key))
    }
}

// Maps and objects compare without regard to field order, so only their sizes take part in
// the hash.
impl Hash for Val {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Val::Null => {}
            Val::Bool(b) => b.hash(state),
            Val::Number(n) => n.hash(state),
            Val::String(s) => s.hash(state),
            Val::Binary(b) => b.hash(state),
            Val::List(l) => l.hash(state),
            Val::Map(m) => m.len().hash(state),
            Val::Object(o) => {
                o.entity.hash(state);
                o.fields.len().hash(state);
            }
        }
    }
}

impl Display for Val {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Val::Null => write!(f, "null"),
            Val::Bool(b) => write!(f, "{b}"),
            Val::Number(n) => write!(f, "{n}"),
            Val::String(s) => write!(f, "\"{s}\""),
            Val::Binary(b) => write!(f, "<{} bytes>", b.len()),
            Val::List(l) => {
                write!(f, "[")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Val::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Val::Object(o) => write!(f, "{o}"),
        }
    }
}

impl Serialize for Val {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Val::Null => serializer.serialize_unit(),
            Val::Bool(b) => serializer.serialize_bool(*b),
            Val::Number(n) => n.serialize(serializer),
            Val::String(s) => serializer.serialize_str(s),
            Val::Binary(b) => serializer.serialize_bytes(b),
            Val::List(l) => {
                let mut seq = serializer.serialize_seq(Some(l.len()))?;
                for v in l {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            Val::Map(m) => {
                let mut map = serializer.serialize_map(Some(m.len()))?;
                for (k, v) in m {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Val::Object(o) => o.serialize(serializer),
        }
    }
}

impl From<serde_json::Value> for Val {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Val::Null,
            serde_json::Value::Bool(b) => Val::Bool(b),
            serde_json::Value::Number(n) => n.try_into().map(Val::Number).unwrap_or(Val::Null),
            serde_json::Value::String(s) => Val::String(s),
            serde_json::Value::Array(a) => Val::List(a.into_iter().map(Val::from).collect()),
            serde_json::Value::Object(o) => Val::Map(
                o.into_iter()
                    .map(|(k, v)| (Val::String(k), Val::from(v)))
                    .collect(),
            ),
        }
    }
}

impl TryFrom<Val> for serde_json::Value {
    type Error = serde_json::Error;

    fn try_from(value: Val) -> Result<Self, Self::Error> {
        serde_json::to_value(value)
    }
}

impl From<bool> for Val {
    fn from(value: bool) -> Self {
        Val::Bool(value)
    }
}

impl From<i32> for Val {
    fn from(value: i32) -> Self {
        Val::Number(ValNumber::I32(value))
    }
}

impl From<i64> for Val {
    fn from(value: i64) -> Self {
        Val::Number(ValNumber::I64(value))
    }
}

impl From<u64> for Val {
    fn from(value: u64) -> Self {
        Val::Number(ValNumber::U64(value))
    }
}

impl From<f32> for Val {
    fn from(value: f32) -> Self {
        Val::Number(ValNumber::F32(value))
    }
}

impl From<f64> for Val {
    fn from(value: f64) -> Self {
        Val::Number(ValNumber::F64(value))
    }
}

impl From<&str> for Val {
    fn from(value: &str) -> Self {
        Val::String(value.to_string())
    }
}

impl From<String> for Val {
    fn from(value: String) -> Self {
        Val::String(value)
    }
}

impl From<Bytes> for Val {
    fn from(value: Bytes) -> Self {
        Val::Binary(value)
    }
}

impl From<Vec<Val>> for Val {
    fn from(value: Vec<Val>) -> Self {
        Val::List(value)
    }
}

impl From<Object> for Val {
    fn from(value: Object) -> Self {
        Val::Object(value)
    }
}

impl<T: Into<Val>> From<Option<T>> for Val {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Val::Null)
    }
}

/// A mapped entity instance: the entity it was created for and its fields in selection order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Object {
    entity: String,
    fields: IndexMap<String, Val>,
}

impl Object {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            fields: IndexMap::new(),
        }
    }

    /// Builder-style insert, mostly useful when preparing objects to save
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Val>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn get(&self, field: &str) -> Option<&Val> {
        self.fields.get(field)
    }

    /// Follow a dotted path through nested objects, such as `customer.address.city`.
    pub fn get_path(&self, path: &str) -> Option<&Val> {
        let mut parts = path.split('.');
        let first = self.get(parts.next()?)?;
        parts.try_fold(first, |current, part| current.get(part))
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Val>) -> Option<Val> {
        self.fields.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<Val> {
        self.fields.shift_remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut Val> {
        self.fields.get_mut(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Val)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl IntoIterator for Object {
    type Item = (String, Val);
    type IntoIter = indexmap::map::IntoIter<String, Val>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl Display for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {{", self.entity)?;
        for (i, (k, v)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, " {k}: {v}")?;
        }
        write!(f, " }}")
    }
}

impl Serialize for Object {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use multiplatform_test::multiplatform_test;

    use super::*;

    #[multiplatform_test]
    fn integers_of_different_widths_are_the_same_key() {
        let keys: HashSet<Val> = [Val::from(1), Val::from(1i64), Val::from(1u64)]
            .into_iter()
            .collect();

        assert_eq!(keys.len(), 1);
        assert_ne!(Val::from(1), Val::from(1.0));
    }

    #[multiplatform_test]
    fn nested_path_lookup() {
        let address = Object::new("Address").with("city", "Paris");
        let customer = Object::new("Customer")
            .with("name", "Ada")
            .with("address", address);
        let order = Object::new("Order").with("customer", customer);

        assert_eq!(
            order.get_path("customer.address.city"),
            Some(&Val::from("Paris"))
        );
        assert_eq!(order.get_path("customer.name.first"), None);
        assert_eq!(order.get_path("missing"), None);
    }

    #[multiplatform_test]
    fn remove_keeps_field_order() {
        let mut object = Object::new("Order")
            .with("id", 1)
            .with("customerId", 2)
            .with("dateTime", "2024-01-01");
        object.remove("id");

        assert_eq!(object.keys().collect::<Vec<_>>(), vec!["customerId", "dateTime"]);
    }

    #[multiplatform_test]
    fn serializes_graph_as_json() {
        let mut items = IndexMap::new();
        items.insert(Val::from(7), Val::from(Object::new("Item").with("qty", 2)));

        let order = Object::new("Order")
            .with("id", 1)
            .with("customer", Val::Null)
            .with("items", Val::Map(items))
            .with("tags", vec![Val::from("a")]);

        let json: serde_json::Value = Val::from(order).try_into().unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 1,
                "customer": null,
                "items": { "7": { "qty": 2 } },
                "tags": ["a"]
            })
        );
    }

    #[multiplatform_test]
    fn from_json() {
        let val = Val::from(serde_json::json!({"a": [1, "x", null]}));
        let expected = Val::Map(IndexMap::from([(
            Val::from("a"),
            Val::List(vec![Val::from(1i64), Val::from("x"), Val::Null]),
        )]));

        assert_eq!(val, expected);
    }
}
