// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::value::Val;

use super::{DatabaseConnector, ExpressionBuilder};

pub struct SQLBuilder<'a> {
    /// The SQL being built with a `?` placeholder for each parameter
    sql: String,
    /// The list of parameters, in placeholder order
    params: Vec<Val>,
    /// Quotes identifiers in the connector's dialect
    connector: &'a dyn DatabaseConnector,
}

impl<'a> SQLBuilder<'a> {
    pub fn new(connector: &'a dyn DatabaseConnector) -> Self {
        Self {
            sql: String::new(),
            params: Vec::new(),
            connector,
        }
    }

    /// Push a string
    pub fn push_str<T: AsRef<str>>(&mut self, s: T) {
        self.sql.push_str(s.as_ref());
    }

    /// Push a character
    pub fn push(&mut self, c: char) {
        self.sql.push(c);
    }

    /// Push an identifier (table, alias, or column name) escaped by the connector
    pub fn push_identifier<T: AsRef<str>>(&mut self, s: T) {
        let escaped = self.connector.escape_identifier(s.as_ref());
        self.sql.push_str(&escaped);
    }

    /// Push `<alias>.<column>`
    pub fn push_column<T: AsRef<str>>(&mut self, alias: T, column: T) {
        self.push_identifier(alias);
        self.push('.');
        self.push_identifier(column);
    }

    /// Push a single space
    pub fn push_space(&mut self) {
        self.sql.push(' ');
    }

    /// Push a `?` and bind `param` to it
    pub fn push_param(&mut self, param: Val) {
        self.params.push(param);
        self.push('?');
    }

    /// Push text that already carries `?` placeholders, along with the values bound to them.
    pub fn push_fragment(&mut self, text: &str, params: &[Val]) {
        self.push_str(text);
        self.params.extend_from_slice(params);
    }

    /// Push each element of `iter` through `push_elem`, with `sep` in between. Use
    /// [`SQLBuilder::push_elems`] when the elements are [`ExpressionBuilder`]s.
    pub fn push_iter<T>(
        &mut self,
        iter: impl ExactSizeIterator<Item = T>,
        sep: &str,
        push_elem: impl Fn(&mut Self, T),
    ) {
        for (i, item) in iter.enumerate() {
            if i > 0 {
                self.sql.push_str(sep);
            }
            push_elem(self, item);
        }
    }

    /// Build each element of `elems`, with `sep` in between
    pub fn push_elems<T: ExpressionBuilder>(&mut self, elems: &[T], sep: &str) {
        self.push_iter(elems.iter(), sep, |builder, elem| {
            elem.build(builder);
        });
    }

    /// The finished SQL text and its parameters, in placeholder order
    pub fn into_sql(self) -> (String, Vec<Val>) {
        (self.sql, self.params)
    }
}
