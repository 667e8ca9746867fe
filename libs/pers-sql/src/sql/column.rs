// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::value::Val;

use super::{ExpressionBuilder, SQLBuilder};

/// A column qualified by its table alias such as `"#1"."name"`
#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedColumn {
    pub alias: String,
    pub column: String,
}

impl ExpressionBuilder for QualifiedColumn {
    fn build(&self, builder: &mut SQLBuilder) {
        builder.push_column(&self.alias, &self.column);
    }
}

/// A selected column with its result label such as `"#1"."name" AS "#1.name"`. The label
/// carries the alias, so that the result mapper can route the value back to its object.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectColumn {
    pub column: QualifiedColumn,
    pub label: String,
}

impl ExpressionBuilder for SelectColumn {
    fn build(&self, builder: &mut SQLBuilder) {
        self.column.build(builder);
        builder.push_str(" AS ");
        builder.push_identifier(&self.label);
    }
}

/// Caller-supplied SQL text (already rewritten to refer to aliases) and the values bound to
/// its placeholders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub text: String,
    pub params: Vec<Val>,
}

impl Fragment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: vec![],
        }
    }

    pub fn with_params(text: impl Into<String>, params: Vec<Val>) -> Self {
        Self {
            text: text.into(),
            params,
        }
    }
}

impl ExpressionBuilder for Fragment {
    fn build(&self, builder: &mut SQLBuilder) {
        builder.push_fragment(&self.text, &self.params);
    }
}
