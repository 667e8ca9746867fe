// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Curly expressions: SQL text with `{field.path}` references, such as
//! `{customer.name} LIKE ? OR {id} > ?`.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::resolver::{Context, FieldResolver};

static CURLY_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^}]+)\}").expect("valid curly reference pattern"));

impl FieldResolver<'_> {
    /// Rewrite each `{path}` in `expression` to the aliased column it resolves to, left to
    /// right. Returns `None` if any reference failed to resolve (the errors are recorded).
    pub fn resolve_expression(&mut self, expression: &str, context: Context) -> Option<String> {
        let mut failed = false;

        let rewritten = CURLY_REFERENCE.replace_all(expression, |captures: &Captures| {
            let reference = captures[1].trim().to_string();
            let columns = self.resolve_fields(&[reference], context);

            match columns.as_slice() {
                [column] => format!(
                    "{}.{}",
                    self.connector
                        .escape_identifier(self.context.alias_key(&column.path)),
                    self.connector.escape_identifier(&column.column)
                ),
                _ => {
                    failed = true;
                    String::new()
                }
            }
        });

        (!failed).then(|| rewritten.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use multiplatform_test::multiplatform_test;

    use crate::{
        config::QueryConfig,
        query_error::ResolutionError,
        schema::{EntitySchema, test_helper::shop_schema},
        sql::EscapeStyle,
        testing::ScriptedConnector,
    };

    use super::*;

    #[multiplatform_test]
    fn rewrites_references_in_order() {
        let schema = shop_schema();
        let config = QueryConfig::default();
        let connector = ScriptedConnector::new();
        let mut resolver =
            FieldResolver::new(&schema, &config, &connector, schema.entity("Order").unwrap());

        let rewritten = resolver
            .resolve_expression(
                "{customer.address.city} = ? OR {customer.name} LIKE ? OR {id} > ?",
                Context::Where,
            )
            .unwrap();

        assert_eq!(
            rewritten,
            r##""#2"."city" = ? OR "#1"."name" LIKE ? OR "#0"."id" > ?"##
        );
    }

    #[multiplatform_test]
    fn escapes_for_dialect() {
        let schema = shop_schema();
        let config = QueryConfig::default();
        let connector = ScriptedConnector::with_style(EscapeStyle::Backtick);
        let mut resolver =
            FieldResolver::new(&schema, &config, &connector, schema.entity("Order").unwrap());

        assert_eq!(
            resolver.resolve_expression("{dateTime} DESC", Context::OrderBy),
            Some("`#0`.`dateTime` DESC".to_string())
        );
    }

    #[multiplatform_test]
    fn reports_every_bad_reference() {
        let schema = shop_schema();
        let config = QueryConfig::default();
        let connector = ScriptedConnector::new();
        let mut resolver =
            FieldResolver::new(&schema, &config, &connector, schema.entity("Order").unwrap());

        let rewritten = resolver.resolve_expression("{total} > 1 AND {customer} = 2", Context::Where);

        assert_eq!(rewritten, None);
        assert_eq!(
            resolver.errors,
            vec![
                ResolutionError::UnresolvedField {
                    field: "total".into(),
                    entity: "Order".into()
                },
                ResolutionError::TableValuedTerminal {
                    expression: "customer".into()
                }
            ]
        );
    }
}
