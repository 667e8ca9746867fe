// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! `?` placeholder scanning. Question marks inside quoted literals or identifiers are text,
//! not placeholders.

/// Byte offsets of every `?` placeholder in `sql`.
pub fn placeholder_positions(sql: &str) -> Vec<usize> {
    let mut positions = vec![];
    let mut quote: Option<char> = None;

    for (offset, c) in sql.char_indices() {
        match quote {
            // A doubled quote inside a literal closes and reopens it, which this handles as is
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '?' => positions.push(offset),
                _ => {}
            },
        }
    }

    positions
}

/// Rewrite `?` placeholders as `$1`, `$2`, ... for dialects that number their parameters.
pub fn numbered_placeholders(sql: &str) -> String {
    let positions = placeholder_positions(sql);
    if positions.is_empty() {
        return sql.to_string();
    }

    let mut numbered = String::with_capacity(sql.len() + positions.len() * 2);
    let mut last = 0;
    for (index, position) in positions.into_iter().enumerate() {
        numbered.push_str(&sql[last..position]);
        numbered.push('$');
        numbered.push_str(&(index + 1).to_string());
        last = position + 1;
    }
    numbered.push_str(&sql[last..]);
    numbered
}

#[cfg(test)]
mod tests {
    use multiplatform_test::multiplatform_test;

    use super::*;

    #[multiplatform_test]
    fn skips_quoted_question_marks() {
        let sql = r#"SELECT '?' AS "what?" FROM "t" WHERE a = ? AND b IN (?, ?)"#;
        assert_eq!(placeholder_positions(sql).len(), 3);
    }

    #[multiplatform_test]
    fn numbers_placeholders() {
        assert_eq!(
            numbered_placeholders(r##"SELECT "#0"."a" FROM "t" "#0" WHERE (x = ? OR y = '?') LIMIT ?"##),
            r##"SELECT "#0"."a" FROM "t" "#0" WHERE (x = $1 OR y = '?') LIMIT $2"##
        );
        assert_eq!(numbered_placeholders("SELECT 1"), "SELECT 1");
    }

    #[multiplatform_test]
    fn doubled_quotes() {
        assert_eq!(
            numbered_placeholders("SELECT 'it''s ?' WHERE a = ?"),
            "SELECT 'it''s ?' WHERE a = $1"
        );
    }
}
