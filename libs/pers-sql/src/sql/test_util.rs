// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

#![cfg(test)]

//! Test assertion to check SQL statements and parameters.

/// Assert that the given parameters match the expected ones.
///
/// # Usage:
/// ```no_run
/// assert_params!(actual_params, expected_param1, expected_param2, ...);
/// ```
///
/// Each expected parameter is converted with `Val::from`, so plain literals work:
/// ```
/// let actual_params = vec![Val::from(1), Val::from("hello")];
/// assert_params!(actual_params, 1, "hello"); // will pass
/// ```
macro_rules! assert_params {
    ($actual_params:expr) => {
        assert!($actual_params.is_empty(), "Extra actual parameters");
    };
    ($actual_params:expr, $($expected_param:expr),+) => {
        let expected_params: Vec<$crate::value::Val> =
            vec![$($crate::value::Val::from($expected_param)),+];
        assert_eq!($actual_params, expected_params, "Parameter mismatch");
    };
}

macro_rules! assert_binding {
    ($actual:expr, $expected_stmt:expr) => {
        let (actual_stmt, actual_params) = $actual;
        assert_eq!(actual_stmt, $expected_stmt);
        assert_params!(actual_params);
    };
    ($actual:expr, $expected_stmt:expr, $($rest:expr),*) => {
        let (actual_stmt, actual_params) = $actual;
        assert_eq!(actual_stmt, $expected_stmt);
        assert_params!(actual_params, $($rest),*);
    };
}
