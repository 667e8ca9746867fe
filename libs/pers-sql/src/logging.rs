// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! # Tracing configuration setup.
//!
//! Query building and execution are instrumented with Rust's `tracing` framework. Calling
//! [`init`] installs a global subscriber that logs to the console, filtered by the `PERS_LOG`
//! environment variable (same conventions as `RUST_LOG`, `warn` if unset). For example,
//! `PERS_LOG=pers_sql=debug` logs every statement as it runs.

use tracing_subscriber::{filter::LevelFilter, prelude::*, util::TryInitError, EnvFilter};

pub const PERS_LOG: &str = "PERS_LOG";

/// Initialize the tracing subscriber. Fails if a global subscriber is already set.
pub fn init() -> Result<(), TryInitError> {
    let fmt_layer = tracing_subscriber::fmt::layer().compact();
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .with_env_var(PERS_LOG)
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
}
