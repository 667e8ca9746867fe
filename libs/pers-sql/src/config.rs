// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Configuration read from the environment.
//!
//! - `PERS_FIELD_AFFIX`: text added to a field name when the name itself doesn't resolve
//! - `PERS_FIELD_AFFIX_KIND`: `suffix` (the default) or `prefix`
//! - `PERS_KEEP_INJECTED_KEYS`: keep primary keys that were added only to tell a missing
//!   relation apart from an empty one

use std::{collections::HashMap, fmt::Display, str::FromStr, sync::Arc};

pub const PERS_FIELD_AFFIX: &str = "PERS_FIELD_AFFIX";
pub const PERS_FIELD_AFFIX_KIND: &str = "PERS_FIELD_AFFIX_KIND";
pub const PERS_KEEP_INJECTED_KEYS: &str = "PERS_KEEP_INJECTED_KEYS";

pub trait Environment: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn enabled(&self, key: &str, default_value: bool) -> Result<bool, EnvError> {
        match self.get(key) {
            Some(value) => match value.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" | "enabled" | "enable" => Ok(true),
                "false" | "0" | "no" | "off" | "disabled" | "disable" => Ok(false),
                _ => Err(EnvError::InvalidBoolean {
                    key: key.to_string(),
                    value,
                }),
            },
            None => Ok(default_value),
        }
    }

    fn get_or_else(&self, key: &str, default_value: &str) -> String {
        self.get(key).unwrap_or(default_value.to_string())
    }

    fn get_list(&self, key: &str, default_value: Vec<String>) -> Vec<String> {
        self.get(key)
            .map(|value| value.split(',').map(|s| s.trim().into()).collect())
            .unwrap_or(default_value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error(
        "Invalid value for {key}: {value}. Expected true, 1, yes, on, enabled, enable OR false, 0, no, off, disabled, disable"
    )]
    InvalidBoolean { key: String, value: String },

    #[error("Invalid env value {env_value} for {env_key}: {message}")]
    InvalidEnum {
        env_key: &'static str,
        env_value: String,
        message: String,
    },
}

pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Default)]
pub struct MapEnvironment {
    values: HashMap<String, String>,
    fallback: Option<Arc<dyn Environment>>,
}

impl Environment for MapEnvironment {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .cloned()
            .or_else(|| self.fallback.as_ref().and_then(|fb| fb.get(key)))
    }
}

impl<const N: usize> From<[(&str, &str); N]> for MapEnvironment {
    fn from(values: [(&str, &str); N]) -> Self {
        Self {
            values: values
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            fallback: None,
        }
    }
}

impl MapEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_with_fallback(fallback: Arc<dyn Environment>) -> Self {
        Self {
            values: HashMap::new(),
            fallback: Some(fallback),
        }
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffixKind {
    Suffix,
    Prefix,
}

impl FromStr for AffixKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "suffix" => Ok(AffixKind::Suffix),
            "prefix" => Ok(AffixKind::Prefix),
            _ => Err("Field affix kind must be one of suffix, prefix".to_string()),
        }
    }
}

impl Display for AffixKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AffixKind::Suffix => write!(f, "suffix"),
            AffixKind::Prefix => write!(f, "prefix"),
        }
    }
}

/// Text added to a field name on a second lookup attempt. With the suffix `_id`, selecting
/// `customer` on a table with only a `customer_id` column reads that column but reports it
/// as `customer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAffix {
    pub affix: String,
    pub kind: AffixKind,
}

impl FieldAffix {
    pub fn new(affix: impl Into<String>, kind: &str) -> Result<Self, EnvError> {
        let kind = kind.parse().map_err(|message| EnvError::InvalidEnum {
            env_key: PERS_FIELD_AFFIX_KIND,
            env_value: kind.to_string(),
            message,
        })?;

        Ok(Self {
            affix: affix.into(),
            kind,
        })
    }

    pub fn apply(&self, name: &str) -> String {
        match self.kind {
            AffixKind::Suffix => format!("{name}{}", self.affix),
            AffixKind::Prefix => format!("{}{name}", self.affix),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryConfig {
    pub field_affix: Option<FieldAffix>,
    pub keep_injected_keys: bool,
}

impl QueryConfig {
    pub fn from_env(env: &dyn Environment) -> Result<Self, EnvError> {
        let field_affix = env
            .get(PERS_FIELD_AFFIX)
            .filter(|affix| !affix.is_empty())
            .map(|affix| FieldAffix::new(affix, &env.get_or_else(PERS_FIELD_AFFIX_KIND, "suffix")))
            .transpose()?;

        Ok(Self {
            field_affix,
            keep_injected_keys: env.enabled(PERS_KEEP_INJECTED_KEYS, false)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use multiplatform_test::multiplatform_test;

    use super::*;

    #[multiplatform_test]
    fn defaults() {
        let config = QueryConfig::from_env(&MapEnvironment::new()).unwrap();
        assert_eq!(config, QueryConfig::default());
    }

    #[multiplatform_test]
    fn affix_from_env() {
        let env = MapEnvironment::from([
            (PERS_FIELD_AFFIX, "_id"),
            (PERS_KEEP_INJECTED_KEYS, "yes"),
        ]);
        let config = QueryConfig::from_env(&env).unwrap();

        let affix = config.field_affix.unwrap();
        assert_eq!(affix.kind, AffixKind::Suffix);
        assert_eq!(affix.apply("customer"), "customer_id");
        assert!(config.keep_injected_keys);
    }

    #[multiplatform_test]
    fn prefix_affix() {
        let env = MapEnvironment::from([
            (PERS_FIELD_AFFIX, "fk_"),
            (PERS_FIELD_AFFIX_KIND, "prefix"),
        ]);
        let affix = QueryConfig::from_env(&env).unwrap().field_affix.unwrap();

        assert_eq!(affix.apply("customer"), "fk_customer");
    }

    #[multiplatform_test]
    fn invalid_affix_kind() {
        let env = MapEnvironment::from([
            (PERS_FIELD_AFFIX, "_id"),
            (PERS_FIELD_AFFIX_KIND, "infix"),
        ]);

        let error = QueryConfig::from_env(&env).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Invalid env value infix for PERS_FIELD_AFFIX_KIND: Field affix kind must be one of suffix, prefix"
        );
    }

    #[multiplatform_test]
    fn invalid_boolean() {
        let env = MapEnvironment::from([(PERS_KEEP_INJECTED_KEYS, "maybe")]);
        assert!(matches!(
            QueryConfig::from_env(&env),
            Err(EnvError::InvalidBoolean { .. })
        ));
    }
}
