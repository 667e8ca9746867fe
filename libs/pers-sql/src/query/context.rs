// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Per-build state: table aliases, joins, the relations to rebuild in the mapped graph, and
//! the primary keys that must be selected.

use indexmap::IndexMap;

use crate::schema::Entity;

pub(crate) const ROOT_ALIAS: &str = "#0";

/// Table alias for one join path. The base table has the path `""`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Alias {
    /// Unescaped alias such as `#1`
    pub key: String,
    pub entity: String,
    pub primary_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct JoinEntry {
    pub alias: String,
    pub table: String,
    pub primary_key: String,
    pub parent_alias: String,
    pub bound_fk: String,
}

/// Where an alias's object gets attached: under `property` of the object for `parent_alias`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Binding {
    pub parent_alias: String,
    pub property: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MapInfo {
    pub entity: String,
    pub binding: Option<Binding>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyOrigin {
    /// Added by the builder; removed from the mapped object again
    Auto,
    /// Also requested by the caller
    User,
}

#[derive(Debug)]
pub(crate) struct BuildContext {
    /// Join path to alias, in creation order
    aliases: IndexMap<String, Alias>,
    /// Join path to join, in creation order
    joins: IndexMap<String, JoinEntry>,
    /// Alias key to map info, for the aliases that appear in the mapped graph
    map_info: IndexMap<String, MapInfo>,
    /// Join paths whose primary key is selected no matter what
    required_pks: IndexMap<String, KeyOrigin>,
}

impl BuildContext {
    pub fn new(base: &Entity) -> Self {
        let mut aliases = IndexMap::new();
        aliases.insert(
            String::new(),
            Alias {
                key: ROOT_ALIAS.to_string(),
                entity: base.name.clone(),
                primary_key: base.primary_key.clone(),
            },
        );

        let mut map_info = IndexMap::new();
        map_info.insert(
            ROOT_ALIAS.to_string(),
            MapInfo {
                entity: base.name.clone(),
                binding: None,
            },
        );

        Self {
            aliases,
            joins: IndexMap::new(),
            map_info,
            required_pks: IndexMap::new(),
        }
    }

    pub fn alias(&self, path: &str) -> Option<&Alias> {
        self.aliases.get(path)
    }

    pub fn alias_key(&self, path: &str) -> &str {
        self.aliases
            .get(path)
            .map(|alias| alias.key.as_str())
            .unwrap_or(ROOT_ALIAS)
    }

    /// The alias for `path`, allocating the next one on first use
    pub fn alias_or_create(&mut self, path: &str, entity: &Entity) -> &Alias {
        let next = format!("#{}", self.aliases.len());
        self.aliases.entry(path.to_string()).or_insert_with(|| Alias {
            key: next,
            entity: entity.name.clone(),
            primary_key: entity.primary_key.clone(),
        })
    }

    /// The join path and alias for the alias key `key`
    pub fn find_alias(&self, key: &str) -> Option<(&str, &Alias)> {
        self.aliases
            .iter()
            .find(|(_, alias)| alias.key == key)
            .map(|(path, alias)| (path.as_str(), alias))
    }

    pub fn register_join(&mut self, path: &str, join: JoinEntry) {
        self.joins.entry(path.to_string()).or_insert(join);
    }

    pub fn joins(&self) -> impl Iterator<Item = &JoinEntry> {
        self.joins.values()
    }

    pub fn materialize(&mut self, alias: &str, info: MapInfo) {
        self.map_info.entry(alias.to_string()).or_insert(info);
    }

    pub fn map_info(&self) -> impl Iterator<Item = (&str, &MapInfo)> {
        self.map_info.iter().map(|(alias, info)| (alias.as_str(), info))
    }

    pub fn require_pk(&mut self, path: &str) {
        self.required_pks
            .entry(path.to_string())
            .or_insert(KeyOrigin::Auto);
    }

    pub fn required_pk_paths(&self) -> Vec<String> {
        self.required_pks.keys().cloned().collect()
    }

    pub fn set_key_origin(&mut self, path: &str, origin: KeyOrigin) {
        if let Some(current) = self.required_pks.get_mut(path) {
            *current = origin;
        }
    }

    /// Whether the primary key of the alias `alias` was selected only by the builder
    pub fn is_auto_key(&self, alias: &str) -> bool {
        self.find_alias(alias)
            .and_then(|(path, _)| self.required_pks.get(path))
            .is_some_and(|origin| *origin == KeyOrigin::Auto)
    }
}
