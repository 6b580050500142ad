//! Environment-scoped configuration values.

use std::path::Path;

use anyhow::Context;
use indexmap::IndexMap;

use crate::{
    descriptor::{Descriptor, Injectable},
    parse::Value,
};

/// Section consulted when a key is missing from the active environment's
/// section.
pub const DEFAULT_SCOPE: &str = "config";

/// A table of configuration values grouped by scope (an environment name or
/// [`DEFAULT_SCOPE`]).
pub trait PropertySource: Send + Sync {
    fn contains(&self, scope: &str, key: &str) -> bool {
        self.resolve(scope, key).is_some()
    }

    fn resolve(&self, scope: &str, key: &str) -> Option<Value>;
}

/// Property sections loaded from TOML or set programmatically.
///
/// Section names match case-insensitively. Keys containing dots also match
/// nested tables, so `db.host` finds `host` inside a `db` table.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Properties {
    scopes: IndexMap<String, IndexMap<String, Value>>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, scope: &str, key: &str, value: impl Into<Value>) {
        self.scopes
            .entry(scope.to_owned())
            .or_default()
            .insert(key.to_owned(), value.into());
    }

    pub fn with(mut self, scope: &str, key: &str, value: impl Into<Value>) -> Self {
        self.set(scope, key, value);
        self
    }

    /// The raw value, without string coercion.
    pub fn get(&self, scope: &str, key: &str) -> Option<&Value> {
        let section = self.section(scope)?;
        if let Some(value) = section.get(key) {
            return Some(value);
        }
        let mut parts = key.split('.');
        let mut value = section.get(parts.next()?)?;
        for part in parts {
            match value {
                Value::Map(entries) => value = entries.get(part)?,
                _ => return None,
            }
        }
        Some(value)
    }

    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scopes.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.values().all(IndexMap::is_empty)
    }

    /// Reads TOML: top-level tables become sections, top-level values belong
    /// to [`DEFAULT_SCOPE`].
    pub fn from_toml(source: &str) -> anyhow::Result<Self> {
        let table: toml::Table = source.parse().context("invalid property file")?;
        let mut properties = Self::new();
        for (key, value) in table {
            match value {
                toml::Value::Table(section) => {
                    let entries = properties.scopes.entry(key).or_default();
                    for (key, value) in section {
                        entries.insert(key, value.into());
                    }
                }
                value => properties.set(DEFAULT_SCOPE, &key, value),
            }
        }
        Ok(properties)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read properties from {}", path.display()))?;
        Self::from_toml(&source).with_context(|| format!("in {}", path.display()))
    }

    fn section(&self, scope: &str) -> Option<&IndexMap<String, Value>> {
        self.scopes.get(scope).or_else(|| {
            self.scopes
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(scope))
                .map(|(_, section)| section)
        })
    }
}

impl PropertySource for Properties {
    fn contains(&self, scope: &str, key: &str) -> bool {
        self.get(scope, key).is_some()
    }

    fn resolve(&self, scope: &str, key: &str) -> Option<Value> {
        self.get(scope, key).cloned()
    }
}

impl Injectable for Properties {
    fn descriptor() -> Descriptor {
        Descriptor::opaque::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
        name = "shop"
        port = 8080

        [dev]
        port = "3000"

        [dev.db]
        host = "localhost"

        [PROD]
        debug = false
    "#;

    #[test]
    fn top_level_values_belong_to_the_default_scope() {
        let properties = Properties::from_toml(CONFIG).unwrap();
        assert_eq!(Some(&Value::Str("shop".into())), properties.get(DEFAULT_SCOPE, "name"));
        assert_eq!(Some(&Value::Int(8080)), properties.get(DEFAULT_SCOPE, "port"));
        let mut scopes: Vec<_> = properties.scopes().collect();
        scopes.sort_unstable();
        assert_eq!(vec!["PROD", DEFAULT_SCOPE, "dev"], scopes);
    }

    #[test]
    fn sections_match_case_insensitively() {
        let properties = Properties::from_toml(CONFIG).unwrap();
        assert!(properties.contains("DEV", "port"));
        assert!(properties.contains("prod", "debug"));
        assert!(!properties.contains("test", "port"));
    }

    #[test]
    fn dotted_keys_walk_nested_tables() {
        let properties = Properties::from_toml(CONFIG).unwrap();
        assert_eq!(
            Some(Value::Str("localhost".into())),
            properties.resolve("dev", "db.host")
        );
        assert_eq!(None, properties.resolve("dev", "db.port"));
        assert_eq!(None, properties.resolve("dev", "port.number"));
    }

    #[test]
    fn programmatic_values() {
        let properties = Properties::new()
            .with("TEST", "retries", 3i64)
            .with(DEFAULT_SCOPE, "verbose", true);
        assert!(!properties.is_empty());
        assert_eq!(Some(&Value::Int(3)), properties.get("test", "retries"));
        assert_eq!(Some(&Value::Bool(true)), properties.get(DEFAULT_SCOPE, "verbose"));
    }

    #[test]
    fn invalid_toml_is_reported() {
        let error = Properties::from_toml("port = ").unwrap_err();
        assert!(format!("{error:#}").contains("invalid property file"));
    }

    #[test]
    fn reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, CONFIG).unwrap();
        let properties = Properties::from_file(&path).unwrap();
        assert!(properties.contains(DEFAULT_SCOPE, "name"));
        assert!(Properties::from_file(dir.path().join("missing.toml")).is_err());
    }
}
