//! Access table configuration

use crate::rbac::AccessTable;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Start from the built-in school route and feature tables
    /// Default: true
    pub use_school_defaults: bool,

    /// Reject table entries that are not `category:action` shaped
    /// Env: ROLLCALL_ACCESS_STRICT
    /// Default: false
    pub strict_permission_names: bool,

    /// Route key -> required permissions, overlaid on the defaults
    pub routes: HashMap<String, Vec<String>>,

    /// Feature key -> required permissions, overlaid on the defaults
    pub features: HashMap<String, Vec<String>>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            use_school_defaults: true,
            strict_permission_names: false,
            routes: HashMap::new(),
            features: HashMap::new(),
        }
    }
}

impl AccessConfig {
    pub fn merge(&mut self, other: Self) {
        self.use_school_defaults = other.use_school_defaults;
        self.strict_permission_names = other.strict_permission_names;
        self.routes.extend(other.routes);
        self.features.extend(other.features);
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(strict) = lookup("ROLLCALL_ACCESS_STRICT") {
            self.strict_permission_names = strict.parse().unwrap_or(false);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.strict_permission_names {
            return Ok(());
        }

        let malformed = self.to_table().malformed_entries();
        if let Some((key, name)) = malformed.first() {
            bail!(
                "Invalid permission name {:?} for {:?}: expected category:action ({} malformed entries)",
                name,
                key,
                malformed.len()
            );
        }
        Ok(())
    }

    /// The effective table: defaults (if enabled) with configured entries on top
    pub fn to_table(&self) -> AccessTable {
        let mut table =
            if self.use_school_defaults { AccessTable::school_defaults() } else { AccessTable::empty() };
        table.merge(AccessTable { routes: self.routes.clone(), features: self.features.clone() });
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_overlays_defaults() {
        let mut config = AccessConfig::default();
        config.routes.insert("/students".into(), vec!["students:manage".into()]);

        let table = config.to_table();
        assert_eq!(table.route_permissions("/students"), ["students:manage".to_string()]);
        assert_eq!(table.route_permissions("/users"), ["users:read".to_string()]);
    }

    #[test]
    fn test_strict_mode_rejects_malformed_names() {
        let mut config = AccessConfig::default();
        config.features.insert("legacy.export".into(), vec!["ExportEverything".into()]);
        assert!(config.validate().is_ok());

        config.apply_env(|key| (key == "ROLLCALL_ACCESS_STRICT").then(|| "true".to_string()));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ExportEverything"));
    }

    #[test]
    fn test_without_defaults() {
        let config = AccessConfig { use_school_defaults: false, ..AccessConfig::default() };
        assert!(config.to_table().route_permissions("/users").is_empty());
    }
}
