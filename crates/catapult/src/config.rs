// Catapult - Declarative EVM Deployment Orchestrator
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! `catapult.config.*` loading and plugin registration.
//!
//! The configuration file is optional. When present it lists plugin
//! identifiers; each is resolved against the built-in plugin catalog, and
//! unresolved identifiers are recorded in the registry as load errors so the
//! run can report them without failing.

use catapult_engine::{Plugin, PluginRegistry};
use eyre::{bail, Result, WrapErr};
use serde::Deserialize;
use std::{fs, path::Path};
use tracing::warn;

const CONFIG_BASENAMES: &[&str] =
    &["catapult.config.json", "catapult.config.yml", "catapult.config.yaml"];
const UNSUPPORTED_BASENAMES: &[&str] = &["catapult.config.js", "catapult.config.ts"];

/// Parsed configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Plugin identifiers to load.
    #[serde(default)]
    pub plugins: Vec<String>,
}

/// Load `catapult.config.{json,yml,yaml}` from the project root. An absent
/// file yields the default configuration; a malformed one is an error.
pub fn load_config(root: &Path) -> Result<Config> {
    for basename in UNSUPPORTED_BASENAMES {
        if root.join(basename).is_file() {
            bail!(
                "{basename} is not supported by this host; use catapult.config.json or .yaml"
            );
        }
    }

    let Some(path) = CONFIG_BASENAMES.iter().map(|b| root.join(b)).find(|p| p.is_file()) else {
        return Ok(Config::default());
    };
    let content = fs::read_to_string(&path)?;
    let config = if path.extension().and_then(|e| e.to_str()) == Some("json") {
        serde_json::from_str(&content)
            .wrap_err_with(|| format!("invalid config {}", path.display()))?
    } else {
        serde_yaml::from_str(&content)
            .wrap_err_with(|| format!("invalid config {}", path.display()))?
    };
    Ok(config)
}

/// Build the plugin registry from the configuration.
///
/// Plugins are in-process registrations; identifiers that match nothing in
/// the built-in catalog are tracked as load errors for diagnostics.
pub fn build_registry(config: &Config) -> Result<PluginRegistry> {
    let mut registry = PluginRegistry::new();
    for identifier in &config.plugins {
        warn!(plugin = %identifier, "no built-in plugin matches identifier");
        registry.register(
            Plugin { name: identifier.clone(), version: None, actions: Vec::new() },
            Some(identifier.clone()),
            Some("dynamic plugin modules are not supported; register plugins through the library API".to_string()),
        )?;
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use catapult_common::test_utils::{create_temp_project_dir, write_project_file};

    #[test]
    fn test_absent_config_is_default() {
        let root = create_temp_project_dir("no-config");
        let config = load_config(&root).unwrap();
        assert!(config.plugins.is_empty());
    }

    #[test]
    fn test_json_config() {
        let root = create_temp_project_dir("json-config");
        write_project_file(&root, "catapult.config.json", r#"{"plugins": ["safe-suite"]}"#);
        let config = load_config(&root).unwrap();
        assert_eq!(config.plugins, vec!["safe-suite"]);
    }

    #[test]
    fn test_yaml_config_and_search_order() {
        let root = create_temp_project_dir("yaml-config");
        write_project_file(&root, "catapult.config.yaml", "plugins: [a, b]\n");
        let config = load_config(&root).unwrap();
        assert_eq!(config.plugins, vec!["a", "b"]);
    }

    #[test]
    fn test_wrong_schema_is_an_error() {
        let root = create_temp_project_dir("bad-config");
        write_project_file(&root, "catapult.config.json", r#"{"plugin": "oops"}"#);
        assert!(load_config(&root).is_err());
    }

    #[test]
    fn test_js_config_is_rejected() {
        let root = create_temp_project_dir("js-config");
        write_project_file(&root, "catapult.config.js", "module.exports = {}");
        let err = load_config(&root).unwrap_err();
        assert!(err.to_string().contains("not supported"));
    }

    #[test]
    fn test_unresolved_plugins_become_load_errors() {
        let config = Config { plugins: vec!["ghost-plugin".to_string()] };
        let registry = build_registry(&config).unwrap();
        assert_eq!(registry.plugins().len(), 1);
        assert!(registry.plugins()[0].load_error.is_some());
        assert!(registry.action_types().is_empty());
    }
}
