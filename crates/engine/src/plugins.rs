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

//! Extension point mapping custom action types to handlers.
//!
//! Plugins are in-process values registered before a run; the registry is
//! read-only while jobs execute. A registered handler takes precedence over
//! both built-in primitives and templates with the same type tag.

use crate::{ExecutionContext, Resolver, Scope};
use async_trait::async_trait;
use catapult_common::{Action, EventEmitter};
use eyre::{bail, Result};
use std::{collections::HashMap, sync::Arc};
use tracing::debug;

/// A handler for one custom action type.
///
/// When `has_custom_output` is false the handler owns output storage and
/// should write intrinsic results under the `<action.name>.<key>` convention;
/// when true the executor binds the action's `output` map afterwards.
#[async_trait]
pub trait PluginAction: Send + Sync {
    /// Execute the action against the live context.
    async fn execute(
        &self,
        action: &Action,
        ctx: &ExecutionContext,
        resolver: &Resolver<'_>,
        emitter: &EventEmitter,
        has_custom_output: bool,
        scope: &Scope,
    ) -> Result<()>;
}

/// One action type contributed by a plugin.
pub struct PluginActionEntry {
    /// The action `type` tag this handler claims.
    pub kind: String,
    /// The handler.
    pub handler: Arc<dyn PluginAction>,
}

/// A plugin: a named bundle of action handlers.
pub struct Plugin {
    /// Plugin name, unique across the registry.
    pub name: String,
    /// Optional version, for diagnostics.
    pub version: Option<String>,
    /// Contributed action types.
    pub actions: Vec<PluginActionEntry>,
}

/// Diagnostic record for a registered (or failed-to-load) plugin.
#[derive(Debug, Clone)]
pub struct RegisteredPlugin {
    /// Plugin name.
    pub name: String,
    /// Version, when declared.
    pub version: Option<String>,
    /// Where the plugin came from (config identifier, module path).
    pub origin: Option<String>,
    /// Load failure; a plugin with one contributes no handlers.
    pub load_error: Option<String>,
    /// Action types the plugin contributed.
    pub action_types: Vec<String>,
}

/// Registry of plugin action handlers.
#[derive(Default)]
pub struct PluginRegistry {
    handlers: HashMap<String, Arc<dyn PluginAction>>,
    plugins: Vec<RegisteredPlugin>,
}

impl PluginRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin's handlers.
    ///
    /// A plugin carrying a `load_error` is recorded for diagnostics but
    /// contributes nothing. A type collision with an already-registered
    /// handler aborts the whole plugin: none of its handlers are kept.
    pub fn register(
        &mut self,
        plugin: Plugin,
        origin: Option<String>,
        load_error: Option<String>,
    ) -> Result<()> {
        if plugin.name.is_empty() {
            bail!("plugin is missing a name");
        }
        if self.plugins.iter().any(|p| p.name == plugin.name) {
            bail!("plugin \"{}\" is already registered", plugin.name);
        }

        if let Some(error) = load_error {
            self.plugins.push(RegisteredPlugin {
                name: plugin.name,
                version: plugin.version,
                origin,
                load_error: Some(error),
                action_types: Vec::new(),
            });
            return Ok(());
        }

        for entry in &plugin.actions {
            if self.handlers.contains_key(&entry.kind) {
                bail!(
                    "plugin \"{}\" registers action type \"{}\" which is already taken",
                    plugin.name,
                    entry.kind
                );
            }
        }

        let mut action_types = Vec::with_capacity(plugin.actions.len());
        for entry in plugin.actions {
            debug!(plugin = %plugin.name, kind = %entry.kind, "registered plugin action");
            action_types.push(entry.kind.clone());
            self.handlers.insert(entry.kind, entry.handler);
        }
        self.plugins.push(RegisteredPlugin {
            name: plugin.name,
            version: plugin.version,
            origin,
            load_error: None,
            action_types,
        });
        Ok(())
    }

    /// Remove a plugin and its handlers. Returns whether it existed.
    pub fn unregister(&mut self, name: &str) -> bool {
        let Some(index) = self.plugins.iter().position(|p| p.name == name) else {
            return false;
        };
        let removed = self.plugins.remove(index);
        for kind in &removed.action_types {
            self.handlers.remove(kind);
        }
        true
    }

    /// The handler claiming `kind`, if any.
    pub fn handler(&self, kind: &str) -> Option<Arc<dyn PluginAction>> {
        self.handlers.get(kind).cloned()
    }

    /// Whether any plugin claims `kind`.
    pub fn has_handler(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Every registered action type, sorted.
    pub fn action_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    /// Diagnostic records, in registration order (load errors included).
    pub fn plugins(&self) -> &[RegisteredPlugin] {
        &self.plugins
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.handlers.clear();
        self.plugins.clear();
    }
}
