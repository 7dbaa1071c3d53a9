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

//! The declarative project model: jobs, templates, and actions.
//!
//! These types deserialize straight from the project's YAML files and are
//! never mutated afterwards. Value expressions stay as [`serde_json::Value`]
//! until the resolver evaluates them against a live execution context.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A named sequence of actions with optional dependencies, loaded from
/// `jobs/*.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Job name, unique within the project.
    pub name: String,
    /// Optional free-form version tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Names of jobs that must complete before this one starts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Network allowlist; when present the job only runs on the named
    /// networks and is reported as skipped elsewhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub networks: Option<Vec<String>>,
    /// Job-level skip conditions; any truthy entry skips the whole job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_condition: Option<Vec<Value>>,
    /// Ordered actions.
    pub actions: Vec<Action>,
}

/// A reusable, parameterized action sequence, loaded from `templates/*.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    /// Template name; invoked by using it as an action `type`.
    pub name: String,
    /// Declared argument names, bound from the caller's `arguments` map.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,
    /// Declared return names; informational, validated against `outputs`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub returns: Vec<String>,
    /// Optional setup block, run in the caller's scope so sibling
    /// invocations can share its outputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup: Option<SetupBlock>,
    /// Skip conditions; any truthy entry skips the body (outputs still bind).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_condition: Option<Vec<Value>>,
    /// Ordered actions, executed in a fresh local scope.
    pub actions: Vec<Action>,
    /// Mapping from return name to value expression, resolved after the body.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub outputs: Map<String, Value>,
}

/// A template's setup block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupBlock {
    /// Setup actions, run in the caller's scope.
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Skip conditions for the whole block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_condition: Option<Vec<Value>>,
}

/// One declarative unit of work inside a job or template.
///
/// `kind` selects a plugin handler, a built-in primitive, or a template, in
/// that order of precedence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// The action type tag.
    #[serde(rename = "type")]
    pub kind: String,
    /// Action name; required when outputs are consumed, unique within the
    /// enclosing scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Unresolved argument expressions.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub arguments: Map<String, Value>,
    /// Shorthand payload for `constant` actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Custom output bindings, resolved after the action's intrinsic outputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Map<String, Value>>,
    /// Skip conditions; any truthy entry skips the action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_condition: Option<Vec<Value>>,
}

impl Action {
    /// The name used for output keys and event payloads, falling back to the
    /// type tag for anonymous actions.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.kind)
    }
}
