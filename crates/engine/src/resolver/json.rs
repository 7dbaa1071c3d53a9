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

//! Structural resolvers: `read-json` and `resolve-json`.

use super::{require_str, require_value, ResolveError};
use catapult_common::lookup_path;
use eyre::Result;
use serde_json::{Map, Value};

/// `read-json`: extract the element at a dotted path (`a.b.0.c`); a missing
/// path is fatal.
pub(crate) fn read_json(args: &Map<String, Value>) -> Result<Value> {
    let value = require_value(args, "value")?;
    let path = require_str(args, "path")?;
    lookup_path(value, path)
        .cloned()
        .ok_or_else(|| ResolveError::MissingPath(path.to_string()).into())
}

/// `resolve-json`: identity over its argument. The surrounding dispatch has
/// already deep-resolved every nested expression by the time this runs.
pub(crate) fn resolve_json(args: &Map<String, Value>) -> Result<Value> {
    Ok(require_value(args, "value")?.clone())
}
