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

//! Compiled contract artifacts.

use alloy_primitives::{Bytes, B256};
use serde::Serialize;
use std::{fmt, path::PathBuf};

/// A compiled contract, immutable after project load.
///
/// Constructed by one of the artifact parsers; `hash` is the keccak256 of the
/// raw file content and is the stable identity used when two artifacts share a
/// contract name.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    /// Contract name, unique per project unless duplicated (see the contract
    /// repository's duplicate handling).
    pub contract_name: String,
    /// Source file the contract was compiled from, when known.
    pub source_name: Option<String>,
    /// Ordered ABI items, as raw JSON.
    pub abi: Vec<serde_json::Value>,
    /// Creation bytecode.
    pub bytecode: Bytes,
    /// Runtime bytecode, when the compiler emitted it.
    pub deployed_bytecode: Option<Bytes>,
    /// Compiler metadata, passed through untouched.
    pub compiler: Option<serde_json::Value>,
    /// Embedded source, passed through untouched.
    pub source: Option<serde_json::Value>,
    /// File the artifact was loaded from.
    #[serde(skip)]
    pub path: Option<PathBuf>,
    /// keccak256 of the raw artifact file content.
    pub hash: B256,
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes creation code)", self.contract_name, self.bytecode.len())?;
        if let Some(source) = &self.source_name {
            write!(f, " from {source}")?;
        }
        Ok(())
    }
}
