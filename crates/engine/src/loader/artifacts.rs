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

//! Pluggable artifact parsers.
//!
//! Parsers are tried in order; returning `Ok(None)` passes the file to the
//! next parser, an `Err` rejects it outright (e.g. bytecode without a `0x`
//! prefix). Built-ins: the naive layout (`contractName`/`abi`/`bytecode` at
//! the top level) and the Foundry layout (`bytecode.object`, contract name
//! synthesized from the file basename with `metadata.settings
//! .compilationTarget` as the fallback).

use alloy_primitives::{keccak256, Bytes};
use catapult_common::Artifact;
use eyre::{bail, Result};
use serde_json::Value;
use std::path::Path;

/// One artifact layout.
pub trait ArtifactParser: Send + Sync {
    /// Parser name, for diagnostics.
    fn name(&self) -> &'static str;
    /// Try to interpret `content`; `Ok(None)` means "not my layout".
    fn parse(&self, content: &str, path: &Path) -> Result<Option<Artifact>>;
}

/// The parser chain used by the project loader.
pub fn default_parsers() -> Vec<Box<dyn ArtifactParser>> {
    vec![Box::new(NaiveArtifactParser), Box::new(FoundryArtifactParser)]
}

/// Run `content` through the parser chain.
pub fn parse_artifact(
    parsers: &[Box<dyn ArtifactParser>],
    content: &str,
    path: &Path,
) -> Result<Option<Artifact>> {
    for parser in parsers {
        if let Some(artifact) = parser.parse(content, path)? {
            return Ok(Some(artifact));
        }
    }
    Ok(None)
}

/// Expects `contractName`, `abi`, and `bytecode` at the top level.
pub struct NaiveArtifactParser;

impl ArtifactParser for NaiveArtifactParser {
    fn name(&self) -> &'static str {
        "naive"
    }

    fn parse(&self, content: &str, path: &Path) -> Result<Option<Artifact>> {
        let Ok(Value::Object(root)) = serde_json::from_str::<Value>(content) else {
            return Ok(None);
        };
        let Some(Value::String(contract_name)) = root.get("contractName") else {
            return Ok(None);
        };
        let Some(Value::Array(abi)) = root.get("abi") else { return Ok(None) };
        let Some(bytecode) = root.get("bytecode").and_then(bytecode_text) else {
            return Ok(None);
        };

        Ok(Some(Artifact {
            contract_name: contract_name.clone(),
            source_name: root.get("sourceName").and_then(Value::as_str).map(String::from),
            abi: abi.clone(),
            bytecode: parse_bytecode(&bytecode)?,
            deployed_bytecode: root
                .get("deployedBytecode")
                .and_then(bytecode_text)
                .map(|b| parse_bytecode(&b))
                .transpose()?,
            compiler: root.get("compiler").cloned(),
            source: root.get("source").cloned(),
            path: Some(path.to_path_buf()),
            hash: keccak256(content.as_bytes()),
        }))
    }
}

/// Accepts Foundry build output, which carries no `contractName`.
pub struct FoundryArtifactParser;

impl ArtifactParser for FoundryArtifactParser {
    fn name(&self) -> &'static str {
        "foundry-1.2"
    }

    fn parse(&self, content: &str, path: &Path) -> Result<Option<Artifact>> {
        let Ok(Value::Object(root)) = serde_json::from_str::<Value>(content) else {
            return Ok(None);
        };
        let Some(Value::Array(abi)) = root.get("abi") else { return Ok(None) };
        let Some(bytecode) = root.get("bytecode").and_then(bytecode_text) else {
            return Ok(None);
        };

        let compilation_target = root
            .get("metadata")
            .and_then(|m| m.get("settings"))
            .and_then(|s| s.get("compilationTarget"))
            .and_then(Value::as_object)
            .and_then(|t| t.iter().next())
            .map(|(source, name)| (source.clone(), name.as_str().unwrap_or_default().to_string()));

        let contract_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(String::from)
            .filter(|s| !s.is_empty())
            .or_else(|| compilation_target.as_ref().map(|(_, name)| name.clone()));
        let Some(contract_name) = contract_name else { return Ok(None) };

        Ok(Some(Artifact {
            contract_name,
            source_name: compilation_target.map(|(source, _)| source),
            abi: abi.clone(),
            bytecode: parse_bytecode(&bytecode)?,
            deployed_bytecode: root
                .get("deployedBytecode")
                .and_then(bytecode_text)
                .map(|b| parse_bytecode(&b))
                .transpose()?,
            compiler: root.get("metadata").and_then(|m| m.get("compiler")).cloned(),
            source: None,
            path: Some(path.to_path_buf()),
            hash: keccak256(content.as_bytes()),
        }))
    }
}

// Bytecode appears either as a bare hex string or as `{object: "0x..."}`.
fn bytecode_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("object").and_then(Value::as_str).map(String::from),
        _ => None,
    }
}

fn parse_bytecode(text: &str) -> Result<Bytes> {
    if !text.starts_with("0x") {
        bail!("artifact bytecode must begin with 0x");
    }
    text.parse::<Bytes>().map_err(|e| eyre::eyre!("invalid bytecode hex: {e}"))
}
