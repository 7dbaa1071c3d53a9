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

//! Target network descriptors.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// A target EVM network, as declared in `networks.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    /// Network name, referenced by jobs' `networks` allowlists.
    pub name: String,
    /// Expected chain id; checked against the RPC endpoint at startup.
    #[serde(alias = "chainId")]
    pub chain_id: u64,
    /// HTTP RPC endpoint.
    #[serde(alias = "rpcUrl")]
    pub rpc_url: String,
    /// Free-form capability tags (e.g. "create2", "eip1559").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports: Option<Vec<String>>,
    /// Gas limit override for transactions on this network.
    #[serde(default, alias = "gasLimit", skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
    /// EVM version tag, passed through to templates that care.
    #[serde(default, alias = "evmVersion", skip_serializing_if = "Option::is_none")]
    pub evm_version: Option<String>,
    /// Whether this is a test network.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub testnet: Option<bool>,
}

impl Network {
    /// Resolve a `Network().<field>` reference against this descriptor.
    ///
    /// Field names follow the reference language (`chainId`, `rpcUrl`, ...);
    /// the snake_case spellings are accepted as well. Returns `None` for an
    /// unknown field so the resolver can report it with the full reference.
    pub fn field(&self, name: &str) -> Option<serde_json::Value> {
        match name {
            "name" => Some(json!(self.name)),
            "chainId" | "chain_id" => Some(json!(self.chain_id)),
            "rpcUrl" | "rpc_url" => Some(json!(self.rpc_url)),
            "supports" => Some(json!(self.supports.clone().unwrap_or_default())),
            "gasLimit" | "gas_limit" => Some(match self.gas_limit {
                Some(limit) => json!(limit),
                None => serde_json::Value::Null,
            }),
            "evmVersion" | "evm_version" => Some(match &self.evm_version {
                Some(v) => json!(v),
                None => serde_json::Value::Null,
            }),
            "testnet" => Some(json!(self.testnet.unwrap_or(false))),
            _ => None,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (chain {})", self.name, self.chain_id)
    }
}
