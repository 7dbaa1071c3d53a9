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

//! Deployment address resolvers: `compute-create` and `compute-create2`.

use super::{require_value, ResolveError};
use alloy_primitives::B256;
use catapult_common::{as_address, as_bytes, as_u256};
use eyre::Result;
use serde_json::{Map, Value};

/// `compute-create`: the address a deployer's next CREATE will land on,
/// `last20(keccak256(rlp([deployer, nonce])))`.
pub(crate) fn compute_create(args: &Map<String, Value>) -> Result<Value> {
    let deployer = as_address(require_value(args, "deployerAddress")?)?;
    let nonce = as_u256(require_value(args, "nonce")?)?;
    let nonce = u64::try_from(nonce)
        .map_err(|_| ResolveError::TypeMismatch("nonce does not fit in u64".to_string()))?;
    Ok(Value::String(deployer.create(nonce).to_checksum(None)))
}

/// `compute-create2`: `last20(keccak256(0xff ++ deployer ++ salt ++ keccak256(initCode)))`.
pub(crate) fn compute_create2(args: &Map<String, Value>) -> Result<Value> {
    let deployer = as_address(require_value(args, "deployerAddress")?)?;
    let salt = as_bytes(require_value(args, "salt")?)?;
    if salt.len() != 32 {
        return Err(ResolveError::TypeMismatch(format!(
            "salt must be 32 bytes, got {}",
            salt.len()
        ))
        .into());
    }
    let salt = B256::from_slice(&salt);
    let init_code = as_bytes(require_value(args, "initCode")?)?;
    Ok(Value::String(deployer.create2_from_code(salt, &init_code).to_checksum(None)))
}
