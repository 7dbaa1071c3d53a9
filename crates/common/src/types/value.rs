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

//! Coercions over resolved values.
//!
//! Resolved values are plain [`serde_json::Value`]s; these helpers implement
//! the stringification and numeric/address/bytes coercions the resolver and
//! executor share.

use alloy_primitives::{Address, Bytes, I256, U256};
use eyre::{bail, eyre, Result};
use serde_json::Value;

/// Render a value the way reference interpolation does: strings verbatim,
/// numbers in decimal, booleans as `true`/`false`, null as `null`, and
/// containers as compact JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Truthiness for skip conditions: null, `false`, zero, the empty string and
/// the string `"false"` are falsy; everything else is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty() && s != "false" && s != "0",
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Coerce to a signed 256-bit integer: JSON integers, decimal strings, and
/// `0x`-prefixed hex strings.
pub fn as_i256(value: &Value) -> Result<I256> {
    match value {
        Value::Number(n) => {
            I256::from_dec_str(&n.to_string()).map_err(|e| eyre!("not an integer: {n} ({e})"))
        }
        Value::String(s) => {
            if let Some(hex) = s.strip_prefix("0x") {
                let raw = U256::from_str_radix(hex, 16)
                    .map_err(|e| eyre!("invalid hex number {s:?}: {e}"))?;
                I256::try_from(raw).map_err(|_| eyre!("hex number {s:?} overflows int256"))
            } else {
                I256::from_dec_str(s.trim()).map_err(|e| eyre!("invalid number {s:?}: {e}"))
            }
        }
        other => bail!("cannot interpret {} as an integer", type_name(other)),
    }
}

/// Coerce to an unsigned 256-bit integer (wei amounts, salts, nonces).
pub fn as_u256(value: &Value) -> Result<U256> {
    match value {
        Value::Number(n) => {
            let text = n.to_string();
            if text.starts_with('-') {
                bail!("negative value {text} where an unsigned integer is required");
            }
            text.parse::<U256>().map_err(|e| eyre!("not an integer: {text} ({e})"))
        }
        Value::String(s) => {
            if let Some(hex) = s.strip_prefix("0x") {
                U256::from_str_radix(hex, 16).map_err(|e| eyre!("invalid hex number {s:?}: {e}"))
            } else {
                s.trim().parse::<U256>().map_err(|e| eyre!("invalid number {s:?}: {e}"))
            }
        }
        other => bail!("cannot interpret {} as an unsigned integer", type_name(other)),
    }
}

/// Coerce to an EVM address (`0x` + 40 hex chars, checksummed or not).
pub fn as_address(value: &Value) -> Result<Address> {
    match value {
        Value::String(s) => s.parse::<Address>().map_err(|e| eyre!("invalid address {s:?}: {e}")),
        other => bail!("cannot interpret {} as an address", type_name(other)),
    }
}

/// Coerce to a byte string (`0x`-prefixed hex). The empty payload `0x` is
/// valid.
pub fn as_bytes(value: &Value) -> Result<Bytes> {
    match value {
        Value::String(s) => {
            if !s.starts_with("0x") {
                bail!("byte string {s:?} must start with 0x");
            }
            s.parse::<Bytes>().map_err(|e| eyre!("invalid byte string {s:?}: {e}"))
        }
        other => bail!("cannot interpret {} as bytes", type_name(other)),
    }
}

/// Walk a dotted path (`a.b.0.c`) through objects and arrays.
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Human-readable JSON type name for error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
