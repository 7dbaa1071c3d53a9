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

//! ABI encoding resolvers: `abi-encode`, `abi-pack`, `constructor-encode`,
//! plus the coercions between JSON values and [`DynSolValue`]s shared with
//! the `call` resolver.

use super::{require_str, require_value, ResolveError};
use alloy_dyn_abi::{DynSolType, DynSolValue, FunctionExt, JsonAbiExt, Specifier};
use alloy_json_abi::Function;
use alloy_primitives::{hex, Bytes, B256};
use catapult_common::{as_address, as_bytes, as_i256, as_u256, type_name};
use eyre::Result;
use serde_json::{Map, Value};

/// `abi-encode`: selector-prefixed call data for a function signature.
pub(crate) fn encode(args: &Map<String, Value>) -> Result<Value> {
    let signature = require_str(args, "signature")?;
    let values = optional_array(args, "values")?;
    let (_, data) = encode_call(signature, values)?;
    Ok(Value::String(data.to_string()))
}

/// `abi-pack`: Solidity's non-standard packed encoding.
pub(crate) fn encode_packed(args: &Map<String, Value>) -> Result<Value> {
    let types = type_list(args)?;
    let values = optional_array(args, "values")?;
    if types.len() != values.len() {
        return Err(ResolveError::TypeMismatch(format!(
            "abi-pack got {} types but {} values",
            types.len(),
            values.len()
        ))
        .into());
    }
    let mut packed = Vec::new();
    for (ty, value) in types.iter().zip(values) {
        packed.extend(to_sol_value(ty, value)?.abi_encode_packed());
    }
    Ok(Value::String(hex::encode_prefixed(packed)))
}

/// `constructor-encode`: ABI-encoded constructor arguments, appended to the
/// creation code when one is provided.
pub(crate) fn encode_constructor(args: &Map<String, Value>) -> Result<Value> {
    let types = type_list(args)?;
    let values = optional_array(args, "values")?;
    if types.len() != values.len() {
        return Err(ResolveError::TypeMismatch(format!(
            "constructor-encode got {} types but {} values",
            types.len(),
            values.len()
        ))
        .into());
    }
    let sol_values = types
        .iter()
        .zip(values)
        .map(|(ty, value)| to_sol_value(ty, value))
        .collect::<Result<Vec<_>>>()?;
    let encoded = DynSolValue::Tuple(sol_values).abi_encode_params();

    match args.get("creationCode") {
        Some(code) => {
            let mut out = as_bytes(code)?.to_vec();
            out.extend(encoded);
            Ok(Value::String(hex::encode_prefixed(out)))
        }
        None => Ok(Value::String(hex::encode_prefixed(encoded))),
    }
}

/// Encode a call for `signature` with JSON argument values.
pub(crate) fn encode_call(signature: &str, values: &[Value]) -> Result<(Function, Bytes)> {
    let function = Function::parse(signature)
        .map_err(|e| ResolveError::TypeMismatch(format!("invalid signature {signature:?}: {e}")))?;
    if function.inputs.len() != values.len() {
        return Err(ResolveError::TypeMismatch(format!(
            "{} takes {} arguments, got {}",
            function.name,
            function.inputs.len(),
            values.len()
        ))
        .into());
    }
    let mut sol_values = Vec::with_capacity(values.len());
    for (param, value) in function.inputs.iter().zip(values) {
        let ty = param
            .resolve()
            .map_err(|e| ResolveError::TypeMismatch(format!("bad parameter type: {e}")))?;
        sol_values.push(to_sol_value(&ty, value)?);
    }
    let data = function
        .abi_encode_input(&sol_values)
        .map_err(|e| ResolveError::TypeMismatch(format!("encoding {signature:?} failed: {e}")))?;
    Ok((function, data.into()))
}

/// Decode a call's return data into JSON: a single output unwraps, multiple
/// outputs become an array.
pub(crate) fn decode_output(function: &Function, data: &[u8]) -> Result<Value> {
    let decoded = function.abi_decode_output(data).map_err(|e| {
        ResolveError::TypeMismatch(format!("decoding output of {} failed: {e}", function.name))
    })?;
    let mut values: Vec<Value> = decoded.iter().map(sol_to_json).collect();
    Ok(match values.len() {
        0 => Value::Null,
        1 => values.remove(0),
        _ => Value::Array(values),
    })
}

fn optional_array<'m>(args: &'m Map<String, Value>, key: &str) -> Result<&'m [Value]> {
    match args.get(key) {
        None => Ok(&[]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(other) => Err(ResolveError::TypeMismatch(format!(
            "\"{key}\" must be an array, got {}",
            type_name(other)
        ))
        .into()),
    }
}

fn type_list(args: &Map<String, Value>) -> Result<Vec<DynSolType>> {
    let raw = match require_value(args, "types")? {
        Value::Array(items) => items,
        other => {
            return Err(ResolveError::TypeMismatch(format!(
                "\"types\" must be an array, got {}",
                type_name(other)
            ))
            .into())
        }
    };
    raw.iter()
        .map(|item| match item {
            Value::String(s) => s.parse::<DynSolType>().map_err(|e| {
                eyre::Report::from(ResolveError::TypeMismatch(format!("bad ABI type {s:?}: {e}")))
            }),
            other => Err(ResolveError::TypeMismatch(format!(
                "ABI type must be a string, got {}",
                type_name(other)
            ))
            .into()),
        })
        .collect()
}

/// Coerce a JSON value into a [`DynSolValue`] of the given type.
pub(crate) fn to_sol_value(ty: &DynSolType, value: &Value) -> Result<DynSolValue> {
    let mismatch = |why: String| eyre::Report::from(ResolveError::TypeMismatch(why));
    match ty {
        DynSolType::Address => Ok(DynSolValue::Address(as_address(value)?)),
        DynSolType::Bool => match value {
            Value::Bool(b) => Ok(DynSolValue::Bool(*b)),
            Value::String(s) if s == "true" => Ok(DynSolValue::Bool(true)),
            Value::String(s) if s == "false" => Ok(DynSolValue::Bool(false)),
            other => Err(mismatch(format!("expected bool, got {}", type_name(other)))),
        },
        DynSolType::Uint(bits) => Ok(DynSolValue::Uint(as_u256(value)?, *bits)),
        DynSolType::Int(bits) => Ok(DynSolValue::Int(as_i256(value)?, *bits)),
        DynSolType::FixedBytes(size) => {
            let bytes = as_bytes(value)?;
            if bytes.len() != *size {
                return Err(mismatch(format!(
                    "expected bytes{size}, got {} bytes",
                    bytes.len()
                )));
            }
            let mut word = B256::ZERO;
            word[..*size].copy_from_slice(&bytes);
            Ok(DynSolValue::FixedBytes(word, *size))
        }
        DynSolType::Bytes => Ok(DynSolValue::Bytes(as_bytes(value)?.to_vec())),
        DynSolType::String => match value {
            Value::String(s) => Ok(DynSolValue::String(s.clone())),
            other => Err(mismatch(format!("expected string, got {}", type_name(other)))),
        },
        DynSolType::Array(inner) => match value {
            Value::Array(items) => Ok(DynSolValue::Array(
                items.iter().map(|item| to_sol_value(inner, item)).collect::<Result<_>>()?,
            )),
            other => Err(mismatch(format!("expected array, got {}", type_name(other)))),
        },
        DynSolType::FixedArray(inner, len) => match value {
            Value::Array(items) if items.len() == *len => Ok(DynSolValue::FixedArray(
                items.iter().map(|item| to_sol_value(inner, item)).collect::<Result<_>>()?,
            )),
            Value::Array(items) => Err(mismatch(format!(
                "expected {len} elements, got {}",
                items.len()
            ))),
            other => Err(mismatch(format!("expected array, got {}", type_name(other)))),
        },
        DynSolType::Tuple(types) => match value {
            Value::Array(items) if items.len() == types.len() => Ok(DynSolValue::Tuple(
                types
                    .iter()
                    .zip(items)
                    .map(|(ty, item)| to_sol_value(ty, item))
                    .collect::<Result<_>>()?,
            )),
            other => Err(mismatch(format!("expected tuple array, got {}", type_name(other)))),
        },
        other_ty => match value {
            // Let alloy's string coercion handle the long tail.
            Value::String(s) => other_ty
                .coerce_str(s)
                .map_err(|e| mismatch(format!("cannot coerce {s:?} to {other_ty}: {e}"))),
            other => Err(mismatch(format!(
                "cannot coerce {} to {other_ty}",
                type_name(other)
            ))),
        },
    }
}

/// Render a decoded [`DynSolValue`] as JSON: integers as decimal strings,
/// byte content as `0x` hex, addresses checksummed.
pub(crate) fn sol_to_json(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Address(a) => Value::String(a.to_checksum(None)),
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::Uint(u, _) => Value::String(u.to_string()),
        DynSolValue::Int(i, _) => Value::String(i.to_string()),
        DynSolValue::FixedBytes(word, size) => {
            Value::String(hex::encode_prefixed(&word[..*size]))
        }
        DynSolValue::Bytes(bytes) => Value::String(hex::encode_prefixed(bytes)),
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            Value::Array(items.iter().map(sol_to_json).collect())
        }
        DynSolValue::Function(f) => Value::String(hex::encode_prefixed(f.as_slice())),
        _ => Value::Null,
    }
}
