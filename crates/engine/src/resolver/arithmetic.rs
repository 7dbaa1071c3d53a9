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

//! The `basic-arithmetic` resolver: 256-bit signed integer arithmetic and
//! comparisons over coerced operands.

use super::{require_str, require_value, ResolveError};
use alloy_primitives::I256;
use catapult_common::as_i256;
use eyre::Result;
use serde_json::{Map, Value};

/// Evaluate `{operation, values}`. Arithmetic returns a decimal string,
/// comparisons return a boolean.
pub(crate) fn evaluate(args: &Map<String, Value>) -> Result<Value> {
    let operation = require_str(args, "operation")?;
    let values = match require_value(args, "values")? {
        Value::Array(items) => items,
        other => {
            return Err(ResolveError::TypeMismatch(format!(
                "\"values\" must be an array, got {}",
                catapult_common::type_name(other)
            ))
            .into())
        }
    };
    let operands = values.iter().map(as_i256).collect::<Result<Vec<_>>>()?;

    match operation {
        "add" | "sub" | "mul" | "div" => {
            let Some((first, rest)) = operands.split_first() else {
                return Err(ResolveError::TypeMismatch(format!(
                    "\"{operation}\" needs at least one operand"
                ))
                .into());
            };
            let mut acc = *first;
            for operand in rest {
                acc = apply(operation, acc, *operand)?;
            }
            Ok(Value::String(acc.to_string()))
        }
        "eq" | "neq" | "gt" | "lt" | "gte" | "lte" => {
            let [a, b] = operands.as_slice() else {
                return Err(ResolveError::TypeMismatch(format!(
                    "\"{operation}\" needs exactly two operands, got {}",
                    operands.len()
                ))
                .into());
            };
            let result = match operation {
                "eq" => a == b,
                "neq" => a != b,
                "gt" => a > b,
                "lt" => a < b,
                "gte" => a >= b,
                _ => a <= b,
            };
            Ok(Value::Bool(result))
        }
        other => Err(ResolveError::TypeMismatch(format!(
            "unknown arithmetic operation \"{other}\""
        ))
        .into()),
    }
}

fn apply(operation: &str, a: I256, b: I256) -> Result<I256> {
    let result = match operation {
        "add" => a.checked_add(b),
        "sub" => a.checked_sub(b),
        "mul" => a.checked_mul(b),
        _ => {
            if b.is_zero() {
                return Err(ResolveError::DivisionByZero.into());
            }
            a.checked_div(b)
        }
    };
    result.ok_or_else(|| {
        ResolveError::TypeMismatch(format!("\"{operation}\" overflowed int256")).into()
    })
}
