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

//! Resolvers that read external state: `read-balance`, `call`,
//! `contract-exists`, and `json-request`.
//!
//! These are the only impure resolvers; each one suspends on I/O and observes
//! a snapshot of remote state.

use super::{abi, require_str, require_value, ResolveError, Resolver};
use catapult_common::{as_address, type_name};
use eyre::Result;
use serde_json::{Map, Value};
use tracing::debug;

/// `read-balance`: account balance in wei, as a decimal string.
pub(crate) async fn read_balance(resolver: &Resolver<'_>, args: &Map<String, Value>) -> Result<Value> {
    let address = as_address(require_value(args, "address")?)?;
    let balance = resolver.context().provider().get_balance(address).await?;
    Ok(Value::String(balance.to_string()))
}

/// `call`: a static call, ABI-decoded. The target may be omitted when the
/// enclosing action already names one.
pub(crate) async fn call(resolver: &Resolver<'_>, args: &Map<String, Value>) -> Result<Value> {
    let to = match args.get("to").or_else(|| args.get("address")) {
        Some(Value::Null) | None => resolver.enclosing_to().ok_or_else(|| {
            ResolveError::TypeMismatch(
                "call has no target and no enclosing action to infer one from".to_string(),
            )
        })?,
        Some(value) => as_address(value)?,
    };
    let signature = require_str(args, "signature")?;
    let values = match args.get("values") {
        None => &[][..],
        Some(Value::Array(items)) => items.as_slice(),
        Some(other) => {
            return Err(ResolveError::TypeMismatch(format!(
                "\"values\" must be an array, got {}",
                type_name(other)
            ))
            .into())
        }
    };
    let (function, data) = abi::encode_call(signature, values)?;
    debug!(%to, signature, "static call");
    let returned = resolver.context().provider().call(to, data).await?;
    abi::decode_output(&function, &returned)
}

/// `contract-exists`: whether the account has non-empty bytecode.
pub(crate) async fn contract_exists(
    resolver: &Resolver<'_>,
    args: &Map<String, Value>,
) -> Result<Value> {
    let address = as_address(require_value(args, "address")?)?;
    let code = resolver.context().provider().get_code(address).await?;
    Ok(Value::Bool(!code.is_empty()))
}

/// `json-request`: an HTTP request whose JSON response body becomes the
/// resolved value. Non-2xx statuses are fatal.
pub(crate) async fn json_request(args: &Map<String, Value>) -> Result<Value> {
    let url = require_str(args, "url")?;
    let method = match args.get("method") {
        Some(Value::String(m)) => m.to_uppercase(),
        None => "GET".to_string(),
        Some(other) => {
            return Err(ResolveError::TypeMismatch(format!(
                "\"method\" must be a string, got {}",
                type_name(other)
            ))
            .into())
        }
    };

    let client = reqwest::Client::new();
    let mut request = match method.as_str() {
        "GET" => client.get(url),
        "POST" => client.post(url),
        "PUT" => client.put(url),
        "DELETE" => client.delete(url),
        other => {
            return Err(ResolveError::TypeMismatch(format!(
                "unsupported HTTP method \"{other}\""
            ))
            .into())
        }
    };

    if let Some(Value::Object(headers)) = args.get("headers") {
        for (name, value) in headers {
            let Value::String(value) = value else {
                return Err(ResolveError::TypeMismatch(format!(
                    "header \"{name}\" must be a string"
                ))
                .into());
            };
            request = request.header(name, value);
        }
    }
    if let Some(body) = args.get("body") {
        request = request.json(body);
    }

    debug!(%url, %method, "json request");
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(eyre::eyre!("json-request to {url} failed with status {status}"));
    }
    Ok(response.json::<Value>().await?)
}
