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

//! Recursive interpreter for value expressions.
//!
//! A value expression is plain JSON enriched with two constructs: reference
//! strings containing `{{identifier}}` placeholders, and tagged resolver
//! objects (`{type: basic-arithmetic, arguments: {...}}`). The resolver walks
//! an expression bottom-up against an [`ExecutionContext`] and a local
//! [`Scope`], evaluating placeholders and dispatching tagged objects to the
//! built-in sub-resolvers.
//!
//! Identifier lookup order: local scope bindings, then the output store
//! (template-invocation prefix first), then the `Network()` pseudo-object.

pub mod abi;
pub mod address;
pub mod arithmetic;
pub mod chain;
pub mod json;
pub mod reference;

use crate::ExecutionContext;
use alloy_primitives::Address;
use catapult_common::stringify;
use eyre::Result;
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use thiserror::Error;

/// Closed failure modes of value resolution. These classify a job failure;
/// everything else surfaces as a plain [`eyre::Report`].
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A `{{reference}}` matched neither scope, outputs, nor `Network()`.
    #[error("unresolved reference \"{0}\"")]
    UnresolvedReference(String),
    /// Template outputs reference each other in a loop.
    #[error("circular reference while resolving outputs: {0}")]
    CircularReference(String),
    /// A value had the wrong shape for its consumer.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    /// `read-json` addressed a path that does not exist.
    #[error("missing path \"{0}\" in value")]
    MissingPath(String),
    /// `basic-arithmetic` divided by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// An action or resolver tag nothing claims.
    #[error("template \"{0}\" not found")]
    UnknownType(String),
}

/// Tags dispatched as value resolvers. Any of these is also usable in action
/// position, where its result lands in the output store.
pub const RESOLVER_TAGS: &[&str] = &[
    "basic-arithmetic",
    "abi-encode",
    "abi-pack",
    "constructor-encode",
    "compute-create",
    "compute-create2",
    "read-balance",
    "call",
    "contract-exists",
    "job-completed",
    "read-json",
    "resolve-json",
    "json-request",
];

/// Whether `tag` names a built-in value resolver.
pub fn is_resolver_tag(tag: &str) -> bool {
    RESOLVER_TAGS.contains(&tag)
}

/// Local bindings for a template invocation, plus the output-key prefix that
/// namespaces the invocation's own actions.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    bindings: Map<String, Value>,
    prefix: Option<String>,
}

impl Scope {
    /// The empty job-level scope.
    pub fn root() -> Self {
        Self::default()
    }

    /// Bind an argument name to an already-resolved value.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    /// Child scope for a template invocation: fresh bindings, nested prefix.
    pub fn enter_invocation(&self, invocation: &str, bindings: Map<String, Value>) -> Self {
        Self { bindings, prefix: Some(self.prefixed_key(invocation)) }
    }

    /// Scope with the same prefix but no bindings (setup blocks run in the
    /// caller's scope under the invocation's prefix).
    pub fn setup_scope(&self, invocation: &str) -> Self {
        Self { bindings: self.bindings.clone(), prefix: Some(self.prefixed_key(invocation)) }
    }

    /// The output-key prefix of the current invocation, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Namespace an output key with this scope's prefix.
    pub fn prefixed_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.to_string(),
        }
    }

    /// Resolve an identifier against the bindings: exact name first, then
    /// `binding.path.into.value`.
    pub fn lookup(&self, identifier: &str) -> Option<Value> {
        if let Some(value) = self.bindings.get(identifier) {
            return Some(value.clone());
        }
        let (head, path) = identifier.split_once('.')?;
        let bound = self.bindings.get(head)?;
        catapult_common::lookup_path(bound, path).cloned()
    }
}

/// The value resolver. Cheap to construct; one per action evaluation.
pub struct Resolver<'a> {
    ctx: &'a ExecutionContext,
    enclosing_to: Option<Address>,
}

impl<'a> Resolver<'a> {
    /// A resolver over `ctx` with no enclosing action.
    pub fn new(ctx: &'a ExecutionContext) -> Self {
        Self { ctx, enclosing_to: None }
    }

    /// Record the enclosing action's target address, so a `call` resolver in
    /// its output map may omit `to`.
    pub fn with_enclosing_to(mut self, to: Option<Address>) -> Self {
        self.enclosing_to = to;
        self
    }

    /// The execution context being resolved against.
    pub fn context(&self) -> &ExecutionContext {
        self.ctx
    }

    pub(crate) fn enclosing_to(&self) -> Option<Address> {
        self.enclosing_to
    }

    /// Recursively resolve a value expression.
    pub fn resolve<'s>(&'s self, value: &'s Value, scope: &'s Scope) -> BoxFuture<'s, Result<Value>> {
        Box::pin(async move {
            match value {
                Value::String(s) => self.resolve_string(s, scope).await,
                Value::Array(items) => {
                    let mut resolved = Vec::with_capacity(items.len());
                    for item in items {
                        resolved.push(self.resolve(item, scope).await?);
                    }
                    Ok(Value::Array(resolved))
                }
                Value::Object(map) => {
                    if let Some(Value::String(tag)) = map.get("type") {
                        if is_resolver_tag(tag) {
                            return self.dispatch(tag, map, scope).await;
                        }
                    }
                    let mut resolved = Map::new();
                    for (key, item) in map {
                        resolved.insert(key.clone(), self.resolve(item, scope).await?);
                    }
                    Ok(Value::Object(resolved))
                }
                other => Ok(other.clone()),
            }
        })
    }

    /// Resolve a string: no placeholders passes through, a lone placeholder
    /// returns the native value, anything else interpolates.
    async fn resolve_string(&self, input: &str, scope: &Scope) -> Result<Value> {
        if !reference::has_reference(input) {
            return Ok(Value::String(input.to_string()));
        }
        let segments = reference::scan(input)?;
        if let Some(identifier) = reference::single_reference(&segments) {
            return self.resolve_identifier(identifier, scope);
        }
        let mut rendered = String::new();
        for segment in &segments {
            match segment {
                reference::Segment::Literal(text) => rendered.push_str(text),
                reference::Segment::Reference(identifier) => {
                    let value = self.resolve_identifier(identifier, scope)?;
                    rendered.push_str(&stringify(&value));
                }
            }
        }
        Ok(Value::String(rendered))
    }

    /// Look an identifier up in scope, outputs, then `Network()`.
    pub fn resolve_identifier(&self, identifier: &str, scope: &Scope) -> Result<Value> {
        if let Some(field) = identifier.strip_prefix("Network().") {
            return self
                .ctx
                .network()
                .field(field)
                .ok_or_else(|| ResolveError::UnresolvedReference(identifier.to_string()).into());
        }

        if let Some(value) = scope.lookup(identifier) {
            return Ok(value);
        }

        if let Some(prefix) = scope.prefix() {
            if let Some(value) = self.ctx.output_by_identifier(&format!("{prefix}.{identifier}")) {
                return Ok(value);
            }
        }
        if let Some(value) = self.ctx.output_by_identifier(identifier) {
            return Ok(value);
        }

        Err(ResolveError::UnresolvedReference(identifier.to_string()).into())
    }

    /// Evaluate a tagged resolver object. Arguments are resolved before the
    /// sub-resolver runs.
    async fn dispatch(&self, tag: &str, object: &Map<String, Value>, scope: &Scope) -> Result<Value> {
        let raw_args = object.get("arguments").cloned().unwrap_or_else(|| Value::Object(Map::new()));
        let resolved = self.resolve(&raw_args, scope).await?;
        let args = match resolved {
            Value::Object(map) => map,
            other => {
                return Err(ResolveError::TypeMismatch(format!(
                    "resolver \"{tag}\" arguments must be a mapping, got {}",
                    catapult_common::type_name(&other)
                ))
                .into())
            }
        };
        self.run_resolver(tag, &args).await
    }

    /// Run a built-in resolver on already-resolved arguments. The executor
    /// also calls this for resolver tags in action position.
    pub async fn run_resolver(&self, tag: &str, args: &Map<String, Value>) -> Result<Value> {
        match tag {
            "basic-arithmetic" => arithmetic::evaluate(args),
            "abi-encode" => abi::encode(args),
            "abi-pack" => abi::encode_packed(args),
            "constructor-encode" => abi::encode_constructor(args),
            "compute-create" => address::compute_create(args),
            "compute-create2" => address::compute_create2(args),
            "read-balance" => chain::read_balance(self, args).await,
            "call" => chain::call(self, args).await,
            "contract-exists" => chain::contract_exists(self, args).await,
            "json-request" => chain::json_request(args).await,
            "job-completed" => {
                let job = require_str(args, "job")?;
                Ok(Value::Bool(self.ctx.job_completed(job)))
            }
            "read-json" => json::read_json(args),
            "resolve-json" => json::resolve_json(args),
            other => Err(ResolveError::UnknownType(other.to_string()).into()),
        }
    }
}

/// Fetch a required string argument.
pub(crate) fn require_str<'m>(args: &'m Map<String, Value>, key: &str) -> Result<&'m str> {
    match args.get(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(ResolveError::TypeMismatch(format!(
            "argument \"{key}\" must be a string, got {}",
            catapult_common::type_name(other)
        ))
        .into()),
        None => {
            Err(ResolveError::TypeMismatch(format!("missing required argument \"{key}\"")).into())
        }
    }
}

/// Fetch a required argument of any shape.
pub(crate) fn require_value<'m>(args: &'m Map<String, Value>, key: &str) -> Result<&'m Value> {
    args.get(key).ok_or_else(|| {
        ResolveError::TypeMismatch(format!("missing required argument \"{key}\"")).into()
    })
}
