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

//! The action executor: runs a job's action sequence within a scope.
//!
//! For each action, skip conditions are evaluated first; then dispatch goes
//! plugin handler, built-in primitive, template expansion, in that order of
//! precedence. Intrinsic outputs land in the context's output store under
//! `<name>.<key>`; a custom `output` map is resolved afterwards with the
//! intrinsic results in scope.
//!
//! Templated actions expand recursively: arguments are resolved in the
//! caller's scope and bound into a fresh local scope whose output keys are
//! namespaced by the invocation name. Setup blocks run in the caller's scope
//! under the same namespace so sibling invocations can share their results.

use crate::{
    is_resolver_tag, resolver::ResolveError, ExecutionContext, PluginRegistry, Project, Resolver,
    Scope, TransactionSpec,
};
use alloy_primitives::Address;
use catapult_common::{
    as_address, as_bytes, as_u256, is_truthy, Action, Event, EventEmitter, EventKind, Template,
};
use eyre::{eyre, Result, WrapErr};
use futures::future::BoxFuture;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};

/// Result of a primitive action: intrinsic outputs, plus a deferred failure
/// so that a reverted transaction still records its receipt before failing
/// the job.
struct PrimitiveOutcome {
    outputs: Map<String, Value>,
    failure: Option<eyre::Report>,
    // Target of the transaction, for `call` resolvers in the output map.
    enclosing_to: Option<Address>,
}

impl PrimitiveOutcome {
    fn ok(outputs: Map<String, Value>) -> Self {
        Self { outputs, failure: None, enclosing_to: None }
    }
}

/// Executes action sequences against one [`ExecutionContext`].
pub struct ActionExecutor<'a> {
    ctx: &'a ExecutionContext,
    project: &'a Project,
    plugins: &'a PluginRegistry,
    emitter: &'a EventEmitter,
}

impl<'a> ActionExecutor<'a> {
    /// Executor over `ctx` with the project's templates and plugins.
    pub fn new(
        ctx: &'a ExecutionContext,
        project: &'a Project,
        plugins: &'a PluginRegistry,
        emitter: &'a EventEmitter,
    ) -> Self {
        Self { ctx, project, plugins, emitter }
    }

    /// Run a whole job at the root scope.
    #[instrument(skip_all, fields(network = %self.ctx.network().name))]
    pub async fn execute_job(&self, actions: &[Action]) -> Result<()> {
        self.execute_actions(actions, &Scope::root()).await
    }

    /// Run a sequence of actions in order within `scope`.
    pub fn execute_actions<'s>(
        &'s self,
        actions: &'s [Action],
        scope: &'s Scope,
    ) -> BoxFuture<'s, Result<()>> {
        Box::pin(async move {
            for action in actions {
                self.execute_action(action, scope).await?;
            }
            Ok(())
        })
    }

    async fn execute_action(&self, action: &Action, scope: &Scope) -> Result<()> {
        self.ctx.cancel_token().check()?;
        self.ctx.ensure_live()?;

        let resolver = Resolver::new(self.ctx);
        if let Some(conditions) = &action.skip_condition {
            for condition in conditions {
                let resolved = resolver.resolve(condition, scope).await?;
                if is_truthy(&resolved) {
                    self.emit(EventKind::ActionSkipped, self.action_data(action));
                    return Ok(());
                }
            }
        }

        self.emit(EventKind::ActionStarted, self.action_data(action));
        match self.dispatch(action, scope).await {
            Ok(()) => {
                self.emit(EventKind::ActionCompleted, self.action_data(action));
                Ok(())
            }
            Err(error) => {
                let mut data = self.action_data(action);
                data["error"] = json!(format!("{error:#}"));
                self.emit(EventKind::ActionFailed, data);
                Err(error).wrap_err_with(|| {
                    format!("action \"{}\" failed", action.display_name())
                })
            }
        }
    }

    async fn dispatch(&self, action: &Action, scope: &Scope) -> Result<()> {
        // Plugin handlers shadow primitives, which shadow templates.
        if let Some(handler) = self.plugins.handler(&action.kind) {
            let resolver = Resolver::new(self.ctx);
            let has_custom_output = action.output.is_some();
            if let Err(error) = handler
                .execute(action, self.ctx, &resolver, self.emitter, has_custom_output, scope)
                .await
            {
                let message = format!(
                    "Plugin action \"{}\" (type: {}) failed: {error:#}",
                    action.display_name(),
                    action.kind
                );
                self.emit(EventKind::PluginActionFailed, json!({"action": action.display_name(), "type": action.kind, "error": message}));
                return Err(eyre!(message));
            }
            self.store_custom_outputs(action, scope, Map::new(), None).await?;
            return Ok(());
        }

        if is_primitive(&action.kind) {
            let outcome = self.run_primitive(action, scope).await?;
            if let Some(name) = &action.name {
                for (key, value) in &outcome.outputs {
                    let full = scope.prefixed_key(&format!("{name}.{key}"));
                    self.ctx.set_output(full, value.clone())?;
                }
            }
            if let Some(failure) = outcome.failure {
                return Err(failure);
            }
            self.store_custom_outputs(action, scope, outcome.outputs, outcome.enclosing_to)
                .await?;
            return Ok(());
        }

        match self.project.template(&action.kind) {
            Some(template) => {
                self.expand_template(action, template, scope).await?;
                self.store_custom_outputs(action, scope, Map::new(), None).await
            }
            None => Err(ResolveError::UnknownType(action.kind.clone()).into()),
        }
    }

    /// Resolve and store the action's custom `output` map. The intrinsic
    /// outputs are visible both as bare names and through the store.
    async fn store_custom_outputs(
        &self,
        action: &Action,
        scope: &Scope,
        intrinsic: Map<String, Value>,
        enclosing_to: Option<Address>,
    ) -> Result<()> {
        let Some(output) = &action.output else { return Ok(()) };
        let name = action.name.as_deref().ok_or_else(|| {
            eyre!("action of type \"{}\" declares outputs but has no name", action.kind)
        })?;

        let mut output_scope = scope.clone();
        for (key, value) in intrinsic {
            output_scope.bind(key, value);
        }
        let resolver = Resolver::new(self.ctx).with_enclosing_to(enclosing_to);
        for (key, expression) in output {
            let value = resolver.resolve(expression, &output_scope).await?;
            self.ctx.set_output(scope.prefixed_key(&format!("{name}.{key}")), value)?;
        }
        Ok(())
    }

    async fn run_primitive(&self, action: &Action, scope: &Scope) -> Result<PrimitiveOutcome> {
        let resolver = Resolver::new(self.ctx);
        match action.kind.as_str() {
            "constant" => {
                let raw = action
                    .value
                    .as_ref()
                    .or_else(|| action.arguments.get("value"))
                    .ok_or_else(|| eyre!("constant action needs a value"))?;
                let value = resolver.resolve(raw, scope).await?;
                let mut outputs = Map::new();
                outputs.insert("result".to_string(), value);
                Ok(PrimitiveOutcome::ok(outputs))
            }
            "send-transaction" => self.send_transaction(action, scope, false).await,
            "send-presigned-transaction" => self.send_transaction(action, scope, true).await,
            kind => {
                // Every value resolver doubles as an action writing `result`.
                let raw_args = Value::Object(action.arguments.clone());
                let resolved = resolver.resolve(&raw_args, scope).await?;
                let args = resolved
                    .as_object()
                    .ok_or_else(|| eyre!("arguments of \"{kind}\" must be a mapping"))?;
                let result = resolver.run_resolver(kind, args).await?;
                let mut outputs = Map::new();
                outputs.insert("result".to_string(), result);
                Ok(PrimitiveOutcome::ok(outputs))
            }
        }
    }

    async fn send_transaction(
        &self,
        action: &Action,
        scope: &Scope,
        presigned: bool,
    ) -> Result<PrimitiveOutcome> {
        let resolver = Resolver::new(self.ctx);
        let raw_args = Value::Object(action.arguments.clone());
        let resolved = resolver.resolve(&raw_args, scope).await?;
        let args = resolved
            .as_object()
            .ok_or_else(|| eyre!("transaction arguments must be a mapping"))?;

        let cancel = self.ctx.cancel_token().clone();
        let provider = self.ctx.provider();

        let (tx_hash, to) = if presigned {
            let raw = args
                .get("transaction")
                .ok_or_else(|| eyre!("send-presigned-transaction needs a \"transaction\""))?;
            let raw = as_bytes(raw)?;
            let hash = tokio::select! {
                _ = cancel.cancelled() => return Err(crate::RunCancelled.into()),
                sent = provider.send_raw_transaction(raw) => sent?,
            };
            (hash, None)
        } else {
            let to = match args.get("to") {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) if s.is_empty() => None,
                Some(value) => Some(as_address(value)?),
            };
            let value = match args.get("value") {
                None | Some(Value::Null) => alloy_primitives::U256::ZERO,
                Some(v) => as_u256(v)?,
            };
            let data = match args.get("data") {
                None | Some(Value::Null) => alloy_primitives::Bytes::new(),
                Some(d) => as_bytes(d)?,
            };
            let spec = TransactionSpec {
                to,
                value,
                data,
                gas_limit: self.ctx.network().gas_limit,
            };
            debug!(?to, network = %self.ctx.network().name, "sending transaction");
            let hash = tokio::select! {
                _ = cancel.cancelled() => return Err(crate::RunCancelled.into()),
                sent = provider.send_transaction(spec) => sent?,
            };
            (hash, to)
        };

        self.emit(
            EventKind::TransactionSent,
            json!({
                "action": action.display_name(),
                "transactionHash": tx_hash.to_string(),
                "network": self.ctx.network().name,
            }),
        );

        let receipt = tokio::select! {
            _ = cancel.cancelled() => return Err(crate::RunCancelled.into()),
            receipt = provider.wait_for_receipt(tx_hash) => receipt?,
        };
        self.emit(
            EventKind::TransactionConfirmed,
            json!({
                "action": action.display_name(),
                "transactionHash": tx_hash.to_string(),
                "blockNumber": receipt.block_number,
                "success": receipt.success,
            }),
        );

        let mut outputs = Map::new();
        outputs.insert("transactionHash".to_string(), json!(tx_hash.to_string()));
        outputs.insert("success".to_string(), json!(receipt.success));
        outputs.insert("blockNumber".to_string(), json!(receipt.block_number));
        if let Some(address) = receipt.contract_address {
            let checksummed = address.to_checksum(None);
            outputs.insert("contractAddress".to_string(), json!(checksummed));
            self.ctx.record_created_contract(address);
            self.emit(
                EventKind::ContractCreated,
                json!({"action": action.display_name(), "address": checksummed}),
            );
        }
        let failure = (!receipt.success)
            .then(|| eyre!("transaction {tx_hash} reverted (receipt status 0)"));
        Ok(PrimitiveOutcome { outputs, failure, enclosing_to: to })
    }

    async fn expand_template(
        &self,
        action: &Action,
        template: &Template,
        scope: &Scope,
    ) -> Result<()> {
        let invocation = action.display_name();
        let resolver = Resolver::new(self.ctx);

        // Bind declared arguments from the caller's expressions.
        let mut bindings = Map::new();
        for argument in &template.arguments {
            let supplied = action.arguments.get(argument).ok_or_else(|| {
                eyre!("template \"{}\" is missing argument \"{argument}\"", template.name)
            })?;
            bindings.insert(argument.clone(), resolver.resolve(supplied, scope).await?);
        }

        // Setup runs in the caller's scope, namespaced by the invocation so
        // its outputs are addressable across invocations.
        if let Some(setup) = &template.setup {
            let setup_scope = scope.setup_scope(invocation);
            let mut skipped = false;
            if let Some(conditions) = &setup.skip_condition {
                for condition in conditions {
                    if is_truthy(&resolver.resolve(condition, &setup_scope).await?) {
                        skipped = true;
                        break;
                    }
                }
            }
            if skipped {
                self.emit(
                    EventKind::TemplateSetupSkipped,
                    json!({"template": template.name, "invocation": invocation}),
                );
            } else {
                self.execute_actions(&setup.actions, &setup_scope).await?;
            }
        }

        let local = scope.enter_invocation(invocation, bindings);
        let invocation_key = scope.prefixed_key(invocation);

        if let Some(conditions) = &template.skip_condition {
            for condition in conditions {
                if is_truthy(&resolver.resolve(condition, &local).await?) {
                    self.emit(
                        EventKind::TemplateSkipped,
                        json!({"template": template.name, "invocation": invocation}),
                    );
                    // Declared outputs still bind so downstream references hold.
                    self.bind_template_outputs(template, &local, &invocation_key).await?;
                    return Ok(());
                }
            }
        }

        self.emit(
            EventKind::TemplateEntered,
            json!({"template": template.name, "invocation": invocation}),
        );
        self.execute_actions(&template.actions, &local).await?;
        self.bind_template_outputs(template, &local, &invocation_key).await?;
        self.emit(
            EventKind::TemplateExited,
            json!({"template": template.name, "invocation": invocation}),
        );
        Ok(())
    }

    /// Resolve the template `outputs` map. Entries may reference each other;
    /// resolution iterates to a fix-point and a round without progress means
    /// a reference cycle.
    async fn bind_template_outputs(
        &self,
        template: &Template,
        local: &Scope,
        invocation_key: &str,
    ) -> Result<()> {
        if template.outputs.is_empty() {
            return Ok(());
        }
        let resolver = Resolver::new(self.ctx);
        let mut extended = local.clone();
        let mut pending: Vec<(&String, &Value)> = template.outputs.iter().collect();

        while !pending.is_empty() {
            let mut unresolved = Vec::new();
            let mut progressed = false;
            for (key, expression) in pending {
                match resolver.resolve(expression, &extended).await {
                    Ok(value) => {
                        extended.bind(key.clone(), value.clone());
                        self.ctx.set_output(format!("{invocation_key}.{key}"), value)?;
                        progressed = true;
                    }
                    Err(error)
                        if matches!(
                            error.downcast_ref::<ResolveError>(),
                            Some(ResolveError::UnresolvedReference(_))
                        ) =>
                    {
                        unresolved.push((key, expression));
                    }
                    Err(error) => return Err(error),
                }
            }
            if !progressed && !unresolved.is_empty() {
                let keys: Vec<&str> = unresolved.iter().map(|(k, _)| k.as_str()).collect();
                return Err(ResolveError::CircularReference(keys.join(", ")).into());
            }
            pending = unresolved;
        }
        Ok(())
    }

    fn action_data(&self, action: &Action) -> Value {
        json!({
            "action": action.display_name(),
            "type": action.kind,
            "network": self.ctx.network().name,
        })
    }

    fn emit(&self, kind: EventKind, data: Value) {
        self.emitter.emit(Event::new(kind, data));
    }
}

/// Whether `kind` names a built-in primitive action.
pub fn is_primitive(kind: &str) -> bool {
    matches!(kind, "send-transaction" | "send-presigned-transaction" | "constant")
        || is_resolver_tag(kind)
}
