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

//! Typed deployment events and the synchronous event emitter.
//!
//! Every stage of a deployment publishes [`Event`]s through an
//! [`EventEmitter`]. Delivery is synchronous and single-threaded: handlers run
//! to completion before [`EventEmitter::emit`] returns, in registration order,
//! kind-specific subscribers before any-event subscribers. A panicking handler
//! does not prevent the remaining handlers from running; the first panic is
//! resurfaced once fan-out is complete.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

/// Severity attached to each event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    /// Routine lifecycle information.
    Info,
    /// Something suspicious that did not fail the run.
    Warn,
    /// A failure.
    Error,
    /// Tracing-grade detail.
    Debug,
}

impl fmt::Display for EventLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
            Self::Debug => write!(f, "debug"),
        }
    }
}

/// Closed enumeration of every event a deployment can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A deployment run began.
    DeploymentStarted,
    /// The run finished with every job successful.
    DeploymentCompleted,
    /// The run finished with at least one failed job, or aborted entirely.
    DeploymentFailed,
    /// Project files were loaded and validated.
    ProjectLoaded,
    /// The planned job order, per network.
    ExecutionPlan,
    /// Work on a network began.
    NetworkStarted,
    /// Signer address and balance for a network.
    NetworkSignerInfo,
    /// A job began.
    JobStarted,
    /// A job finished successfully.
    JobCompleted,
    /// A job was skipped (network filter or skip condition).
    JobSkipped,
    /// A job failed; later jobs still run.
    JobExecutionFailed,
    /// An action began.
    ActionStarted,
    /// An action finished successfully.
    ActionCompleted,
    /// An action failed.
    ActionFailed,
    /// An action's skip condition was truthy.
    ActionSkipped,
    /// A templated action expansion began.
    TemplateEntered,
    /// A templated action expansion finished.
    TemplateExited,
    /// A template's skip condition was truthy; its outputs were still bound.
    TemplateSkipped,
    /// A template's setup block was skipped.
    TemplateSetupSkipped,
    /// A transaction was broadcast.
    TransactionSent,
    /// A transaction was included in a block.
    TransactionConfirmed,
    /// A contract-creation transaction reported its address.
    ContractCreated,
    /// Bytecode verification of a deployed contract began.
    VerificationStarted,
    /// Deployed bytecode matched an artifact.
    VerificationCompleted,
    /// Deployed bytecode matched no artifact.
    VerificationFailed,
    /// A plugin handler returned an error.
    PluginActionFailed,
    /// Two artifacts share a contract name; name lookup is disabled for it.
    DuplicateArtifactWarning,
    /// Context disposal failed after the job already finished.
    ContextDisposalWarning,
    /// End-of-run aggregate: counts, addresses, failures.
    RunSummary,
    /// Non-fatal findings collected during the run.
    Warnings,
    /// Fatal findings, reported before a non-zero exit.
    Errors,
    /// A configuration error surfaced before execution began.
    CliError,
}

impl EventKind {
    /// The wire name of this event kind (matches the serde representation).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeploymentStarted => "deployment_started",
            Self::DeploymentCompleted => "deployment_completed",
            Self::DeploymentFailed => "deployment_failed",
            Self::ProjectLoaded => "project_loaded",
            Self::ExecutionPlan => "execution_plan",
            Self::NetworkStarted => "network_started",
            Self::NetworkSignerInfo => "network_signer_info",
            Self::JobStarted => "job_started",
            Self::JobCompleted => "job_completed",
            Self::JobSkipped => "job_skipped",
            Self::JobExecutionFailed => "job_execution_failed",
            Self::ActionStarted => "action_started",
            Self::ActionCompleted => "action_completed",
            Self::ActionFailed => "action_failed",
            Self::ActionSkipped => "action_skipped",
            Self::TemplateEntered => "template_entered",
            Self::TemplateExited => "template_exited",
            Self::TemplateSkipped => "template_skipped",
            Self::TemplateSetupSkipped => "template_setup_skipped",
            Self::TransactionSent => "transaction_sent",
            Self::TransactionConfirmed => "transaction_confirmed",
            Self::ContractCreated => "contract_created",
            Self::VerificationStarted => "verification_started",
            Self::VerificationCompleted => "verification_completed",
            Self::VerificationFailed => "verification_failed",
            Self::PluginActionFailed => "plugin_action_failed",
            Self::DuplicateArtifactWarning => "duplicate_artifact_warning",
            Self::ContextDisposalWarning => "context_disposal_warning",
            Self::RunSummary => "run_summary",
            Self::Warnings => "warnings",
            Self::Errors => "errors",
            Self::CliError => "cli_error",
        }
    }

    /// Default severity for this kind.
    pub fn default_level(&self) -> EventLevel {
        match self {
            Self::DeploymentFailed
            | Self::JobExecutionFailed
            | Self::ActionFailed
            | Self::VerificationFailed
            | Self::PluginActionFailed
            | Self::Errors
            | Self::CliError => EventLevel::Error,
            Self::DuplicateArtifactWarning | Self::ContextDisposalWarning | Self::Warnings => {
                EventLevel::Warn
            }
            Self::TemplateEntered | Self::TemplateExited => EventLevel::Debug,
            _ => EventLevel::Info,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured event with severity, millisecond timestamp, and payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// What happened.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Severity.
    pub level: EventLevel,
    /// Unix epoch milliseconds, stamped by [`EventEmitter::emit`].
    pub timestamp: u64,
    /// Kind-specific payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Event {
    /// Create an event with the kind's default severity. The timestamp is
    /// stamped at emission time.
    pub fn new(kind: EventKind, data: impl Into<Option<serde_json::Value>>) -> Self {
        Self { kind, level: kind.default_level(), timestamp: 0, data: data.into() }
    }

    /// Override the severity.
    pub fn with_level(mut self, level: EventLevel) -> Self {
        self.level = level;
        self
    }
}

/// Handler invoked synchronously for each delivered event.
pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Identifies a subscription for [`EventEmitter::off`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: u64,
    handler: EventHandler,
}

#[derive(Default)]
struct EmitterInner {
    next_id: u64,
    by_kind: HashMap<EventKind, Vec<Subscriber>>,
    any: Vec<Subscriber>,
}

/// Synchronous pub/sub for [`Event`]s.
///
/// Not a process-wide singleton: the CLI constructs one emitter per run and
/// shares it via `Arc`. Handlers must not re-enter [`EventEmitter::emit`] for
/// the kind currently being delivered; such emissions are dropped with a
/// warning instead of recursing.
#[derive(Default)]
pub struct EventEmitter {
    inner: RwLock<EmitterInner>,
}

thread_local! {
    static EMITTING: std::cell::RefCell<Vec<EventKind>> = const { std::cell::RefCell::new(Vec::new()) };
}

impl EventEmitter {
    /// Create an emitter with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one event kind. Handlers fire in registration order.
    pub fn on(&self, kind: EventKind, handler: EventHandler) -> SubscriptionId {
        let mut inner = self.inner.write();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.by_kind.entry(kind).or_default().push(Subscriber { id, handler });
        SubscriptionId(id)
    }

    /// Subscribe to every event kind.
    pub fn on_any(&self, handler: EventHandler) -> SubscriptionId {
        let mut inner = self.inner.write();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.any.push(Subscriber { id, handler });
        SubscriptionId(id)
    }

    /// Remove a kind-specific subscription. Returns whether it existed.
    pub fn off(&self, kind: EventKind, id: SubscriptionId) -> bool {
        let mut inner = self.inner.write();
        match inner.by_kind.get_mut(&kind) {
            Some(subs) => {
                let before = subs.len();
                subs.retain(|s| s.id != id.0);
                subs.len() != before
            }
            None => false,
        }
    }

    /// Remove an any-event subscription. Returns whether it existed.
    pub fn off_any(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.write();
        let before = inner.any.len();
        inner.any.retain(|s| s.id != id.0);
        inner.any.len() != before
    }

    /// Drop every subscription.
    pub fn remove_all(&self) {
        let mut inner = self.inner.write();
        inner.by_kind.clear();
        inner.any.clear();
    }

    /// Stamp the event and deliver it to kind-specific subscribers, then
    /// any-event subscribers, in registration order.
    ///
    /// A handler panic is caught so that the remaining handlers still run,
    /// then resurfaced after fan-out completes.
    pub fn emit(&self, mut event: Event) {
        event.timestamp = now_millis();

        let re_entered = EMITTING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&event.kind) {
                return true;
            }
            stack.push(event.kind);
            false
        });
        if re_entered {
            tracing::warn!(kind = %event.kind, "dropping re-entrant emit of the same event kind");
            return;
        }

        // Snapshot handlers so subscribers may (un)subscribe from within a
        // callback without deadlocking.
        let handlers: Vec<EventHandler> = {
            let inner = self.inner.read();
            inner
                .by_kind
                .get(&event.kind)
                .map(|subs| subs.iter().map(|s| Arc::clone(&s.handler)))
                .into_iter()
                .flatten()
                .chain(inner.any.iter().map(|s| Arc::clone(&s.handler)))
                .collect()
        };

        let mut first_panic = None;
        for handler in handlers {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                tracing::error!(kind = %event.kind, "event handler panicked");
                first_panic.get_or_insert(payload);
            }
        }

        EMITTING.with(|stack| {
            stack.borrow_mut().pop();
        });

        if let Some(payload) = first_panic {
            panic::resume_unwind(payload);
        }
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("EventEmitter")
            .field("kinds", &inner.by_kind.len())
            .field("any", &inner.any.len())
            .finish()
    }
}

/// Current time in unix epoch milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}
