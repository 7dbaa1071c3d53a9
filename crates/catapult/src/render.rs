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

//! Renders the engine's event stream to stdout, filtered by verbosity.
//!
//! Verbosity levels:
//! - 0: deployment lifecycle, job starts/completes/failures, network starts,
//!   warnings, errors
//! - 1: project load details, execution plan, transaction hashes,
//!   verification outcomes, run summary
//! - 2: action starts/skips, template setup
//! - 3: template enter/exit and everything else

use catapult_common::{Event, EventEmitter, EventKind, EventLevel};
use serde_json::Value;
use std::sync::Arc;

/// Minimum verbosity at which `kind` is shown.
pub fn required_verbosity(kind: EventKind) -> u8 {
    match kind {
        EventKind::DeploymentStarted
        | EventKind::DeploymentCompleted
        | EventKind::DeploymentFailed
        | EventKind::JobStarted
        | EventKind::JobCompleted
        | EventKind::JobSkipped
        | EventKind::JobExecutionFailed
        | EventKind::NetworkStarted
        | EventKind::ActionFailed
        | EventKind::PluginActionFailed
        | EventKind::DuplicateArtifactWarning
        | EventKind::ContextDisposalWarning
        | EventKind::Warnings
        | EventKind::Errors
        | EventKind::CliError => 0,
        EventKind::ProjectLoaded
        | EventKind::ExecutionPlan
        | EventKind::NetworkSignerInfo
        | EventKind::TransactionSent
        | EventKind::TransactionConfirmed
        | EventKind::ContractCreated
        | EventKind::VerificationStarted
        | EventKind::VerificationCompleted
        | EventKind::VerificationFailed
        | EventKind::RunSummary => 1,
        EventKind::ActionStarted
        | EventKind::ActionCompleted
        | EventKind::ActionSkipped
        | EventKind::TemplateSkipped
        | EventKind::TemplateSetupSkipped => 2,
        EventKind::TemplateEntered | EventKind::TemplateExited => 3,
    }
}

/// Subscribe a stdout renderer at the given verbosity.
pub fn attach_renderer(emitter: &EventEmitter, verbosity: u8) {
    emitter.on_any(Arc::new(move |event: &Event| {
        if required_verbosity(event.kind) <= verbosity {
            println!("{}", render(event));
        }
    }));
}

fn field<'e>(event: &'e Event, key: &str) -> &'e str {
    event.data.as_ref().and_then(|d| d.get(key)).and_then(Value::as_str).unwrap_or("?")
}

fn render(event: &Event) -> String {
    let prefix = match event.level {
        EventLevel::Error => "error",
        EventLevel::Warn => "warn",
        EventLevel::Debug => "debug",
        EventLevel::Info => "info",
    };
    let body = match event.kind {
        EventKind::DeploymentStarted => "deployment started".to_string(),
        EventKind::DeploymentCompleted => "deployment completed".to_string(),
        EventKind::DeploymentFailed => format!("deployment failed: {}", field(event, "error")),
        EventKind::ProjectLoaded => {
            let data = event.data.as_ref().cloned().unwrap_or_default();
            format!(
                "project loaded: {} job(s), {} template(s), {} artifact(s)",
                data.get("jobs").cloned().unwrap_or_default(),
                data.get("templates").cloned().unwrap_or_default(),
                data.get("artifacts").cloned().unwrap_or_default(),
            )
        }
        EventKind::ExecutionPlan => {
            format!("execution plan: {}", event.data.as_ref().map(|d| d["order"].to_string()).unwrap_or_default())
        }
        EventKind::NetworkStarted => format!("network {} started", field(event, "network")),
        EventKind::NetworkSignerInfo => format!(
            "signer {} has {} ETH on {}",
            field(event, "address"),
            field(event, "balanceEth"),
            field(event, "network"),
        ),
        EventKind::JobStarted => {
            format!("job {} started on {}", field(event, "job"), field(event, "network"))
        }
        EventKind::JobCompleted => {
            format!("job {} completed on {}", field(event, "job"), field(event, "network"))
        }
        EventKind::JobSkipped => format!(
            "job {} skipped on {} ({})",
            field(event, "job"),
            field(event, "network"),
            field(event, "reason"),
        ),
        EventKind::JobExecutionFailed => format!(
            "job {} failed on {}: {}",
            field(event, "job"),
            field(event, "network"),
            field(event, "error"),
        ),
        EventKind::ActionStarted => format!("action {} started", field(event, "action")),
        EventKind::ActionCompleted => format!("action {} completed", field(event, "action")),
        EventKind::ActionFailed => {
            format!("action {} failed: {}", field(event, "action"), field(event, "error"))
        }
        EventKind::ActionSkipped => format!("action {} skipped", field(event, "action")),
        EventKind::TemplateEntered => format!("entering template {}", field(event, "template")),
        EventKind::TemplateExited => format!("leaving template {}", field(event, "template")),
        EventKind::TemplateSkipped => format!(
            "template {} skipped for {}",
            field(event, "template"),
            field(event, "invocation"),
        ),
        EventKind::TemplateSetupSkipped => {
            format!("setup of template {} skipped", field(event, "template"))
        }
        EventKind::TransactionSent => {
            format!("transaction sent: {}", field(event, "transactionHash"))
        }
        EventKind::TransactionConfirmed => {
            format!("transaction confirmed: {}", field(event, "transactionHash"))
        }
        EventKind::ContractCreated => format!("contract created at {}", field(event, "address")),
        EventKind::VerificationStarted => format!("verifying bytecode at {}", field(event, "address")),
        EventKind::VerificationCompleted => format!(
            "verified {} as {}",
            field(event, "address"),
            field(event, "contractName"),
        ),
        EventKind::VerificationFailed => {
            format!("could not verify bytecode at {}", field(event, "address"))
        }
        EventKind::PluginActionFailed => field(event, "error").to_string(),
        EventKind::DuplicateArtifactWarning => format!(
            "duplicate artifact \"{}\": name lookup disabled",
            field(event, "contractName"),
        ),
        EventKind::ContextDisposalWarning => format!(
            "failed to dispose context for {}: {}",
            field(event, "network"),
            field(event, "error"),
        ),
        EventKind::RunSummary => {
            let data = event.data.as_ref().cloned().unwrap_or_default();
            format!(
                "summary: {} completed, {} failed, {} skipped",
                data.get("completedJobs").cloned().unwrap_or_default(),
                data.get("failedJobs").cloned().unwrap_or_default(),
                data.get("skippedJobs").cloned().unwrap_or_default(),
            )
        }
        EventKind::Warnings => {
            let warnings = event
                .data
                .as_ref()
                .and_then(|d| d.get("warnings"))
                .and_then(Value::as_array)
                .map(|w| {
                    w.iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<_>>()
                        .join("\n  - ")
                })
                .unwrap_or_default();
            format!("warnings:\n  - {warnings}")
        }
        EventKind::Errors => {
            format!("error on {}: {}", field(event, "network"), field(event, "error"))
        }
        EventKind::CliError => field(event, "error").to_string(),
    };
    format!("[{prefix}] {body}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verbosity_tiers() {
        assert_eq!(required_verbosity(EventKind::DeploymentFailed), 0);
        assert_eq!(required_verbosity(EventKind::JobStarted), 0);
        assert_eq!(required_verbosity(EventKind::TransactionSent), 1);
        assert_eq!(required_verbosity(EventKind::RunSummary), 1);
        assert_eq!(required_verbosity(EventKind::ActionStarted), 2);
        assert_eq!(required_verbosity(EventKind::TemplateEntered), 3);
    }

    #[test]
    fn test_render_job_events() {
        let event = Event::new(
            EventKind::JobCompleted,
            json!({"job": "deploy", "network": "sepolia"}),
        );
        assert_eq!(render(&event), "[info] job deploy completed on sepolia");
    }

    #[test]
    fn test_render_failure_includes_error() {
        let event = Event::new(
            EventKind::JobExecutionFailed,
            json!({"job": "deploy", "network": "sepolia", "error": "revert"}),
        );
        let line = render(&event);
        assert!(line.starts_with("[error]"));
        assert!(line.contains("revert"));
    }
}
