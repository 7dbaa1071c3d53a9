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

//! The deployment runner: per-network orchestration and failure aggregation.
//!
//! Jobs run sequentially in topological order within a network; networks run
//! sequentially or in parallel. A failed job never stops its siblings, only
//! its dependents' outputs would be missing - later jobs fail on their own
//! unresolved references. Every context is disposed on every path, including
//! cancellation and panics inside a network run.

use crate::{
    plan, verify_created_contracts, ActionExecutor, CancelToken, ExecutionContext, PluginRegistry,
    Project, ProviderConnector, Resolver, RunCancelled, Scope,
};
use alloy_primitives::{utils::format_ether, U256};
use alloy_signer_local::PrivateKeySigner;
use catapult_common::{is_truthy, Event, EventEmitter, EventKind, Job, Network};
use eyre::{eyre, Result, WrapErr};
use futures::FutureExt;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Runner configuration, assembled by the CLI.
#[derive(Clone)]
pub struct RunnerConfig {
    /// Deployer private key (hex, with or without `0x`).
    pub private_key: String,
    /// Run target networks concurrently instead of one after another.
    pub parallel_networks: bool,
}

/// One job failure, as reported in `deployment_failed`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedJob {
    /// The failing job.
    pub job_name: String,
    /// Network it failed on.
    pub network_name: String,
    /// Chain id of that network.
    pub chain_id: u64,
    /// Rendered error chain.
    pub error: String,
}

/// Per-network results retained for the output files.
#[derive(Debug, Clone)]
pub struct NetworkRun {
    /// Network name.
    pub network: String,
    /// Output store snapshot.
    pub outputs: Value,
    /// Contracts created, checksummed.
    pub created_contracts: Vec<String>,
}

/// Aggregate result of a deployment run.
#[derive(Debug, Default)]
pub struct RunOutcome {
    /// Failures across all networks.
    pub failed_jobs: Vec<FailedJob>,
    /// Whether the run was cancelled mid-flight.
    pub cancelled: bool,
    /// Per-network outputs, in completion order.
    pub networks: Vec<NetworkRun>,
    /// Non-fatal findings (verification mismatches, disposal errors).
    pub warnings: Vec<String>,
    /// Jobs completed across all networks.
    pub completed: usize,
    /// Jobs skipped across all networks.
    pub skipped: usize,
}

impl RunOutcome {
    /// Whether everything that ran succeeded.
    pub fn success(&self) -> bool {
        self.failed_jobs.is_empty() && !self.cancelled
    }
}

struct NetworkReport {
    run: NetworkRun,
    failed: Vec<FailedJob>,
    warnings: Vec<String>,
    cancelled: bool,
    completed: usize,
    skipped: usize,
}

/// Drives a loaded project across its target networks.
pub struct Runner {
    project: Arc<Project>,
    plugins: Arc<PluginRegistry>,
    emitter: Arc<EventEmitter>,
    connector: Arc<dyn ProviderConnector>,
    config: RunnerConfig,
}

impl Runner {
    /// Assemble a runner.
    pub fn new(
        project: Arc<Project>,
        plugins: Arc<PluginRegistry>,
        emitter: Arc<EventEmitter>,
        connector: Arc<dyn ProviderConnector>,
        config: RunnerConfig,
    ) -> Self {
        Self { project, plugins, emitter, connector, config }
    }

    /// Run every job on the selected networks (all declared networks when
    /// `network_names` is empty).
    ///
    /// Planning problems (unknown dependency, cycle, bad key, unknown
    /// network) are fatal and return `Err` before any network work. Job
    /// failures are aggregated into the returned [`RunOutcome`].
    pub async fn run(&self, network_names: &[String], cancel: CancelToken) -> Result<RunOutcome> {
        let order = plan(&self.project.jobs)?;
        let networks = self.select_networks(network_names)?;
        let signer: PrivateKeySigner = self
            .config
            .private_key
            .trim()
            .parse()
            .map_err(|e| eyre!("invalid private key: {e}"))?;

        self.emitter.emit(Event::new(
            EventKind::DeploymentStarted,
            json!({
                "networks": networks.iter().map(|n| n.name.clone()).collect::<Vec<_>>(),
                "jobs": order.iter().map(|&i| self.project.jobs[i].name.clone()).collect::<Vec<_>>(),
            }),
        ));
        self.emitter.emit(Event::new(
            EventKind::ExecutionPlan,
            json!({
                "order": order.iter().map(|&i| self.project.jobs[i].name.clone()).collect::<Vec<_>>(),
                "parallel": self.config.parallel_networks,
            }),
        ));

        let mut outcome = RunOutcome::default();
        if self.config.parallel_networks {
            let reports = futures::future::join_all(networks.iter().map(|network| {
                self.run_network(network.clone(), &order, signer.clone(), cancel.clone())
            }))
            .await;
            for report in reports {
                merge(&mut outcome, report);
            }
        } else {
            for network in &networks {
                if cancel.is_cancelled() {
                    outcome.cancelled = true;
                    break;
                }
                let report =
                    self.run_network(network.clone(), &order, signer.clone(), cancel.clone()).await;
                merge(&mut outcome, report);
            }
        }

        self.finish(&outcome);
        Ok(outcome)
    }

    fn select_networks(&self, names: &[String]) -> Result<Vec<Network>> {
        if names.is_empty() {
            if self.project.networks.is_empty() {
                return Err(eyre!("the project declares no networks"));
            }
            return Ok(self.project.networks.clone());
        }
        names
            .iter()
            .map(|name| {
                self.project
                    .network(name)
                    .cloned()
                    .ok_or_else(|| eyre!("unknown network \"{name}\""))
            })
            .collect()
    }

    async fn run_network(
        &self,
        network: Network,
        order: &[usize],
        signer: PrivateKeySigner,
        cancel: CancelToken,
    ) -> NetworkReport {
        let mut report = NetworkReport {
            run: NetworkRun {
                network: network.name.clone(),
                outputs: Value::Null,
                created_contracts: Vec::new(),
            },
            failed: Vec::new(),
            warnings: Vec::new(),
            cancelled: false,
            completed: 0,
            skipped: 0,
        };

        let provider = match self.connector.connect(&network, signer.clone()).await {
            Ok(provider) => provider,
            Err(error) => {
                self.network_setup_failure(&network, &mut report, error);
                return report;
            }
        };
        let ctx = ExecutionContext::new(
            network.clone(),
            signer.address(),
            provider,
            Arc::clone(&self.project.repository),
            cancel.clone(),
        );

        // The job loop is unwind-guarded so the context is disposed even if
        // an action handler panics.
        let inner = std::panic::AssertUnwindSafe(self.run_jobs(&ctx, order, &mut report))
            .catch_unwind()
            .await;
        if let Err(panic) = inner {
            let message = panic_message(panic);
            self.emitter.emit(Event::new(
                EventKind::Errors,
                json!({"network": network.name, "error": format!("panic during network run: {message}")}),
            ));
            report.failed.push(FailedJob {
                job_name: "*".to_string(),
                network_name: network.name.clone(),
                chain_id: network.chain_id,
                error: format!("panic during network run: {message}"),
            });
        }

        if !report.cancelled {
            report.warnings.extend(verify_created_contracts(&ctx, &self.emitter).await);
        }
        report.run.outputs = ctx.outputs_snapshot();
        report.run.created_contracts =
            ctx.created_contracts().iter().map(|a| a.to_checksum(None)).collect();

        if let Err(error) = ctx.dispose().await {
            self.emitter.emit(Event::new(
                EventKind::ContextDisposalWarning,
                json!({"network": network.name, "error": format!("{error:#}")}),
            ));
            report.warnings.push(format!(
                "failed to dispose context for {}: {error:#}",
                network.name
            ));
        }
        report
    }

    async fn run_jobs(&self, ctx: &ExecutionContext, order: &[usize], report: &mut NetworkReport) {
        let network = ctx.network().clone();

        self.emitter.emit(Event::new(
            EventKind::NetworkStarted,
            json!({"network": network.name, "chainId": network.chain_id}),
        ));
        match self.announce_signer(ctx).await {
            Ok(()) => {}
            Err(error) => {
                self.network_setup_failure(&network, report, error);
                return;
            }
        }

        for &index in order {
            if ctx.cancel_token().is_cancelled() {
                report.cancelled = true;
                return;
            }
            let job = &self.project.jobs[index];

            match self.job_skip_reason(ctx, job).await {
                Ok(Some(reason)) => {
                    report.skipped += 1;
                    self.emitter.emit(Event::new(
                        EventKind::JobSkipped,
                        json!({"job": job.name, "network": network.name, "reason": reason}),
                    ));
                    continue;
                }
                Ok(None) => {}
                Err(error) => {
                    self.record_job_failure(&network, job, report, error);
                    continue;
                }
            }

            self.emitter.emit(Event::new(
                EventKind::JobStarted,
                json!({"job": job.name, "network": network.name}),
            ));
            let executor = ActionExecutor::new(ctx, &self.project, &self.plugins, &self.emitter);
            match executor.execute_job(&job.actions).await {
                Ok(()) => {
                    ctx.mark_job_completed(&job.name);
                    report.completed += 1;
                    info!(job = %job.name, network = %network.name, "job completed");
                    self.emitter.emit(Event::new(
                        EventKind::JobCompleted,
                        json!({"job": job.name, "network": network.name}),
                    ));
                }
                Err(error) if error.downcast_ref::<RunCancelled>().is_some() => {
                    report.cancelled = true;
                    return;
                }
                Err(error) => self.record_job_failure(&network, job, report, error),
            }
        }
    }

    /// Job-level skip: network allowlist, then declared skip conditions.
    async fn job_skip_reason(&self, ctx: &ExecutionContext, job: &Job) -> Result<Option<String>> {
        if let Some(networks) = &job.networks {
            if !networks.contains(&ctx.network().name) {
                return Ok(Some(format!("not targeted at {}", ctx.network().name)));
            }
        }
        if let Some(conditions) = &job.skip_condition {
            let resolver = Resolver::new(ctx);
            let scope = Scope::root();
            for condition in conditions {
                let value = resolver
                    .resolve(condition, &scope)
                    .await
                    .wrap_err("failed to evaluate job skip condition")?;
                if is_truthy(&value) {
                    return Ok(Some("skip condition met".to_string()));
                }
            }
        }
        Ok(None)
    }

    async fn announce_signer(&self, ctx: &ExecutionContext) -> Result<()> {
        let network = ctx.network();
        let chain_id = ctx.provider().chain_id().await.wrap_err("failed to query chain id")?;
        if chain_id != network.chain_id {
            return Err(eyre!(
                "network \"{}\" declares chain id {} but the endpoint reports {chain_id}",
                network.name,
                network.chain_id
            ));
        }
        let balance = ctx.provider().get_balance(ctx.signer_address()).await.unwrap_or(U256::ZERO);
        self.emitter.emit(Event::new(
            EventKind::NetworkSignerInfo,
            json!({
                "network": network.name,
                "address": ctx.signer_address().to_checksum(None),
                "balanceWei": balance.to_string(),
                "balanceEth": format_ether(balance),
            }),
        ));
        Ok(())
    }

    fn record_job_failure(
        &self,
        network: &Network,
        job: &Job,
        report: &mut NetworkReport,
        error: eyre::Report,
    ) {
        warn!(job = %job.name, network = %network.name, %error, "job failed");
        let rendered = format!("{error:#}");
        self.emitter.emit(Event::new(
            EventKind::JobExecutionFailed,
            json!({"job": job.name, "network": network.name, "error": rendered}),
        ));
        report.failed.push(FailedJob {
            job_name: job.name.clone(),
            network_name: network.name.clone(),
            chain_id: network.chain_id,
            error: rendered,
        });
    }

    fn network_setup_failure(
        &self,
        network: &Network,
        report: &mut NetworkReport,
        error: eyre::Report,
    ) {
        let rendered = format!("{error:#}");
        self.emitter.emit(Event::new(
            EventKind::Errors,
            json!({"network": network.name, "error": rendered}),
        ));
        report.failed.push(FailedJob {
            job_name: "*".to_string(),
            network_name: network.name.clone(),
            chain_id: network.chain_id,
            error: rendered,
        });
    }

    fn finish(&self, outcome: &RunOutcome) {
        if !outcome.warnings.is_empty() {
            self.emitter.emit(Event::new(
                EventKind::Warnings,
                json!({"warnings": outcome.warnings}),
            ));
        }

        let contracts: serde_json::Map<String, Value> = outcome
            .networks
            .iter()
            .map(|run| (run.network.clone(), json!(run.created_contracts)))
            .collect();
        self.emitter.emit(Event::new(
            EventKind::RunSummary,
            json!({
                "completedJobs": outcome.completed,
                "failedJobs": outcome.failed_jobs.len(),
                "skippedJobs": outcome.skipped,
                "cancelled": outcome.cancelled,
                "contracts": contracts,
            }),
        ));

        if outcome.success() {
            self.emitter.emit(Event::new(EventKind::DeploymentCompleted, json!({})));
        } else {
            let error = if outcome.cancelled {
                "deployment cancelled".to_string()
            } else {
                format!("{} job(s) failed", outcome.failed_jobs.len())
            };
            self.emitter.emit(Event::new(
                EventKind::DeploymentFailed,
                json!({
                    "error": error,
                    "failedJobs": serde_json::to_value(&outcome.failed_jobs).unwrap_or_default(),
                }),
            ));
        }
    }
}

fn merge(outcome: &mut RunOutcome, report: NetworkReport) {
    outcome.failed_jobs.extend(report.failed);
    outcome.warnings.extend(report.warnings);
    outcome.cancelled |= report.cancelled;
    outcome.completed += report.completed;
    outcome.skipped += report.skipped;
    outcome.networks.push(report.run);
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
