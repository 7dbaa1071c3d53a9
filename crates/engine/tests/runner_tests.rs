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

//! Integration tests for the job runner: topological ordering, per-network
//! isolation, failure aggregation, disposal, and cancellation.

use catapult_common::{Event, EventEmitter, EventKind};
use catapult_engine::{
    test_utils::{job_yaml, test_network, test_project, FakeConnector, TEST_PRIVATE_KEY},
    CancelToken, PluginRegistry, Runner, RunnerConfig,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracing::info;

fn record_events(emitter: &EventEmitter) -> Arc<Mutex<Vec<Event>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    emitter.on_any(Arc::new(move |event: &Event| {
        sink.lock().unwrap().push(event.clone());
    }));
    events
}

fn runner_config() -> RunnerConfig {
    RunnerConfig { private_key: TEST_PRIVATE_KEY.to_string(), parallel_networks: false }
}

fn count(events: &Arc<Mutex<Vec<Event>>>, kind: EventKind) -> usize {
    events.lock().unwrap().iter().filter(|e| e.kind == kind).count()
}

#[tokio::test]
async fn test_jobs_run_in_dependency_order() {
    catapult_common::logging::ensure_test_logging(None);
    info!("Running test");
    let jobs = vec![
        job_yaml(
            r#"
            name: configure
            depends_on: [deploy]
            actions: [{ type: constant, name: c, value: "{{deploy-marker.result}}" }]
            "#,
        ),
        job_yaml(
            r#"
            name: deploy
            actions: [{ type: constant, name: deploy-marker, value: "done" }]
            "#,
        ),
    ];
    let project = test_project(jobs, vec![], vec![test_network("local", 31337)]);
    let emitter = Arc::new(EventEmitter::new());
    let events = record_events(&emitter);
    let runner = Runner::new(
        Arc::new(project),
        Arc::new(PluginRegistry::new()),
        Arc::clone(&emitter),
        Arc::new(FakeConnector::new()),
        runner_config(),
    );

    let outcome = runner.run(&[], CancelToken::new()).await.unwrap();
    assert!(outcome.success());
    assert_eq!(outcome.completed, 2);

    let started: Vec<String> = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.kind == EventKind::JobStarted)
        .map(|e| e.data.as_ref().unwrap()["job"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(started, vec!["deploy", "configure"]);
    assert_eq!(count(&events, EventKind::DeploymentCompleted), 1);
}

#[tokio::test]
async fn test_job_failure_isolation_across_networks() {
    catapult_common::logging::ensure_test_logging(None);
    info!("Running test");
    // Job A fails on an unresolved reference; job B is independent.
    let jobs = vec![
        job_yaml("{ name: a, actions: [{ type: constant, name: x, value: \"{{missing}}\" }] }"),
        job_yaml("{ name: b, actions: [{ type: constant, name: y, value: \"ok\" }] }"),
    ];
    let networks = vec![test_network("n1", 1001), test_network("n2", 1002)];
    let project = test_project(jobs, vec![], networks);
    let emitter = Arc::new(EventEmitter::new());
    let events = record_events(&emitter);
    let runner = Runner::new(
        Arc::new(project),
        Arc::new(PluginRegistry::new()),
        Arc::clone(&emitter),
        Arc::new(FakeConnector::new()),
        runner_config(),
    );

    let outcome = runner.run(&[], CancelToken::new()).await.unwrap();

    assert!(!outcome.success());
    assert_eq!(outcome.failed_jobs.len(), 2);
    assert!(outcome.failed_jobs.iter().all(|f| f.job_name == "a"));
    assert_eq!(outcome.completed, 2); // b on both networks

    assert_eq!(count(&events, EventKind::JobExecutionFailed), 2);
    assert_eq!(count(&events, EventKind::JobCompleted), 2);
    assert_eq!(count(&events, EventKind::DeploymentFailed), 1);

    let failed_event = events
        .lock()
        .unwrap()
        .iter()
        .find(|e| e.kind == EventKind::DeploymentFailed)
        .cloned()
        .unwrap();
    assert_eq!(failed_event.data.unwrap()["failedJobs"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_network_allowlist_skips_job() {
    catapult_common::logging::ensure_test_logging(None);
    info!("Running test");
    let jobs = vec![job_yaml(
        r#"
        name: mainnet-only
        networks: [mainnet]
        actions: [{ type: constant, name: c, value: "1" }]
        "#,
    )];
    let networks = vec![test_network("mainnet", 1), test_network("testnet", 2)];
    let project = test_project(jobs, vec![], networks);
    let emitter = Arc::new(EventEmitter::new());
    let events = record_events(&emitter);
    let runner = Runner::new(
        Arc::new(project),
        Arc::new(PluginRegistry::new()),
        Arc::clone(&emitter),
        Arc::new(FakeConnector::new()),
        runner_config(),
    );

    let outcome = runner.run(&[], CancelToken::new()).await.unwrap();
    assert!(outcome.success());
    assert_eq!(outcome.completed, 1);
    assert_eq!(outcome.skipped, 1);
    assert_eq!(count(&events, EventKind::JobSkipped), 1);
}

#[tokio::test]
async fn test_chain_id_mismatch_fails_network_setup() {
    catapult_common::logging::ensure_test_logging(None);
    info!("Running test");
    let jobs =
        vec![job_yaml("{ name: j, actions: [{ type: constant, name: c, value: \"1\" }] }")];
    // The descriptor promises chain 5 but the fake endpoint reports 31337.
    let network = test_network("misconfigured", 5);
    let connector = Arc::new(FakeConnector::new());
    connector.provider(&test_network("misconfigured", 31337));

    let project = test_project(jobs, vec![], vec![network]);
    let emitter = Arc::new(EventEmitter::new());
    let events = record_events(&emitter);
    let runner = Runner::new(
        Arc::new(project),
        Arc::new(PluginRegistry::new()),
        Arc::clone(&emitter),
        connector,
        runner_config(),
    );

    let outcome = runner.run(&[], CancelToken::new()).await.unwrap();
    assert!(!outcome.success());
    assert_eq!(outcome.failed_jobs.len(), 1);
    assert!(outcome.failed_jobs[0].error.contains("chain id"));
    assert_eq!(count(&events, EventKind::Errors), 1);
}

#[tokio::test]
async fn test_connect_refusal_is_aggregated_not_fatal() {
    catapult_common::logging::ensure_test_logging(None);
    info!("Running test");
    let jobs =
        vec![job_yaml("{ name: j, actions: [{ type: constant, name: c, value: \"1\" }] }")];
    let networks = vec![test_network("down", 1), test_network("up", 2)];
    let connector = Arc::new(FakeConnector::new());
    connector.refuse("down", "connection refused");

    let project = test_project(jobs, vec![], networks);
    let emitter = Arc::new(EventEmitter::new());
    let runner = Runner::new(
        Arc::new(project),
        Arc::new(PluginRegistry::new()),
        Arc::clone(&emitter),
        connector,
        runner_config(),
    );

    let outcome = runner.run(&[], CancelToken::new()).await.unwrap();
    // The healthy network still completed its job.
    assert_eq!(outcome.completed, 1);
    assert_eq!(outcome.failed_jobs.len(), 1);
    assert!(outcome.failed_jobs[0].error.contains("connection refused"));
}

#[tokio::test]
async fn test_disposal_failure_is_a_warning_not_a_failure() {
    catapult_common::logging::ensure_test_logging(None);
    info!("Running test");
    let jobs =
        vec![job_yaml("{ name: j, actions: [{ type: constant, name: c, value: \"1\" }] }")];
    let network = test_network("local", 31337);
    let connector = Arc::new(FakeConnector::new());
    connector.provider(&network).fail_dispose();

    let project = test_project(jobs, vec![], vec![network]);
    let emitter = Arc::new(EventEmitter::new());
    let events = record_events(&emitter);
    let runner = Runner::new(
        Arc::new(project),
        Arc::new(PluginRegistry::new()),
        Arc::clone(&emitter),
        connector,
        runner_config(),
    );

    let outcome = runner.run(&[], CancelToken::new()).await.unwrap();
    assert!(outcome.success());
    assert!(!outcome.warnings.is_empty());
    assert_eq!(count(&events, EventKind::ContextDisposalWarning), 1);
    // The disposal warning must not mask the successful run.
    assert_eq!(count(&events, EventKind::DeploymentCompleted), 1);
}

#[tokio::test]
async fn test_cancellation_stops_scheduling() {
    catapult_common::logging::ensure_test_logging(None);
    info!("Running test");
    let jobs =
        vec![job_yaml("{ name: j, actions: [{ type: constant, name: c, value: \"1\" }] }")];
    let project = test_project(jobs, vec![], vec![test_network("local", 31337)]);
    let emitter = Arc::new(EventEmitter::new());
    let events = record_events(&emitter);
    let runner = Runner::new(
        Arc::new(project),
        Arc::new(PluginRegistry::new()),
        Arc::clone(&emitter),
        Arc::new(FakeConnector::new()),
        runner_config(),
    );

    let cancel = CancelToken::new();
    cancel.cancel();
    let outcome = runner.run(&[], cancel).await.unwrap();

    assert!(outcome.cancelled);
    assert_eq!(outcome.completed, 0);
    assert_eq!(count(&events, EventKind::JobStarted), 0);
}

#[tokio::test]
async fn test_planning_errors_are_fatal_before_any_network_work() {
    catapult_common::logging::ensure_test_logging(None);
    info!("Running test");
    let jobs = vec![
        job_yaml("{ name: a, depends_on: [b], actions: [] }"),
        job_yaml("{ name: b, depends_on: [a], actions: [] }"),
    ];
    let project = test_project(jobs, vec![], vec![test_network("local", 31337)]);
    let emitter = Arc::new(EventEmitter::new());
    let events = record_events(&emitter);
    let runner = Runner::new(
        Arc::new(project),
        Arc::new(PluginRegistry::new()),
        Arc::clone(&emitter),
        Arc::new(FakeConnector::new()),
        runner_config(),
    );

    let err = runner.run(&[], CancelToken::new()).await.unwrap_err();
    assert!(err.to_string().contains("cycle"));
    assert_eq!(count(&events, EventKind::NetworkStarted), 0);
}

#[tokio::test]
async fn test_unknown_network_selection_is_fatal() {
    catapult_common::logging::ensure_test_logging(None);
    info!("Running test");
    let jobs = vec![job_yaml("{ name: a, actions: [] }")];
    let project = test_project(jobs, vec![], vec![test_network("local", 31337)]);
    let emitter = Arc::new(EventEmitter::new());
    let runner = Runner::new(
        Arc::new(project),
        Arc::new(PluginRegistry::new()),
        Arc::clone(&emitter),
        Arc::new(FakeConnector::new()),
        runner_config(),
    );

    let err = runner.run(&["ghost".to_string()], CancelToken::new()).await.unwrap_err();
    assert!(err.to_string().contains("ghost"));
}

#[tokio::test]
async fn test_deployment_verification_warns_on_unknown_bytecode() {
    catapult_common::logging::ensure_test_logging(None);
    info!("Running test");
    // Deploy through the fake; its synthesized runtime code matches no artifact.
    let jobs = vec![job_yaml(
        r#"
        name: deploy
        actions:
          - { type: send-transaction, name: create, arguments: { to: null, data: "0x6001" } }
        "#,
    )];
    let project = test_project(jobs, vec![], vec![test_network("local", 31337)]);
    let emitter = Arc::new(EventEmitter::new());
    let events = record_events(&emitter);
    let runner = Runner::new(
        Arc::new(project),
        Arc::new(PluginRegistry::new()),
        Arc::clone(&emitter),
        Arc::new(FakeConnector::new()),
        runner_config(),
    );

    let outcome = runner.run(&[], CancelToken::new()).await.unwrap();
    assert!(outcome.failed_jobs.is_empty());
    assert_eq!(count(&events, EventKind::VerificationStarted), 1);
    assert_eq!(count(&events, EventKind::VerificationFailed), 1);
    assert_eq!(count(&events, EventKind::Warnings), 1);
    assert_eq!(outcome.networks[0].created_contracts.len(), 1);
}

#[tokio::test]
async fn test_run_summary_reports_counts() {
    catapult_common::logging::ensure_test_logging(None);
    info!("Running test");
    let jobs = vec![
        job_yaml("{ name: ok, actions: [{ type: constant, name: c, value: \"1\" }] }"),
        job_yaml("{ name: bad, actions: [{ type: constant, name: d, value: \"{{nope}}\" }] }"),
    ];
    let project = test_project(jobs, vec![], vec![test_network("local", 31337)]);
    let emitter = Arc::new(EventEmitter::new());
    let events = record_events(&emitter);
    let runner = Runner::new(
        Arc::new(project),
        Arc::new(PluginRegistry::new()),
        Arc::clone(&emitter),
        Arc::new(FakeConnector::new()),
        runner_config(),
    );

    runner.run(&[], CancelToken::new()).await.unwrap();

    let summary = events
        .lock()
        .unwrap()
        .iter()
        .find(|e| e.kind == EventKind::RunSummary)
        .cloned()
        .unwrap();
    let data = summary.data.unwrap();
    assert_eq!(data["completedJobs"], json!(1));
    assert_eq!(data["failedJobs"], json!(1));
    assert_eq!(data["skippedJobs"], json!(0));
}
