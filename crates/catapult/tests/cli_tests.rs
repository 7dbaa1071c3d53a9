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

//! CLI smoke tests over on-disk fixture projects.

use assert_cmd::Command;
use catapult_common::test_utils::{create_temp_project_dir, write_project_file};
use predicates::prelude::*;
use std::path::Path;

const NETWORKS: &str = r#"
- name: sepolia
  chainId: 11155111
  rpcUrl: https://rpc.sepolia.org
  testnet: true
"#;

fn scaffold_project(label: &str) -> std::path::PathBuf {
    let root = create_temp_project_dir(label);
    write_project_file(&root, "networks.yaml", NETWORKS);
    write_project_file(
        &root,
        "jobs/deploy.yaml",
        r#"
name: deploy
actions:
  - { type: constant, name: c, value: "42" }
"#,
    );
    write_project_file(
        &root,
        "jobs/configure.yaml",
        r#"
name: configure
depends_on: [deploy]
actions:
  - { type: constant, name: d, value: "{{c.result}}" }
"#,
    );
    root
}

fn catapult(project: &Path) -> Command {
    let mut cmd = Command::cargo_bin("catapult").unwrap();
    cmd.arg("--project").arg(project);
    cmd.env_remove("CATAPULT_PRIVATE_KEY");
    cmd
}

#[test]
fn test_validate_accepts_well_formed_project() {
    let root = scaffold_project("cli-validate");
    catapult(&root)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("project ok"));
}

#[test]
fn test_plan_prints_topological_order() {
    let root = scaffold_project("cli-plan");
    catapult(&root)
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("1. deploy").and(predicate::str::contains("2. configure")));
}

#[test]
fn test_missing_networks_file_fails() {
    let root = create_temp_project_dir("cli-empty");
    catapult(&root)
        .arg("validate")
        .assert()
        .failure()
        .stdout(predicate::str::contains("networks.yaml"));
}

#[test]
fn test_dependency_cycle_fails_validation() {
    let root = create_temp_project_dir("cli-cycle");
    write_project_file(&root, "networks.yaml", NETWORKS);
    write_project_file(&root, "jobs/a.yaml", "name: a\ndepends_on: [b]\nactions: []\n");
    write_project_file(&root, "jobs/b.yaml", "name: b\ndepends_on: [a]\nactions: []\n");

    catapult(&root)
        .arg("validate")
        .assert()
        .failure()
        .stdout(predicate::str::contains("cycle"));
}

#[test]
fn test_run_without_private_key_fails_before_any_network_work() {
    let root = scaffold_project("cli-no-key");
    catapult(&root)
        .arg("run")
        .assert()
        .failure()
        .stdout(predicate::str::contains("private key"));
}

#[test]
fn test_unsupported_js_config_is_reported() {
    let root = scaffold_project("cli-js-config");
    write_project_file(&root, "catapult.config.js", "module.exports = {};");
    catapult(&root)
        .arg("run")
        .assert()
        .failure()
        .stdout(predicate::str::contains("not supported"));
}
