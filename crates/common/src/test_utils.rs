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

//! Test utilities for scaffolding on-disk project fixtures.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

static FIXTURE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Create a unique empty project directory under the system temp location.
///
/// Each call yields a fresh directory so tests can run in parallel without
/// sharing state. Directories are left behind for post-mortem inspection; the
/// OS temp cleaner reclaims them.
pub fn create_temp_project_dir(label: &str) -> PathBuf {
    let n = FIXTURE_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir()
        .join("catapult-fixtures")
        .join(format!("{label}-{}-{n}", std::process::id()));
    fs::create_dir_all(&dir).expect("failed to create fixture directory");
    dir
}

/// Write a file relative to the project root, creating parent directories.
pub fn write_project_file(root: &Path, rel_path: &str, content: &str) -> PathBuf {
    let path = root.join(rel_path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create fixture subdirectory");
    }
    fs::write(&path, content).expect("failed to write fixture file");
    path
}

/// A minimal artifact JSON body in the naive layout.
pub fn sample_artifact_json(contract_name: &str, bytecode: &str) -> String {
    format!(
        r#"{{
  "contractName": "{contract_name}",
  "sourceName": "src/{contract_name}.sol",
  "abi": [],
  "bytecode": "{bytecode}",
  "deployedBytecode": "{bytecode}"
}}"#
    )
}
