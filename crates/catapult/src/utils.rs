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

//! Small CLI helpers.

use catapult_engine::RunOutcome;
use eyre::Result;
use std::{fs, path::Path};
use tracing::{info, warn};

/// Write each network's output snapshot to `out/<network>.outputs.json`.
///
/// A write failure is reported as a warning; the run result stands.
pub fn write_outputs(root: &Path, outcome: &RunOutcome) {
    let out_dir = root.join("out");
    if let Err(error) = fs::create_dir_all(&out_dir) {
        warn!(%error, "could not create output directory");
        return;
    }
    for run in &outcome.networks {
        let path = out_dir.join(format!("{}.outputs.json", run.network));
        match serde_json::to_string_pretty(&run.outputs) {
            Ok(rendered) => {
                if let Err(error) = fs::write(&path, rendered) {
                    warn!(file = %path.display(), %error, "could not write outputs");
                } else {
                    info!(file = %path.display(), "outputs written");
                }
            }
            Err(error) => warn!(%error, "could not serialize outputs"),
        }
    }
}

/// Resolve the deployer private key: CLI flag first, then the environment.
pub fn resolve_private_key(flag: Option<String>) -> Result<String> {
    if let Some(key) = flag {
        return Ok(key);
    }
    std::env::var(catapult_common::env::CATAPULT_PRIVATE_KEY).map_err(|_| {
        eyre::eyre!(
            "no private key: pass --private-key or set {}",
            catapult_common::env::CATAPULT_PRIVATE_KEY
        )
    })
}
