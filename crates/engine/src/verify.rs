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

//! Post-run bytecode verification of created contracts.
//!
//! Each contract created during the run is fetched back from the chain and
//! matched against the artifact repository by runtime bytecode. Mismatches
//! are warnings, never run failures.

use crate::ExecutionContext;
use catapult_common::{Event, EventEmitter, EventKind};
use serde_json::json;
use tracing::debug;

/// Verify every contract the context created. Returns the warning lines for
/// the end-of-run report.
pub async fn verify_created_contracts(
    ctx: &ExecutionContext,
    emitter: &EventEmitter,
) -> Vec<String> {
    let mut warnings = Vec::new();
    let network = &ctx.network().name;

    for address in ctx.created_contracts() {
        let checksummed = address.to_checksum(None);
        emitter.emit(Event::new(
            EventKind::VerificationStarted,
            json!({"address": checksummed, "network": network}),
        ));

        let code = match ctx.provider().get_code(address).await {
            Ok(code) => code,
            Err(error) => {
                warnings.push(format!(
                    "could not fetch code of {checksummed} on {network}: {error:#}"
                ));
                emitter.emit(Event::new(
                    EventKind::VerificationFailed,
                    json!({"address": checksummed, "network": network, "error": format!("{error:#}")}),
                ));
                continue;
            }
        };

        match ctx.repository().by_deployed_code(&code) {
            Some(artifact) => {
                debug!(address = %checksummed, contract = %artifact.contract_name, "bytecode verified");
                emitter.emit(Event::new(
                    EventKind::VerificationCompleted,
                    json!({
                        "address": checksummed,
                        "network": network,
                        "contractName": artifact.contract_name,
                    }),
                ));
            }
            None => {
                warnings.push(format!(
                    "deployed bytecode at {checksummed} on {network} matches no artifact"
                ));
                emitter.emit(Event::new(
                    EventKind::VerificationFailed,
                    json!({"address": checksummed, "network": network}),
                ));
            }
        }
    }
    warnings
}
