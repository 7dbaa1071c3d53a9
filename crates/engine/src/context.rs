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

//! Per-network execution state: signer, provider, outputs, repository.

use crate::{CancelToken, ContractRepository, EvmProvider};
use alloy_primitives::Address;
use catapult_common::Network;
use eyre::{bail, Result};
use parking_lot::Mutex;
use serde_json::Value;
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use thiserror::Error;
use tracing::trace;

/// Attempt to overwrite an output key. Fatal to the enclosing job.
#[derive(Debug, Clone, Error)]
#[error("output key \"{0}\" is already set")]
pub struct DuplicateOutputKey(pub String);

/// Write-once mapping from dotted keys (`deploy-factory.address`) to resolved
/// values, preserving insertion order for the end-of-run snapshot.
#[derive(Default)]
pub struct OutputStore {
    entries: std::collections::HashMap<String, Value>,
    order: Vec<String>,
}

impl OutputStore {
    /// Store a value. Overwriting an existing key is fatal.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Result<()> {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return Err(DuplicateOutputKey(key).into());
        }
        trace!(%key, "output stored");
        self.order.push(key.clone());
        self.entries.insert(key, value);
        Ok(())
    }

    /// Read a value by exact key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// All keys, in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Snapshot as a JSON object, insertion-ordered.
    pub fn snapshot(&self) -> Value {
        let mut map = serde_json::Map::new();
        for key in &self.order {
            map.insert(key.clone(), self.entries[key].clone());
        }
        Value::Object(map)
    }
}

/// Per-(job set, network) runtime state.
///
/// Exactly one context exists per network run; it owns the provider
/// connection and the output store, shares the read-only contract repository,
/// and must be disposed on every path.
pub struct ExecutionContext {
    network: Network,
    signer_address: Address,
    provider: Arc<dyn EvmProvider>,
    repository: Arc<ContractRepository>,
    cancel: CancelToken,
    outputs: Mutex<OutputStore>,
    completed_jobs: Mutex<HashSet<String>>,
    created_contracts: Mutex<Vec<Address>>,
    disposed: AtomicBool,
}

impl ExecutionContext {
    /// Assemble a context for one network.
    pub fn new(
        network: Network,
        signer_address: Address,
        provider: Arc<dyn EvmProvider>,
        repository: Arc<ContractRepository>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            network,
            signer_address,
            provider,
            repository,
            cancel,
            outputs: Mutex::new(OutputStore::default()),
            completed_jobs: Mutex::new(HashSet::new()),
            created_contracts: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
        }
    }

    /// The network this context executes on.
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Address derived from the context signer.
    pub fn signer_address(&self) -> Address {
        self.signer_address
    }

    /// The RPC provider.
    pub fn provider(&self) -> &Arc<dyn EvmProvider> {
        &self.provider
    }

    /// The shared artifact repository.
    pub fn repository(&self) -> &Arc<ContractRepository> {
        &self.repository
    }

    /// The run's cancellation token.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Store an output value; duplicate keys are fatal.
    pub fn set_output(&self, key: impl Into<String>, value: Value) -> Result<()> {
        self.outputs.lock().set(key, value)
    }

    /// Read an output by exact key.
    pub fn output(&self, key: &str) -> Option<Value> {
        self.outputs.lock().get(key).cloned()
    }

    /// Resolve a dotted identifier against the store: exact key first, then
    /// the longest stored prefix with the remainder as a path into the value.
    pub fn output_by_identifier(&self, identifier: &str) -> Option<Value> {
        let outputs = self.outputs.lock();
        if let Some(value) = outputs.get(identifier) {
            return Some(value.clone());
        }
        let segments: Vec<&str> = identifier.split('.').collect();
        for split in (1..segments.len()).rev() {
            let key = segments[..split].join(".");
            if let Some(value) = outputs.get(&key) {
                let path = segments[split..].join(".");
                return catapult_common::lookup_path(value, &path).cloned();
            }
        }
        None
    }

    /// Insertion-ordered snapshot of every output.
    pub fn outputs_snapshot(&self) -> Value {
        self.outputs.lock().snapshot()
    }

    /// Record a successfully completed job.
    pub fn mark_job_completed(&self, job_name: &str) {
        self.completed_jobs.lock().insert(job_name.to_string());
    }

    /// Whether the named job completed successfully on this network.
    pub fn job_completed(&self, job_name: &str) -> bool {
        self.completed_jobs.lock().contains(job_name)
    }

    /// Record a contract created by a deployment transaction.
    pub fn record_created_contract(&self, address: Address) {
        self.created_contracts.lock().push(address);
    }

    /// Contracts created during this run, in creation order.
    pub fn created_contracts(&self) -> Vec<Address> {
        self.created_contracts.lock().clone()
    }

    /// Release the provider connection. Safe to call more than once; the
    /// runner calls it on every exit path.
    pub async fn dispose(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.provider.dispose().await
    }

    /// Guard against use after disposal.
    pub fn ensure_live(&self) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            bail!("execution context for {} was already disposed", self.network.name);
        }
        Ok(())
    }
}
