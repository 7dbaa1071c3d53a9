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

//! Test utilities: an in-memory [`EvmProvider`] with programmable responses
//! and helpers for assembling contexts and projects without touching disk.

use crate::{
    CancelToken, ContractRepository, EvmProvider, ExecutionContext, Project, ProviderConnector,
    ReceiptInfo, TransactionSpec,
};
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use catapult_common::{Job, Network, Template};
use eyre::{bail, Result};
use parking_lot::Mutex;
use std::{
    collections::{HashMap, VecDeque},
    path::PathBuf,
    sync::Arc,
};

/// The well-known first Anvil/Hardhat development key.
pub const TEST_PRIVATE_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Deterministic signer for tests.
pub fn test_signer() -> PrivateKeySigner {
    TEST_PRIVATE_KEY.parse().expect("test key is valid")
}

/// A network descriptor pointing nowhere.
pub fn test_network(name: &str, chain_id: u64) -> Network {
    serde_yaml::from_str(&format!(
        "name: {name}\nchainId: {chain_id}\nrpcUrl: http://localhost:0\ntestnet: true\n"
    ))
    .expect("test network parses")
}

#[derive(Default)]
struct FakeState {
    balances: HashMap<Address, U256>,
    code: HashMap<Address, Bytes>,
    call_responses: VecDeque<Bytes>,
    sent: Vec<TransactionSpec>,
    raw_sent: Vec<Bytes>,
    receipts: HashMap<B256, ReceiptInfo>,
    next_block: u64,
    sequence: u64,
    fail_next_send: Option<String>,
    next_status_zero: bool,
    fail_dispose: bool,
    disposed: bool,
}

/// In-memory provider with programmable responses and recorded traffic.
pub struct FakeProvider {
    chain_id: u64,
    state: Mutex<FakeState>,
}

impl FakeProvider {
    /// A provider reporting `chain_id`.
    pub fn new(chain_id: u64) -> Self {
        Self { chain_id, state: Mutex::new(FakeState { next_block: 1, ..Default::default() }) }
    }

    /// Stub an account balance.
    pub fn set_balance(&self, address: Address, balance: U256) {
        self.state.lock().balances.insert(address, balance);
    }

    /// Stub deployed bytecode.
    pub fn set_code(&self, address: Address, code: Bytes) {
        self.state.lock().code.insert(address, code);
    }

    /// Queue a response for the next `eth_call`.
    pub fn push_call_response(&self, data: Bytes) {
        self.state.lock().call_responses.push_back(data);
    }

    /// Make the next send fail with `message`.
    pub fn fail_next_send(&self, message: &str) {
        self.state.lock().fail_next_send = Some(message.to_string());
    }

    /// Make the next transaction's receipt report status 0.
    pub fn next_receipt_reverts(&self) {
        self.state.lock().next_status_zero = true;
    }

    /// Make disposal fail.
    pub fn fail_dispose(&self) {
        self.state.lock().fail_dispose = true;
    }

    /// Transactions sent through this provider, in order.
    pub fn sent_transactions(&self) -> Vec<TransactionSpec> {
        self.state.lock().sent.clone()
    }

    /// Raw transactions broadcast through this provider.
    pub fn raw_transactions(&self) -> Vec<Bytes> {
        self.state.lock().raw_sent.clone()
    }

    /// Whether [`EvmProvider::dispose`] ran.
    pub fn was_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    fn record_send(&self, payload: &[u8], creates: bool) -> Result<B256> {
        let mut state = self.state.lock();
        if let Some(message) = state.fail_next_send.take() {
            bail!("{message}");
        }
        state.sequence += 1;
        let mut preimage = state.sequence.to_be_bytes().to_vec();
        preimage.extend_from_slice(payload);
        let tx_hash = keccak256(&preimage);

        let contract_address = creates
            .then(|| Address::from_slice(&keccak256(tx_hash)[12..]));
        let success = !std::mem::take(&mut state.next_status_zero);
        let block_number = state.next_block;
        state.next_block += 1;
        state.receipts.insert(
            tx_hash,
            ReceiptInfo { transaction_hash: tx_hash, success, block_number, contract_address },
        );
        // Deployed fakes report a marker byte so contract-exists is true.
        if let Some(address) = contract_address {
            state.code.entry(address).or_insert_with(|| Bytes::from(vec![0xfe]));
        }
        Ok(tx_hash)
    }
}

#[async_trait]
impl EvmProvider for FakeProvider {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }

    async fn get_balance(&self, address: Address) -> Result<U256> {
        Ok(self.state.lock().balances.get(&address).copied().unwrap_or(U256::ZERO))
    }

    async fn get_code(&self, address: Address) -> Result<Bytes> {
        Ok(self.state.lock().code.get(&address).cloned().unwrap_or_default())
    }

    async fn call(&self, _to: Address, _data: Bytes) -> Result<Bytes> {
        self.state
            .lock()
            .call_responses
            .pop_front()
            .ok_or_else(|| eyre::eyre!("no stubbed call response left"))
    }

    async fn send_transaction(&self, spec: TransactionSpec) -> Result<B256> {
        let creates = spec.to.is_none();
        let hash = self.record_send(&spec.data, creates)?;
        self.state.lock().sent.push(spec);
        Ok(hash)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256> {
        let hash = self.record_send(&raw, false)?;
        self.state.lock().raw_sent.push(raw);
        Ok(hash)
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<ReceiptInfo> {
        self.state
            .lock()
            .receipts
            .get(&tx_hash)
            .cloned()
            .ok_or_else(|| eyre::eyre!("unknown transaction {tx_hash}"))
    }

    async fn dispose(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.disposed = true;
        if state.fail_dispose {
            bail!("simulated disposal failure");
        }
        Ok(())
    }
}

/// Hands out one [`FakeProvider`] per network name.
#[derive(Default)]
pub struct FakeConnector {
    providers: Mutex<HashMap<String, Arc<FakeProvider>>>,
    refuse: Mutex<HashMap<String, String>>,
}

impl FakeConnector {
    /// An empty connector; providers are created on demand.
    pub fn new() -> Self {
        Self::default()
    }

    /// The provider for `network`, creating it if needed.
    pub fn provider(&self, network: &Network) -> Arc<FakeProvider> {
        Arc::clone(
            self.providers
                .lock()
                .entry(network.name.clone())
                .or_insert_with(|| Arc::new(FakeProvider::new(network.chain_id))),
        )
    }

    /// Make connecting to `network_name` fail.
    pub fn refuse(&self, network_name: &str, message: &str) {
        self.refuse.lock().insert(network_name.to_string(), message.to_string());
    }
}

#[async_trait]
impl ProviderConnector for FakeConnector {
    async fn connect(
        &self,
        network: &Network,
        _signer: PrivateKeySigner,
    ) -> Result<Arc<dyn EvmProvider>> {
        if let Some(message) = self.refuse.lock().get(&network.name) {
            bail!("{message}");
        }
        Ok(self.provider(network))
    }
}

/// A context over a fresh fake provider, for executor and resolver tests.
pub fn test_context(network: Network) -> (ExecutionContext, Arc<FakeProvider>) {
    let provider = Arc::new(FakeProvider::new(network.chain_id));
    let ctx = ExecutionContext::new(
        network,
        test_signer().address(),
        Arc::clone(&provider) as Arc<dyn EvmProvider>,
        Arc::new(ContractRepository::new()),
        CancelToken::new(),
    );
    (ctx, provider)
}

/// An in-memory project with no artifacts.
pub fn test_project(jobs: Vec<Job>, templates: Vec<Template>, networks: Vec<Network>) -> Project {
    Project {
        root: PathBuf::from("."),
        jobs,
        templates: templates.into_iter().map(|t| (t.name.clone(), t)).collect(),
        networks,
        repository: Arc::new(ContractRepository::new()),
    }
}

/// Parse a job from inline YAML.
pub fn job_yaml(yaml: &str) -> Job {
    serde_yaml::from_str(yaml).expect("job yaml parses")
}

/// Parse a template from inline YAML.
pub fn template_yaml(yaml: &str) -> Template {
    serde_yaml::from_str(yaml).expect("template yaml parses")
}
