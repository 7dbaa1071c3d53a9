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

//! Narrow RPC provider abstraction.
//!
//! The engine talks to a network exclusively through [`EvmProvider`], so the
//! executor and resolver are testable against the in-memory fake in
//! [`crate::test_utils`]. The production implementation wraps an alloy
//! provider with a wallet filler, so `send_transaction` signs locally and
//! broadcasts in one step.

use alloy_network::{EthereumWallet, TransactionBuilder};
use alloy_primitives::{Address, Bytes, TxKind, B256, U256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use catapult_common::Network;
use eyre::{eyre, Result};
use std::{sync::Arc, time::Duration};
use tracing::debug;

/// A transaction to be signed by the context signer and broadcast.
#[derive(Debug, Clone, Default)]
pub struct TransactionSpec {
    /// Recipient; `None` deploys a contract.
    pub to: Option<Address>,
    /// Wei to transfer.
    pub value: U256,
    /// Calldata or creation code.
    pub data: Bytes,
    /// Gas limit override (falls back to estimation).
    pub gas_limit: Option<u64>,
}

/// The subset of a receipt the engine consumes.
#[derive(Debug, Clone)]
pub struct ReceiptInfo {
    /// Hash of the included transaction.
    pub transaction_hash: B256,
    /// Whether the receipt status was 1.
    pub success: bool,
    /// Block the transaction was included in.
    pub block_number: u64,
    /// Deployed address for creation transactions.
    pub contract_address: Option<Address>,
}

/// Narrow async interface over an EVM RPC endpoint.
#[async_trait]
pub trait EvmProvider: Send + Sync {
    /// `eth_chainId`.
    async fn chain_id(&self) -> Result<u64>;
    /// `eth_getBalance` at the latest block.
    async fn get_balance(&self, address: Address) -> Result<U256>;
    /// `eth_getCode` at the latest block.
    async fn get_code(&self, address: Address) -> Result<Bytes>;
    /// `eth_call` against the latest block.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes>;
    /// Sign with the wallet configured at connect time and broadcast.
    /// Returns the transaction hash; inclusion is a separate wait.
    async fn send_transaction(&self, spec: TransactionSpec) -> Result<B256>;
    /// Broadcast an already-signed transaction.
    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256>;
    /// Block until the transaction is included and return its receipt.
    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<ReceiptInfo>;
    /// Release the underlying connection. Idempotent.
    async fn dispose(&self) -> Result<()>;
}

/// Connects an [`EvmProvider`] for a network. The runner is generic over
/// this so tests can hand out fakes.
#[async_trait]
pub trait ProviderConnector: Send + Sync {
    /// Open a provider for `network`, signing with `signer`.
    async fn connect(
        &self,
        network: &Network,
        signer: PrivateKeySigner,
    ) -> Result<Arc<dyn EvmProvider>>;
}

/// Production provider over an alloy HTTP transport.
pub struct AlloyProvider {
    inner: DynProvider,
    from: Address,
    receipt_poll_interval: Duration,
    receipt_timeout: Duration,
}

impl AlloyProvider {
    /// Connect to `rpc_url` with a wallet filler for `signer`.
    pub async fn connect(
        rpc_url: &str,
        signer: PrivateKeySigner,
        receipt_timeout: Duration,
    ) -> Result<Self> {
        let from = signer.address();
        let wallet = EthereumWallet::from(signer);
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect(rpc_url)
            .await
            .map_err(|e| eyre!("failed to connect to {rpc_url}: {e}"))?;
        Ok(Self {
            inner: provider.erased(),
            from,
            receipt_poll_interval: Duration::from_millis(1500),
            receipt_timeout,
        })
    }
}

#[async_trait]
impl EvmProvider for AlloyProvider {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.inner.get_chain_id().await?)
    }

    async fn get_balance(&self, address: Address) -> Result<U256> {
        Ok(self.inner.get_balance(address).await?)
    }

    async fn get_code(&self, address: Address) -> Result<Bytes> {
        Ok(self.inner.get_code_at(address).await?)
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let request = TransactionRequest::default().with_to(to).with_input(data);
        Ok(self.inner.call(request).await?)
    }

    async fn send_transaction(&self, spec: TransactionSpec) -> Result<B256> {
        let mut request = TransactionRequest::default()
            .with_from(self.from)
            .with_value(spec.value)
            .with_input(spec.data);
        request = match spec.to {
            Some(to) => request.with_to(to),
            None => request.with_kind(TxKind::Create),
        };
        if let Some(gas) = spec.gas_limit {
            request = request.with_gas_limit(gas);
        }
        let pending = self.inner.send_transaction(request).await?;
        Ok(*pending.tx_hash())
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256> {
        let pending = self.inner.send_raw_transaction(&raw).await?;
        Ok(*pending.tx_hash())
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<ReceiptInfo> {
        let deadline = tokio::time::Instant::now() + self.receipt_timeout;
        loop {
            if let Some(receipt) = self.inner.get_transaction_receipt(tx_hash).await? {
                debug!(%tx_hash, block = ?receipt.block_number, "receipt available");
                return Ok(ReceiptInfo {
                    transaction_hash: tx_hash,
                    success: receipt.status(),
                    block_number: receipt.block_number.unwrap_or_default(),
                    contract_address: receipt.contract_address,
                });
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(eyre!(
                    "timed out after {:?} waiting for receipt of {tx_hash}",
                    self.receipt_timeout
                ));
            }
            tokio::time::sleep(self.receipt_poll_interval).await;
        }
    }

    async fn dispose(&self) -> Result<()> {
        // The HTTP transport holds no long-lived connection state.
        Ok(())
    }
}

/// Default connector used by the CLI.
pub struct AlloyConnector {
    /// How long to wait for transaction inclusion before failing the action.
    pub receipt_timeout: Duration,
}

impl Default for AlloyConnector {
    fn default() -> Self {
        Self { receipt_timeout: Duration::from_secs(120) }
    }
}

#[async_trait]
impl ProviderConnector for AlloyConnector {
    async fn connect(
        &self,
        network: &Network,
        signer: PrivateKeySigner,
    ) -> Result<Arc<dyn EvmProvider>> {
        let provider =
            AlloyProvider::connect(&network.rpc_url, signer, self.receipt_timeout).await?;
        Ok(Arc::new(provider))
    }
}
