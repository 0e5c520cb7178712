//! Client configuration.
//!
//! Loaded from JSON; every field except the two contract addresses has a
//! default.

use crate::services::TransferStrategy;
use crate::types::{ChannelError, Result};
use crate::utils::units::MAX_DECIMALS;
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// JSON-RPC endpoint of the ledger node
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Channel manager contract
    pub channel_manager_address: Address,

    /// Token contract deposits are made in
    pub token_address: Address,

    /// Token decimals, replaced by the on-chain value once token info is fetched
    #[serde(default)]
    pub decimals: u32,

    /// Block arrivals to wait for a transaction to be mined
    #[serde(default = "default_block_budget")]
    pub block_budget: u32,

    /// Confirmations required for deposit transactions
    #[serde(default = "default_deposit_confirmations")]
    pub deposit_confirmations: u32,

    /// Confirmations required for close and settle transactions
    #[serde(default)]
    pub close_confirmations: u32,

    /// Block polling interval of the node adapter
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How deposits reach the channel manager
    #[serde(default)]
    pub transfer_strategy: TransferStrategy,

    /// JSON file for channel records (in-memory when unset)
    #[serde(default)]
    pub storage_path: Option<PathBuf>,
}

fn default_rpc_url() -> String {
    "http://localhost:8545".to_string()
}

fn default_block_budget() -> u32 {
    30
}

fn default_deposit_confirmations() -> u32 {
    1
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl ClientConfig {
    pub fn new(channel_manager_address: Address, token_address: Address) -> Self {
        Self {
            rpc_url: default_rpc_url(),
            channel_manager_address,
            token_address,
            decimals: 0,
            block_budget: default_block_budget(),
            deposit_confirmations: default_deposit_confirmations(),
            close_confirmations: 0,
            poll_interval_ms: default_poll_interval_ms(),
            transfer_strategy: TransferStrategy::default(),
            storage_path: None,
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ChannelError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_budget == 0 {
            return Err(ChannelError::Config("block_budget must be positive".into()));
        }
        if self.decimals > MAX_DECIMALS {
            return Err(ChannelError::Config(format!(
                "decimals must be at most {}",
                MAX_DECIMALS
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(ChannelError::Config("poll_interval_ms must be positive".into()));
        }
        if self.channel_manager_address.is_zero() || self.token_address.is_zero() {
            return Err(ChannelError::Config("contract addresses must be set".into()));
        }
        if self.channel_manager_address == self.token_address {
            return Err(ChannelError::Config(
                "token and channel manager must be distinct contracts".into(),
            ));
        }
        Ok(())
    }
}
