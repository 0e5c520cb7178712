use crate::types::{BalanceProof, ChannelKey, LiveChannel, Result};
use async_trait::async_trait;
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256};
use tokio::sync::mpsc;

/// Chain access used to follow submitted transactions.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn transaction_receipt(&self, tx: H256) -> Result<Option<TransactionReceipt>>;

    /// Yields the number of every new block. Dropping or closing the
    /// receiver tears the subscription down.
    async fn subscribe_blocks(&self) -> Result<mpsc::Receiver<u64>>;
}

#[async_trait]
pub trait Token: Send + Sync {
    fn address(&self) -> Address;

    async fn name(&self) -> Result<String>;

    async fn symbol(&self) -> Result<String>;

    async fn decimals(&self) -> Result<u32>;

    async fn balance_of(&self, account: Address) -> Result<U256>;

    async fn approve(&self, from: Address, spender: Address, amount: U256) -> Result<H256>;

    /// ERC223 style `transfer(address,uint256,bytes)`.
    async fn transfer_with_data(
        &self,
        from: Address,
        to: Address,
        amount: U256,
        data: Bytes,
    ) -> Result<H256>;

    /// Test-token faucet, paid in wei.
    async fn mint(&self, from: Address, value: U256) -> Result<H256>;
}

#[async_trait]
pub trait ChannelManager: Send + Sync {
    fn address(&self) -> Address;

    async fn create_channel(&self, from: Address, receiver: Address, deposit: U256)
        -> Result<H256>;

    async fn top_up(
        &self,
        from: Address,
        receiver: Address,
        open_block: u32,
        deposit: U256,
    ) -> Result<H256>;

    /// Sends `close(address,uint32,uint192,bytes)` or, with a receiver
    /// signature, `close(address,uint32,uint192,bytes,bytes)`.
    async fn close(
        &self,
        from: Address,
        proof: &BalanceProof,
        sender_signature: &Bytes,
        receiver_signature: Option<&Bytes>,
    ) -> Result<H256>;

    async fn settle(&self, from: Address, receiver: Address, open_block: u32) -> Result<H256>;

    async fn channel_info(&self, key: &ChannelKey) -> Result<LiveChannel>;

    /// Block numbers of matching `ChannelCloseRequested` events, oldest first.
    async fn close_requested_events(&self, key: &ChannelKey, from_block: u64) -> Result<Vec<u64>>;

    /// Block numbers of matching `ChannelSettled` events, oldest first.
    async fn settled_events(&self, key: &ChannelKey, from_block: u64) -> Result<Vec<u64>>;
}

/// Wallet able to produce balance proof signatures for `account`.
#[async_trait]
pub trait TypedDataSigner: Send + Sync {
    async fn sign_balance_proof(&self, account: Address, proof: &BalanceProof) -> Result<Bytes>;
}

/// Persistence medium for channel records.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}
