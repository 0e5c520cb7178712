use crate::types::{
    BalanceProof, ChannelError, ChannelKey, ChannelManager, Ledger, LiveChannel, Result, Token,
};
use async_trait::async_trait;
use ethers::{
    abi::{parse_abi, Detokenize},
    contract::{Contract, ContractCall},
    providers::Middleware,
    types::{Address, BlockNumber, Bytes, Filter, TransactionReceipt, H256, U256},
    utils::id,
};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::debug;

const TOKEN_ABI: &[&str] = &[
    "function name() view returns (string)",
    "function symbol() view returns (string)",
    "function decimals() view returns (uint8)",
    "function balanceOf(address) view returns (uint256)",
    "function approve(address,uint256) returns (bool)",
    "function transfer(address,uint256,bytes) returns (bool)",
    "function mint() payable",
];

const CHANNEL_MANAGER_ABI: &[&str] = &[
    "function createChannelERC20(address,uint192)",
    "function topUpERC20(address,uint32,uint192)",
    "function close(address,uint32,uint192,bytes)",
    "function close(address,uint32,uint192,bytes,bytes)",
    "function settle(address,uint32)",
    "function getChannelInfo(address,address,uint32) view returns (bytes32,uint192,uint32,uint192)",
];

const CLOSE: &str = "close(address,uint32,uint192,bytes)";
const COOPERATIVE_CLOSE: &str = "close(address,uint32,uint192,bytes,bytes)";
const CLOSE_REQUESTED_EVENT: &str = "ChannelCloseRequested(address,address,uint32,uint192)";
const SETTLED_EVENT: &str = "ChannelSettled(address,address,uint32,uint192)";

fn ledger_err(e: impl std::fmt::Display) -> ChannelError {
    ChannelError::Ledger(e.to_string())
}

/// Ledger, token and channel manager backed by an ethers middleware.
///
/// Transactions are sent through the middleware, so it must be able to sign
/// for the accounts used (a `SignerMiddleware` or node-managed accounts).
pub struct EthersNetwork<M> {
    client: Arc<M>,
    token: Contract<M>,
    manager: Contract<M>,
    poll_interval: Duration,
}

impl<M: Middleware + 'static> EthersNetwork<M> {
    pub fn new(
        client: Arc<M>,
        token_address: Address,
        manager_address: Address,
        poll_interval: Duration,
    ) -> Result<Self> {
        let token_abi = parse_abi(TOKEN_ABI).map_err(|e| ChannelError::Config(e.to_string()))?;
        let manager_abi =
            parse_abi(CHANNEL_MANAGER_ABI).map_err(|e| ChannelError::Config(e.to_string()))?;
        Ok(Self {
            token: Contract::new(token_address, token_abi, client.clone()),
            manager: Contract::new(manager_address, manager_abi, client.clone()),
            client,
            poll_interval,
        })
    }

    async fn send<D: Detokenize>(&self, call: ContractCall<M, D>, from: Address) -> Result<H256> {
        let call = call.from(from);
        let pending = call.send().await.map_err(ledger_err)?;
        Ok(pending.tx_hash())
    }

    async fn event_blocks(&self, event: &str, key: &ChannelKey, from_block: u64) -> Result<Vec<u64>> {
        let filter = Filter::new()
            .address(self.manager.address())
            .event(event)
            .topic1(H256::from(key.sender))
            .topic2(H256::from(key.receiver))
            .topic3(H256::from_low_u64_be(u64::from(key.open_block)))
            .from_block(from_block)
            .to_block(BlockNumber::Latest);

        let logs = self.client.get_logs(&filter).await.map_err(ledger_err)?;
        let mut blocks: Vec<u64> = logs
            .iter()
            .filter_map(|log| log.block_number.map(|n| n.as_u64()))
            .collect();
        blocks.sort_unstable();
        Ok(blocks)
    }
}

#[async_trait]
impl<M: Middleware + 'static> Ledger for EthersNetwork<M> {
    async fn transaction_receipt(&self, tx: H256) -> Result<Option<TransactionReceipt>> {
        self.client
            .get_transaction_receipt(tx)
            .await
            .map_err(ledger_err)
    }

    async fn subscribe_blocks(&self) -> Result<mpsc::Receiver<u64>> {
        let mut last = self
            .client
            .get_block_number()
            .await
            .map_err(ledger_err)?
            .as_u64();
        let (sender, receiver) = mpsc::channel(16);
        let client = self.client.clone();
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            loop {
                tokio::select! {
                    _ = sender.closed() => return,
                    _ = ticker.tick() => match client.get_block_number().await {
                        Ok(head) => {
                            while last < head.as_u64() {
                                last += 1;
                                if sender.send(last).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Err(e) => debug!("Block poll failed: {}", e),
                    },
                }
            }
        });
        Ok(receiver)
    }
}

#[async_trait]
impl<M: Middleware + 'static> Token for EthersNetwork<M> {
    fn address(&self) -> Address {
        self.token.address()
    }

    async fn name(&self) -> Result<String> {
        let call = self.token.method::<_, String>("name", ()).map_err(ledger_err)?;
        call.call().await.map_err(ledger_err)
    }

    async fn symbol(&self) -> Result<String> {
        let call = self.token.method::<_, String>("symbol", ()).map_err(ledger_err)?;
        call.call().await.map_err(ledger_err)
    }

    async fn decimals(&self) -> Result<u32> {
        let call = self.token.method::<_, u8>("decimals", ()).map_err(ledger_err)?;
        Ok(u32::from(call.call().await.map_err(ledger_err)?))
    }

    async fn balance_of(&self, account: Address) -> Result<U256> {
        let call = self
            .token
            .method::<_, U256>("balanceOf", account)
            .map_err(ledger_err)?
            .from(account);
        call.call().await.map_err(ledger_err)
    }

    async fn approve(&self, from: Address, spender: Address, amount: U256) -> Result<H256> {
        let call = self
            .token
            .method::<_, bool>("approve", (spender, amount))
            .map_err(ledger_err)?;
        self.send(call, from).await
    }

    async fn transfer_with_data(
        &self,
        from: Address,
        to: Address,
        amount: U256,
        data: Bytes,
    ) -> Result<H256> {
        let call = self
            .token
            .method::<_, bool>("transfer", (to, amount, data))
            .map_err(ledger_err)?;
        self.send(call, from).await
    }

    async fn mint(&self, from: Address, value: U256) -> Result<H256> {
        let call = self
            .token
            .method::<_, ()>("mint", ())
            .map_err(ledger_err)?
            .value(value);
        self.send(call, from).await
    }
}

#[async_trait]
impl<M: Middleware + 'static> ChannelManager for EthersNetwork<M> {
    fn address(&self) -> Address {
        self.manager.address()
    }

    async fn create_channel(
        &self,
        from: Address,
        receiver: Address,
        deposit: U256,
    ) -> Result<H256> {
        let call = self
            .manager
            .method::<_, ()>("createChannelERC20", (receiver, deposit))
            .map_err(ledger_err)?;
        self.send(call, from).await
    }

    async fn top_up(
        &self,
        from: Address,
        receiver: Address,
        open_block: u32,
        deposit: U256,
    ) -> Result<H256> {
        let call = self
            .manager
            .method::<_, ()>("topUpERC20", (receiver, open_block, deposit))
            .map_err(ledger_err)?;
        self.send(call, from).await
    }

    async fn close(
        &self,
        from: Address,
        proof: &BalanceProof,
        sender_signature: &Bytes,
        receiver_signature: Option<&Bytes>,
    ) -> Result<H256> {
        let call = match receiver_signature {
            Some(receiver_signature) => self.manager.method_hash::<_, ()>(
                id(COOPERATIVE_CLOSE),
                (
                    proof.receiver,
                    proof.open_block,
                    proof.balance,
                    sender_signature.clone(),
                    receiver_signature.clone(),
                ),
            ),
            None => self.manager.method_hash::<_, ()>(
                id(CLOSE),
                (
                    proof.receiver,
                    proof.open_block,
                    proof.balance,
                    sender_signature.clone(),
                ),
            ),
        }
        .map_err(ledger_err)?;
        self.send(call, from).await
    }

    async fn settle(&self, from: Address, receiver: Address, open_block: u32) -> Result<H256> {
        let call = self
            .manager
            .method::<_, ()>("settle", (receiver, open_block))
            .map_err(ledger_err)?;
        self.send(call, from).await
    }

    async fn channel_info(&self, key: &ChannelKey) -> Result<LiveChannel> {
        let call = self
            .manager
            .method::<_, ([u8; 32], U256, u32, U256)>(
                "getChannelInfo",
                (key.sender, key.receiver, key.open_block),
            )
            .map_err(ledger_err)?
            .from(key.sender);
        let (channel_key, deposit, settle_block, closing_balance) =
            call.call().await.map_err(ledger_err)?;
        Ok(LiveChannel {
            key: channel_key,
            deposit,
            settle_block,
            closing_balance,
        })
    }

    async fn close_requested_events(&self, key: &ChannelKey, from_block: u64) -> Result<Vec<u64>> {
        self.event_blocks(CLOSE_REQUESTED_EVENT, key, from_block)
            .await
    }

    async fn settled_events(&self, key: &ChannelKey, from_block: u64) -> Result<Vec<u64>> {
        self.event_blocks(SETTLED_EVENT, key, from_block).await
    }
}
