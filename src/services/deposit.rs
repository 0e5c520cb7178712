use crate::{
    services::{mined_block, InfoResolver, TxWaiter},
    state::ChannelStore,
    types::{Channel, ChannelError, ChannelKey, ChannelManager, Result, Token},
    utils::{
        crypto::{open_channel_data, top_up_data},
        Units,
    },
};
use ethers::types::{Address, TransactionReceipt, H256, U256};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How tokens reach the channel manager. Fixed per token contract.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStrategy {
    /// ERC223 `transfer(address,uint256,bytes)` straight to the channel manager.
    Direct,
    /// ERC20 `approve`, then `createChannel` or `topUp` on the channel manager.
    #[default]
    ApproveAndCall,
}

enum Target {
    Open { receiver: Address },
    TopUp { receiver: Address, open_block: u32 },
}

impl Target {
    fn call_name(&self) -> &'static str {
        match self {
            Target::Open { .. } => "createChannel",
            Target::TopUp { .. } => "topUp",
        }
    }
}

/// Opens channels and tops them up.
#[derive(Clone)]
pub struct DepositCoordinator {
    token: Arc<dyn Token>,
    manager: Arc<dyn ChannelManager>,
    waiter: TxWaiter,
    resolver: InfoResolver,
    store: ChannelStore,
    units: Units,
    strategy: TransferStrategy,
    confirmations: u32,
}

impl DepositCoordinator {
    pub fn new(
        token: Arc<dyn Token>,
        manager: Arc<dyn ChannelManager>,
        waiter: TxWaiter,
        store: ChannelStore,
        units: Units,
        strategy: TransferStrategy,
    ) -> Self {
        Self {
            token,
            resolver: InfoResolver::new(manager.clone()),
            manager,
            waiter,
            store,
            units,
            strategy,
            confirmations: 1,
        }
    }

    pub fn with_confirmations(mut self, confirmations: u32) -> Self {
        self.confirmations = confirmations;
        self
    }

    /// Deposits `deposit` display units into a new channel and stores it with
    /// a zero balance. Nothing is stored unless the deposit is seen on chain.
    pub async fn open(&self, account: Address, receiver: Address, deposit: f64) -> Result<Channel> {
        match self.store.load(account, receiver).await {
            Ok(Some(previous)) if previous.is_valid() => {
                warn!("Already valid channel will be forgotten: {:?}", previous)
            }
            Err(e) => warn!("Replacing unreadable channel record: {}", e),
            _ => {}
        }

        let receipt = self
            .deposit(account, Target::Open { receiver }, deposit)
            .await?;
        let open_block = u32::try_from(mined_block(&receipt)?).map_err(|_| {
            ChannelError::Conversion("open block does not fit uint32".to_string())
        })?;

        let key = ChannelKey {
            sender: account,
            receiver,
            open_block,
        };
        self.resolver.live_deposit(&key).await?;

        let channel = Channel::opened(account, receiver, open_block);
        self.store.save(&channel).await?;
        info!("Opened channel {:?} at block {}", receiver, open_block);
        Ok(channel)
    }

    /// Adds `deposit` display units to the channel and returns the resulting
    /// total deposit in the token's smallest unit. The record is not touched.
    pub async fn top_up(&self, channel: &Channel, deposit: f64) -> Result<U256> {
        let active = channel.active()?;
        let target = Target::TopUp {
            receiver: active.key.receiver,
            open_block: active.key.open_block,
        };
        self.deposit(active.key.sender, target, deposit).await?;

        let info = self.resolver.resolve_key(&active.key).await?;
        info!("Channel {:?} deposit is now {}", active.key.receiver, info.deposit);
        Ok(info.deposit)
    }

    async fn deposit(
        &self,
        from: Address,
        target: Target,
        amount: f64,
    ) -> Result<TransactionReceipt> {
        let required = self.units.to_base(amount)?;
        if required.is_zero() {
            return Err(ChannelError::InvalidAmount(amount));
        }

        let balance = self.token.balance_of(from).await?;
        if balance < required {
            return Err(ChannelError::InsufficientFunds {
                available: self.units.to_display(balance)?,
                required: self.units.to_display(required)?,
            });
        }
        info!(
            "Token balance {:?} {}",
            self.token.address(),
            self.units.to_display(balance)?
        );

        let tx = self.transfer(from, &target, required).await?;
        info!("transferTxHash {:?}", tx);
        self.waiter.wait(tx, self.confirmations).await
    }

    async fn transfer(&self, from: Address, target: &Target, amount: U256) -> Result<H256> {
        let manager = self.manager.address();
        match self.strategy {
            TransferStrategy::Direct => {
                let data = match *target {
                    Target::Open { receiver } => open_channel_data(receiver),
                    Target::TopUp {
                        receiver,
                        open_block,
                    } => top_up_data(receiver, open_block),
                };
                self.token
                    .transfer_with_data(from, manager, amount, data)
                    .await
                    .map_err(|e| ChannelError::rejected("transfer", e))
            }
            TransferStrategy::ApproveAndCall => {
                let approve_tx = self
                    .token
                    .approve(from, manager, amount)
                    .await
                    .map_err(|e| ChannelError::rejected("approve", e))?;
                debug!("approveTxHash {:?}", approve_tx);

                let submitted = match *target {
                    Target::Open { receiver } => {
                        self.manager.create_channel(from, receiver, amount).await
                    }
                    Target::TopUp {
                        receiver,
                        open_block,
                    } => self.manager.top_up(from, receiver, open_block, amount).await,
                };
                submitted.map_err(|e| ChannelError::TransactionRejected {
                    step: target.call_name(),
                    reason: e.to_string(),
                    completed: Some(approve_tx),
                })
            }
        }
    }
}
