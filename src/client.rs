use crate::{
    config::ClientConfig,
    network::{EthersNetwork, WalletSigner},
    services::{CloseCoordinator, DepositCoordinator, InfoResolver, ProofSigner, TxWaiter},
    state::{ChannelStore, JsonFileStore, MemoryStore},
    types::{
        Channel, ChannelError, ChannelInfo, ChannelManager, KeyValueStore, Ledger, Result, Token,
        TokenInfo, TypedDataSigner,
    },
    utils::Units,
};
use ethers::{
    middleware::SignerMiddleware,
    providers::{Http, Provider},
    signers::LocalWallet,
    types::{Address, Bytes, TransactionReceipt, U256},
};
use std::{sync::Arc, time::Duration};
use tracing::info;

/// External systems a [`ChannelClient`] drives.
#[derive(Clone)]
pub struct Collaborators {
    pub ledger: Arc<dyn Ledger>,
    pub token: Arc<dyn Token>,
    pub manager: Arc<dyn ChannelManager>,
    pub signer: Arc<dyn TypedDataSigner>,
    pub storage: Arc<dyn KeyValueStore>,
}

/// Sender side of a unidirectional payment channel.
///
/// Keeps the channel currently worked on in memory; the store and, before any
/// state change, the ledger are the authorities. Lifecycle calls on the same
/// `(account, receiver)` must not overlap.
pub struct ChannelClient {
    units: Units,
    store: ChannelStore,
    token: Arc<dyn Token>,
    waiter: TxWaiter,
    resolver: InfoResolver,
    deposits: DepositCoordinator,
    proofs: ProofSigner,
    closer: CloseCoordinator,
    channel: Option<Channel>,
}

impl ChannelClient {
    pub fn new(config: &ClientConfig, parts: Collaborators) -> Result<Self> {
        config.validate()?;

        let units = Units::new(config.decimals);
        let store = ChannelStore::from_arc(parts.storage);
        let waiter = TxWaiter::new(parts.ledger).with_block_budget(config.block_budget);
        let resolver = InfoResolver::new(parts.manager.clone());

        let deposits = DepositCoordinator::new(
            parts.token.clone(),
            parts.manager.clone(),
            waiter.clone(),
            store.clone(),
            units.clone(),
            config.transfer_strategy,
        )
        .with_confirmations(config.deposit_confirmations);
        let proofs = ProofSigner::new(parts.signer, resolver.clone(), store.clone(), units.clone());
        let closer = CloseCoordinator::new(parts.manager, waiter.clone(), proofs.clone(), units.clone())
            .with_confirmations(config.close_confirmations);

        Ok(Self {
            units,
            store,
            token: parts.token,
            waiter,
            resolver,
            deposits,
            proofs,
            closer,
            channel: None,
        })
    }

    /// Client talking to `config.rpc_url`, sending and signing with `wallet`.
    pub async fn connect(config: &ClientConfig, wallet: LocalWallet) -> Result<Self> {
        let poll_interval = Duration::from_millis(config.poll_interval_ms);
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| ChannelError::Config(e.to_string()))?
            .interval(poll_interval);
        let client = SignerMiddleware::new_with_provider_chain(provider, wallet.clone())
            .await
            .map_err(|e| ChannelError::Ledger(e.to_string()))?;

        let network = Arc::new(EthersNetwork::new(
            Arc::new(client),
            config.token_address,
            config.channel_manager_address,
            poll_interval,
        )?);
        let storage: Arc<dyn KeyValueStore> = match &config.storage_path {
            Some(path) => Arc::new(JsonFileStore::new(path)),
            None => Arc::new(MemoryStore::new()),
        };

        Self::new(
            config,
            Collaborators {
                ledger: network.clone(),
                token: network.clone(),
                manager: network,
                signer: Arc::new(WalletSigner::new(wallet)),
                storage,
            },
        )
    }

    pub fn channel(&self) -> Option<&Channel> {
        self.channel.as_ref()
    }

    pub fn units(&self) -> &Units {
        &self.units
    }

    pub fn is_channel_valid(&self) -> bool {
        self.channel.as_ref().map_or(false, Channel::is_valid)
    }

    fn current(&self) -> Result<Channel> {
        self.channel
            .clone()
            .filter(Channel::is_valid)
            .ok_or(ChannelError::InvalidChannel)
    }

    pub async fn load_stored_channel(
        &mut self,
        account: Address,
        receiver: Address,
    ) -> Result<Option<&Channel>> {
        self.channel = None;
        self.channel = self.store.load(account, receiver).await?;
        Ok(self.channel.as_ref())
    }

    pub async fn set_channel(&mut self, channel: Channel) -> Result<()> {
        self.store.save(&channel).await?;
        self.channel = Some(channel);
        Ok(())
    }

    /// Deletes the stored record of the current channel and drops it from
    /// memory.
    pub async fn forget_stored_channel(&mut self) -> Result<()> {
        if let Some(channel) = self.channel.take() {
            if let Err(e) = self.store.forget(&channel).await {
                self.channel = Some(channel);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Fetches token metadata and adopts its decimals for all conversions.
    pub async fn token_info(&self, account: Address) -> Result<TokenInfo> {
        let name = self.token.name().await?;
        let symbol = self.token.symbol().await?;
        let decimals = self.token.decimals().await?;
        let balance = self.token.balance_of(account).await?;

        self.units.set_decimals(decimals)?;
        Ok(TokenInfo {
            name,
            symbol,
            decimals,
            balance: self.units.to_display(balance)?,
        })
    }

    pub async fn channel_info(&self) -> Result<ChannelInfo> {
        self.resolver.resolve(&self.current()?).await
    }

    pub async fn open_channel(
        &mut self,
        account: Address,
        receiver: Address,
        deposit: f64,
    ) -> Result<Channel> {
        if self.is_channel_valid() {
            info!("Replacing in-memory channel {:?}", self.channel);
        }
        let channel = self.deposits.open(account, receiver, deposit).await?;
        self.channel = Some(channel.clone());
        Ok(channel)
    }

    /// Returns the channel's total deposit after the top-up, in the token's
    /// smallest unit.
    pub async fn top_up_channel(&self, deposit: f64) -> Result<U256> {
        self.deposits.top_up(&self.current()?, deposit).await
    }

    pub async fn sign_balance(&mut self, balance: Option<f64>) -> Result<Bytes> {
        let mut channel = self.current()?;
        let signature = self.proofs.sign_balance(&mut channel, balance).await?;
        self.channel = Some(channel);
        Ok(signature)
    }

    pub async fn increment_balance_and_sign(&mut self, amount: f64) -> Result<Bytes> {
        let mut channel = self.current()?;
        let signature = self
            .proofs
            .increment_balance_and_sign(&mut channel, amount)
            .await?;
        self.channel = Some(channel);
        Ok(signature)
    }

    pub async fn close_channel(&mut self, receiver_signature: Option<Bytes>) -> Result<u64> {
        let mut channel = self.current()?;
        let outcome = self.closer.close(&mut channel, receiver_signature).await;
        // A proof signed on the way is kept even if the close failed.
        self.channel = Some(channel);
        outcome
    }

    pub async fn settle_channel(&self) -> Result<u64> {
        self.closer.settle(&self.current()?).await
    }

    /// Buys test tokens for `value` wei and waits for one confirmation.
    pub async fn mint_tokens(&self, account: Address, value: U256) -> Result<TransactionReceipt> {
        let tx = self
            .token
            .mint(account, value)
            .await
            .map_err(|e| ChannelError::rejected("mint", e))?;
        info!("mintTxHash {:?}", tx);
        self.waiter.wait(tx, 1).await
    }
}
