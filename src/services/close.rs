use crate::{
    services::{mined_block, InfoResolver, ProofSigner, TxWaiter},
    types::{BalanceProof, Channel, ChannelError, ChannelManager, ChannelState, Result},
    utils::Units,
};
use ethers::types::Bytes;
use std::sync::Arc;
use tracing::info;

/// Closes and settles channels, always against freshly resolved state.
#[derive(Clone)]
pub struct CloseCoordinator {
    manager: Arc<dyn ChannelManager>,
    waiter: TxWaiter,
    resolver: InfoResolver,
    proofs: ProofSigner,
    units: Units,
    confirmations: u32,
}

impl CloseCoordinator {
    pub fn new(
        manager: Arc<dyn ChannelManager>,
        waiter: TxWaiter,
        proofs: ProofSigner,
        units: Units,
    ) -> Self {
        Self {
            resolver: InfoResolver::new(manager.clone()),
            manager,
            waiter,
            proofs,
            units,
            confirmations: 0,
        }
    }

    pub fn with_confirmations(mut self, confirmations: u32) -> Self {
        self.confirmations = confirmations;
        self
    }

    /// Requests a close with the sender's proof for the current balance.
    /// With the receiver's counter-signature the close is cooperative and
    /// settles immediately; without it a challenge period starts.
    ///
    /// Returns the block the close was mined in.
    pub async fn close(
        &self,
        channel: &mut Channel,
        receiver_signature: Option<Bytes>,
    ) -> Result<u64> {
        let active = channel.active()?;
        let state = self.resolver.resolve_key(&active.key).await?.state;
        if state != ChannelState::Opened {
            return Err(ChannelError::IllegalTransition {
                operation: "close",
                state: state.to_string(),
            });
        }
        info!("Closing channel. Cooperative = {}", receiver_signature.is_some());

        let sender_signature = match active.signature {
            Some(signature) => signature,
            None => self.proofs.sign_balance(channel, None).await?,
        };
        let proof = BalanceProof {
            receiver: active.key.receiver,
            open_block: active.key.open_block,
            balance: self.units.to_base(active.balance)?,
        };

        let tx = self
            .manager
            .close(
                active.key.sender,
                &proof,
                &sender_signature,
                receiver_signature.as_ref(),
            )
            .await
            .map_err(|e| ChannelError::rejected("close", e))?;
        info!("closeTxHash {:?}", tx);

        let receipt = self.waiter.wait(tx, self.confirmations).await?;
        mined_block(&receipt)
    }

    /// Settles a channel whose challenge period has ended. Returns the block
    /// the settlement was mined in.
    pub async fn settle(&self, channel: &Channel) -> Result<u64> {
        let active = channel.active()?;
        let state = self.resolver.resolve_key(&active.key).await?.state;
        if state != ChannelState::Closed {
            return Err(ChannelError::IllegalTransition {
                operation: "settle",
                state: state.to_string(),
            });
        }

        let tx = self
            .manager
            .settle(active.key.sender, active.key.receiver, active.key.open_block)
            .await
            .map_err(|e| ChannelError::rejected("settle", e))?;
        info!("settleTxHash {:?}", tx);

        let receipt = self.waiter.wait(tx, self.confirmations).await?;
        mined_block(&receipt)
    }
}
