use crate::{
    services::InfoResolver,
    state::ChannelStore,
    types::{BalanceProof, Channel, ChannelError, ChannelState, Result, TypedDataSigner},
    utils::Units,
};
use ethers::types::Bytes;
use std::sync::Arc;
use tracing::debug;

/// Produces balance proofs and is the only place a channel's balance moves.
#[derive(Clone)]
pub struct ProofSigner {
    signer: Arc<dyn TypedDataSigner>,
    resolver: InfoResolver,
    store: ChannelStore,
    units: Units,
}

impl ProofSigner {
    pub fn new(
        signer: Arc<dyn TypedDataSigner>,
        resolver: InfoResolver,
        store: ChannelStore,
        units: Units,
    ) -> Self {
        Self {
            signer,
            resolver,
            store,
            units,
        }
    }

    /// Signs `balance` (the channel's current balance when `None`).
    ///
    /// A proof for the current balance is cached in the record and reused;
    /// proofs for any other balance are returned without touching the record.
    pub async fn sign_balance(&self, channel: &mut Channel, balance: Option<f64>) -> Result<Bytes> {
        let active = channel.active()?;
        let requested = balance.unwrap_or(active.balance);
        let current = requested == active.balance;

        if current {
            if let Some(signature) = active.signature {
                return Ok(signature);
            }
        }

        let proof = BalanceProof {
            receiver: active.key.receiver,
            open_block: active.key.open_block,
            balance: self.units.to_base(requested)?,
        };
        debug!("signBalance {} {:?}", requested, channel);
        let signature = self
            .signer
            .sign_balance_proof(active.key.sender, &proof)
            .await?;

        if current {
            let updated = Channel {
                signature: Some(signature.clone()),
                ..channel.clone()
            };
            self.store.save(&updated).await?;
            *channel = updated;
        }
        Ok(signature)
    }

    /// Raises the balance by `amount` and signs it, persisting both together.
    /// Fails without changes unless the channel is open and its deposit covers
    /// the new balance.
    pub async fn increment_balance_and_sign(
        &self,
        channel: &mut Channel,
        amount: f64,
    ) -> Result<Bytes> {
        if !(amount.is_finite() && amount > 0.0) {
            return Err(ChannelError::InvalidAmount(amount));
        }
        let active = channel.active()?;
        let new_balance = active.balance + amount;
        if new_balance <= active.balance {
            return Err(ChannelError::InvalidAmount(amount));
        }

        let info = self.resolver.resolve_key(&active.key).await?;
        if info.state != ChannelState::Opened {
            return Err(ChannelError::IllegalTransition {
                operation: "sign on",
                state: info.state.to_string(),
            });
        }
        let available = self.units.to_display(info.deposit)?;
        if new_balance > available || self.units.to_base(new_balance)? > info.deposit {
            return Err(ChannelError::InsufficientFunds {
                available,
                required: new_balance,
            });
        }

        let signature = self.sign_balance(channel, Some(new_balance)).await?;
        let updated = Channel {
            balance: Some(new_balance),
            signature: Some(signature.clone()),
            ..channel.clone()
        };
        self.store.save(&updated).await?;
        *channel = updated;
        Ok(signature)
    }
}
