use crate::{
    types::{BalanceProof, ChannelError, Result, TypedDataSigner},
    utils::{balance_proof_hash, crypto::typed_data_params},
};
use async_trait::async_trait;
use ethers::{
    providers::Middleware,
    signers::{LocalWallet, Signer},
    types::{Address, Bytes},
};
use std::sync::Arc;
use tracing::debug;

/// Signs balance proofs with a local key.
pub struct WalletSigner {
    wallet: LocalWallet,
}

impl WalletSigner {
    pub fn new(wallet: LocalWallet) -> Self {
        Self { wallet }
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }
}

#[async_trait]
impl TypedDataSigner for WalletSigner {
    async fn sign_balance_proof(&self, account: Address, proof: &BalanceProof) -> Result<Bytes> {
        if account != self.wallet.address() {
            return Err(ChannelError::Signer(format!(
                "no key for account {:?}",
                account
            )));
        }
        let signature = self
            .wallet
            .sign_hash(balance_proof_hash(proof)?)
            .map_err(|e| ChannelError::Signer(e.to_string()))?
            .to_vec();
        debug!("Signed balance proof 0x{}", hex::encode(&signature));
        Ok(Bytes::from(signature))
    }
}

/// Asks the node's (or browser wallet's) account to sign via `eth_signTypedData`.
pub struct RpcSigner<M> {
    client: Arc<M>,
}

impl<M: Middleware + 'static> RpcSigner<M> {
    pub fn new(client: Arc<M>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<M: Middleware + 'static> TypedDataSigner for RpcSigner<M> {
    async fn sign_balance_proof(&self, account: Address, proof: &BalanceProof) -> Result<Bytes> {
        let params = (typed_data_params(proof), account);
        debug!("eth_signTypedData {}", params.0);
        self.client
            .provider()
            .request::<_, Bytes>("eth_signTypedData", params)
            .await
            .map_err(|e| ChannelError::Signer(e.to_string()))
    }
}
