//! Sender-side controller for unidirectional off-chain payment channels.
//!
//! A sender locks tokens in the channel manager contract, pays a fixed
//! receiver by signing ever-growing balance proofs off-chain, and finally
//! closes and settles the channel on-chain. [`ChannelClient`] ties the pieces
//! together; the coordinators in [`services`] can also be used on their own.

pub mod client;
pub mod config;
pub mod network;
pub mod services;
pub mod state;
pub mod types;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_utils;

pub use client::{ChannelClient, Collaborators};
pub use config::ClientConfig;
pub use services::{
    CloseCoordinator, DepositCoordinator, InfoResolver, ProofSigner, TransferStrategy, TxWaiter,
};
pub use state::{ChannelStore, JsonFileStore, MemoryStore};
pub use types::{
    BalanceProof, Channel, ChannelError, ChannelInfo, ChannelKey, ChannelState, Result, TokenInfo,
};
