pub mod channel;
pub mod error;
pub mod network;

pub use channel::{
    ActiveChannel, BalanceProof, Channel, ChannelInfo, ChannelKey, ChannelState, LiveChannel,
    TokenInfo,
};
pub use error::{ChannelError, Result};
pub use network::{ChannelManager, KeyValueStore, Ledger, Token, TypedDataSigner};
