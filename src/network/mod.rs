pub mod provider;
pub mod wallet;

pub use provider::EthersNetwork;
pub use wallet::{RpcSigner, WalletSigner};
