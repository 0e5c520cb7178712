use crate::types::{ChannelError, Result};
use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Locally persisted record of a payment channel.
///
/// Every field is optional on disk so that partial or hand-edited records
/// still load; [`Channel::active`] is the gate every channel operation goes
/// through.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub account: Option<Address>,
    pub receiver: Option<Address>,
    #[serde(rename = "block")]
    pub open_block: Option<u32>,
    /// Cumulative amount authorized to the receiver, in display units.
    pub balance: Option<f64>,
    /// Balance proof produced for exactly `balance`.
    #[serde(rename = "sign", default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Bytes>,
}

impl Channel {
    pub fn opened(account: Address, receiver: Address, open_block: u32) -> Self {
        Self {
            account: Some(account),
            receiver: Some(receiver),
            open_block: Some(open_block),
            balance: Some(0.0),
            signature: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.active().is_ok()
    }

    pub fn active(&self) -> Result<ActiveChannel> {
        match (self.account, self.receiver, self.open_block, self.balance) {
            (Some(account), Some(receiver), Some(open_block), Some(balance))
                if open_block > 0 && balance.is_finite() && balance >= 0.0 =>
            {
                Ok(ActiveChannel {
                    key: ChannelKey {
                        sender: account,
                        receiver,
                        open_block,
                    },
                    balance,
                    signature: self.signature.clone(),
                })
            }
            _ => Err(ChannelError::InvalidChannel),
        }
    }
}

/// A channel record that passed validation.
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveChannel {
    pub key: ChannelKey,
    pub balance: f64,
    pub signature: Option<Bytes>,
}

impl From<ActiveChannel> for Channel {
    fn from(active: ActiveChannel) -> Self {
        Self {
            account: Some(active.key.sender),
            receiver: Some(active.key.receiver),
            open_block: Some(active.key.open_block),
            balance: Some(active.balance),
            signature: active.signature,
        }
    }
}

/// On-chain identity of a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChannelKey {
    pub sender: Address,
    pub receiver: Address,
    pub open_block: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelState {
    Opened,
    Closed,
    Settled,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelState::Opened => "opened",
            ChannelState::Closed => "closed",
            ChannelState::Settled => "settled",
        };
        f.write_str(name)
    }
}

/// Channel state as resolved from the ledger. Never cached.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub state: ChannelState,
    pub block: u64,
    /// Deposit in the token's smallest unit.
    pub deposit: U256,
}

/// Result of the channel manager's `getChannelInfo`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LiveChannel {
    pub key: [u8; 32],
    pub deposit: U256,
    pub settle_block: u32,
    pub closing_balance: U256,
}

/// The tuple a sender signs to let the receiver withdraw up to `balance`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BalanceProof {
    pub receiver: Address,
    pub open_block: u32,
    /// Smallest-unit balance, encoded on the wire as `uint192`.
    pub balance: U256,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    /// Display-unit balance of the queried account.
    pub balance: f64,
}
