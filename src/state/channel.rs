use crate::types::{Channel, ChannelError, KeyValueStore, Result};
use ethers::types::Address;
use std::sync::Arc;
use tracing::{debug, warn};

/// Holds at most one channel record per `(account, receiver)` pair.
#[derive(Clone)]
pub struct ChannelStore {
    backend: Arc<dyn KeyValueStore>,
}

pub fn channel_key(account: Address, receiver: Address) -> String {
    format!("{:?}|{:?}", account, receiver)
}

impl ChannelStore {
    pub fn new(backend: impl KeyValueStore + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn from_arc(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// A missing record is `Ok(None)`; one that does not decode is
    /// `InvalidChannel`.
    pub async fn load(&self, account: Address, receiver: Address) -> Result<Option<Channel>> {
        let key = channel_key(account, receiver);
        match self.backend.get(&key).await? {
            Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|e| {
                warn!("Unreadable channel record {}: {}", key, e);
                ChannelError::InvalidChannel
            }),
            None => Ok(None),
        }
    }

    /// Overwrites whatever is stored under the channel's own key.
    pub async fn save(&self, channel: &Channel) -> Result<()> {
        let key = record_key(channel)?;
        debug!("Saving channel {}", key);
        self.backend.set(&key, serde_json::to_string(channel)?).await
    }

    pub async fn forget(&self, channel: &Channel) -> Result<()> {
        let key = record_key(channel)?;
        debug!("Forgetting channel {}", key);
        self.backend.delete(&key).await
    }

    pub fn is_valid(channel: &Channel) -> bool {
        channel.is_valid()
    }
}

fn record_key(channel: &Channel) -> Result<String> {
    match (channel.account, channel.receiver) {
        (Some(account), Some(receiver)) => Ok(channel_key(account, receiver)),
        _ => Err(ChannelError::InvalidChannel),
    }
}
