use crate::types::{
    Channel, ChannelError, ChannelInfo, ChannelKey, ChannelManager, ChannelState, Result,
};
use ethers::types::U256;
use std::sync::Arc;

/// Derives a channel's state from the channel manager's event logs and live
/// storage.
///
/// Close and settle events take precedence over live storage: only the logs
/// reveal a close or settle this client never heard about, and a settled
/// channel's storage is gone altogether.
#[derive(Clone)]
pub struct InfoResolver {
    manager: Arc<dyn ChannelManager>,
}

impl InfoResolver {
    pub fn new(manager: Arc<dyn ChannelManager>) -> Self {
        Self { manager }
    }

    pub async fn resolve(&self, channel: &Channel) -> Result<ChannelInfo> {
        let active = channel.active()?;
        self.resolve_key(&active.key).await
    }

    pub async fn resolve_key(&self, key: &ChannelKey) -> Result<ChannelInfo> {
        let open_block = u64::from(key.open_block);

        let closed_at = self
            .manager
            .close_requested_events(key, open_block)
            .await?
            .first()
            .copied();

        let settled_at = self
            .manager
            .settled_events(key, closed_at.unwrap_or(open_block))
            .await?
            .first()
            .copied();

        if let Some(block) = settled_at {
            return Ok(ChannelInfo {
                state: ChannelState::Settled,
                block,
                deposit: U256::zero(),
            });
        }

        let deposit = self.live_deposit(key).await.map_err(|e| match e {
            ChannelError::InconsistentState(_) => ChannelError::InconsistentState(format!(
                "Invalid channel deposit for {:?}",
                key
            )),
            other => other,
        })?;

        Ok(match closed_at {
            Some(block) => ChannelInfo {
                state: ChannelState::Closed,
                block,
                deposit,
            },
            None => ChannelInfo {
                state: ChannelState::Opened,
                block: open_block,
                deposit,
            },
        })
    }

    /// Deposit held by the channel manager; zero is an error.
    pub async fn live_deposit(&self, key: &ChannelKey) -> Result<U256> {
        let live = self.manager.channel_info(key).await?;
        if live.deposit.is_zero() {
            return Err(ChannelError::InconsistentState(format!(
                "No deposit found for {:?}",
                key
            )));
        }
        Ok(live.deposit)
    }
}
