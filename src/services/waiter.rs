use crate::types::{ChannelError, Ledger, Result};
use ethers::types::{TransactionReceipt, H256};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub const DEFAULT_BLOCK_BUDGET: u32 = 30;

/// Follows a submitted transaction block by block until it is mined and
/// buried under the requested number of confirmations.
#[derive(Clone)]
pub struct TxWaiter {
    ledger: Arc<dyn Ledger>,
    block_budget: u32,
}

impl TxWaiter {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self {
            ledger,
            block_budget: DEFAULT_BLOCK_BUDGET,
        }
    }

    pub fn with_block_budget(mut self, block_budget: u32) -> Self {
        self.block_budget = block_budget;
        self
    }

    /// The block subscription is closed on every return path.
    pub async fn wait(&self, tx: H256, confirmations: u32) -> Result<TransactionReceipt> {
        let mut blocks = self.ledger.subscribe_blocks().await?;
        let outcome = self.watch(&mut blocks, tx, confirmations).await;
        blocks.close();
        outcome
    }

    async fn watch(
        &self,
        blocks: &mut mpsc::Receiver<u64>,
        tx: H256,
        mut confirmations: u32,
    ) -> Result<TransactionReceipt> {
        // Only blocks without a receipt count against the budget.
        let mut budget = self.block_budget;

        while let Some(block) = blocks.recv().await {
            if budget == 0 {
                warn!("!! Tx expired !! {:?}", tx);
                return Err(ChannelError::TransactionTimeout(tx));
            }
            match self.ledger.transaction_receipt(tx).await? {
                Some(receipt) if receipt.block_number.is_some() => {
                    if confirmations == 0 {
                        return Ok(receipt);
                    }
                    debug!("Waiting confirmations... {} (block {})", confirmations, block);
                    confirmations -= 1;
                }
                _ => {
                    budget -= 1;
                    debug!("Waiting tx {:?}.. {}", tx, budget);
                }
            }
        }

        Err(ChannelError::Ledger(format!(
            "block subscription ended while waiting for {:?}",
            tx
        )))
    }
}

pub fn mined_block(receipt: &TransactionReceipt) -> Result<u64> {
    receipt.block_number.map(|n| n.as_u64()).ok_or_else(|| {
        ChannelError::InconsistentState(format!(
            "receipt for {:?} has no block number",
            receipt.transaction_hash
        ))
    })
}
