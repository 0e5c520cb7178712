use ethers::types::H256;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("No valid channel")]
    InvalidChannel,
    #[error("Insufficient funds: available = {available}, required = {required}")]
    InsufficientFunds { available: f64, required: f64 },
    #[error("Amount must be a positive number, got {0}")]
    InvalidAmount(f64),
    #[error("{step} transaction rejected{}: {reason}", completed_step(.completed))]
    TransactionRejected {
        step: &'static str,
        reason: String,
        /// Hash of the last transaction of the flow that was accepted.
        completed: Option<H256>,
    },
    #[error("Tx expired: {0:?}")]
    TransactionTimeout(H256),
    #[error("Inconsistent on-chain state: {0}")]
    InconsistentState(String),
    #[error("Cannot {operation} a channel in state {state}")]
    IllegalTransition {
        operation: &'static str,
        state: String,
    },
    #[error("Ledger error: {0}")]
    Ledger(String),
    #[error("Signer error: {0}")]
    Signer(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Conversion error: {0}")]
    Conversion(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

fn completed_step(completed: &Option<H256>) -> String {
    match completed {
        Some(tx) => format!(" after {:?} was accepted", tx),
        None => String::new(),
    }
}

impl ChannelError {
    pub(crate) fn rejected(step: &'static str, err: impl std::fmt::Display) -> Self {
        ChannelError::TransactionRejected {
            step,
            reason: err.to_string(),
            completed: None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;
