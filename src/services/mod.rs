pub mod close;
pub mod deposit;
pub mod proof;
pub mod resolver;
pub mod waiter;

pub use close::CloseCoordinator;
pub use deposit::{DepositCoordinator, TransferStrategy};
pub use proof::ProofSigner;
pub use resolver::InfoResolver;
pub use waiter::{mined_block, TxWaiter, DEFAULT_BLOCK_BUDGET};
