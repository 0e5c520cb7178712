pub mod crypto;
pub mod units;

pub use crypto::{balance_proof_hash, recover_balance_proof_signer};
pub use units::Units;
