use crate::types::{BalanceProof, ChannelError, Result};
use ethers::{
    types::{Address, Bytes, RecoveryMessage, Signature, H256, U256},
    utils::keccak256,
};
use serde_json::{json, Value};

pub trait U256Ext {
    fn to_be_bytes_vec(&self) -> Vec<u8>;
}

impl U256Ext for U256 {
    fn to_be_bytes_vec(&self) -> Vec<u8> {
        let mut bytes = [0u8; 32];
        self.to_big_endian(&mut bytes);
        bytes.to_vec()
    }
}

const PROOF_SCHEMA: [&str; 3] = ["address receiver", "uint32 block_created", "uint192 balance"];

fn uint192_max() -> U256 {
    (U256::one() << 192) - 1
}

/// Packed `receiver ‖ uint32 block ‖ uint192 balance`.
pub fn create_proof_message(proof: &BalanceProof) -> Result<Vec<u8>> {
    if proof.balance > uint192_max() {
        return Err(ChannelError::Conversion(format!(
            "balance {} does not fit uint192",
            proof.balance
        )));
    }
    let mut message = Vec::with_capacity(48);
    message.extend_from_slice(proof.receiver.as_bytes());
    message.extend_from_slice(&proof.open_block.to_be_bytes());
    message.extend_from_slice(&proof.balance.to_be_bytes_vec()[8..]);
    Ok(message)
}

/// Legacy typed-data hash the channel contract verifies balance proofs against.
pub fn balance_proof_hash(proof: &BalanceProof) -> Result<H256> {
    let schema_hash = keccak256(PROOF_SCHEMA.concat());
    let values_hash = keccak256(create_proof_message(proof)?);

    let mut message = Vec::with_capacity(64);
    message.extend_from_slice(&schema_hash);
    message.extend_from_slice(&values_hash);
    Ok(H256::from(keccak256(message)))
}

pub fn recover_balance_proof_signer(proof: &BalanceProof, signature: &Bytes) -> Result<Address> {
    let signature = Signature::try_from(signature.as_ref())
        .map_err(|e| ChannelError::Signer(e.to_string()))?;
    let hash = balance_proof_hash(proof)?;
    signature
        .recover(RecoveryMessage::Hash(hash))
        .map_err(|e| ChannelError::Signer(e.to_string()))
}

/// `eth_signTypedData` parameter list for a balance proof.
pub fn typed_data_params(proof: &BalanceProof) -> Value {
    json!([
        { "type": "address", "name": "receiver", "value": format!("{:?}", proof.receiver) },
        { "type": "uint32", "name": "block_created", "value": proof.open_block.to_string() },
        { "type": "uint192", "name": "balance", "value": proof.balance.to_string() },
    ])
}

/// Data payload for a direct transfer that opens a channel.
pub fn open_channel_data(receiver: Address) -> Bytes {
    Bytes::from(receiver.as_bytes().to_vec())
}

/// Data payload for a direct transfer that tops up the channel opened at `open_block`.
pub fn top_up_data(receiver: Address, open_block: u32) -> Bytes {
    let mut data = receiver.as_bytes().to_vec();
    data.extend_from_slice(&open_block.to_be_bytes());
    Bytes::from(data)
}
