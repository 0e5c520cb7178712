use crate::types::{ChannelError, Result};
use ethers::{
    types::U256,
    utils::{format_units, parse_units},
};
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

/// Largest exponent `U256` can scale by.
pub const MAX_DECIMALS: u32 = 77;

/// Converts between display amounts and the token's smallest unit.
///
/// Clones share the decimals exponent, so learning the token's real decimals
/// once updates every component holding a copy.
#[derive(Clone, Debug)]
pub struct Units {
    decimals: Arc<AtomicU32>,
}

impl Units {
    pub fn new(decimals: u32) -> Self {
        Self {
            decimals: Arc::new(AtomicU32::new(decimals)),
        }
    }

    pub fn decimals(&self) -> u32 {
        self.decimals.load(Ordering::Relaxed)
    }

    pub fn set_decimals(&self, decimals: u32) -> Result<()> {
        if decimals > MAX_DECIMALS {
            return Err(ChannelError::Conversion(format!(
                "unsupported token decimals {}",
                decimals
            )));
        }
        self.decimals.store(decimals, Ordering::Relaxed);
        Ok(())
    }

    /// `amount × 10^decimals`, floored.
    pub fn to_base(&self, amount: f64) -> Result<U256> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(ChannelError::InvalidAmount(amount));
        }
        let scaled = parse_units(amount, self.decimals())
            .map_err(|e| ChannelError::Conversion(e.to_string()))?;
        Ok(scaled.into())
    }

    /// `value / 10^decimals` as a display amount.
    pub fn to_display(&self, value: U256) -> Result<f64> {
        let formatted = format_units(value, self.decimals())
            .map_err(|e| ChannelError::Conversion(e.to_string()))?;
        formatted
            .parse::<f64>()
            .map_err(|e| ChannelError::Conversion(format!("{}: {}", formatted, e)))
    }
}

impl Default for Units {
    fn default() -> Self {
        Self::new(0)
    }
}
