//! # Ledger Amounts
//!
//! Contract prices, bonuses and collateral are whole units of the ledger's
//! native currency (XRP). The ledger itself accounts in drops
//! (1 XRP = 1,000,000 drops); conversion is checked.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Drops per whole ledger unit.
pub const DROPS_PER_UNIT: u64 = 1_000_000;

/// A non-negative amount of whole ledger units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Validate a signed amount for the named field.
    pub fn new(field: &'static str, value: i64) -> Result<Self, ValidationError> {
        u64::try_from(value)
            .map(Self)
            .map_err(|_| ValidationError::NegativeAmount { field, value })
    }

    pub fn units(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Convert to ledger drops. `None` on overflow.
    pub fn to_drops(&self) -> Option<u64> {
        self.0.checked_mul(DROPS_PER_UNIT)
    }

    /// Signed view for storage columns. Saturates at `i64::MAX`.
    pub fn as_i64(&self) -> i64 {
        i64::try_from(self.0).unwrap_or(i64::MAX)
    }
}

impl TryFrom<i64> for Amount {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new("amount", value)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        amount.as_i64()
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} XRP", self.0)
    }
}
