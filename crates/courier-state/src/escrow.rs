//! The four escrow legs attached to an accepted contract.

use serde::{Deserialize, Serialize};

use courier_core::EscrowHandle;

/// Name of one leg, used in logs, read models and storage columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegName {
    Base,
    Tier1,
    Tier2,
    Collateral,
}

impl LegName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Tier1 => "tier1",
            Self::Tier2 => "tier2",
            Self::Collateral => "collateral",
        }
    }
}

impl std::fmt::Display for LegName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payout legs (proposer → courier) in release order, plus the collateral
/// leg (courier → proposer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowLegs {
    pub base: EscrowHandle,
    pub tier1: EscrowHandle,
    pub tier2: EscrowHandle,
    pub collateral: EscrowHandle,
}

impl EscrowLegs {
    /// Assemble from the handles returned by the ledger. `payout` must hold
    /// exactly three handles in base, tier1, tier2 order.
    pub fn from_created(payout: Vec<EscrowHandle>, collateral: EscrowHandle) -> Option<Self> {
        let [base, tier1, tier2]: [EscrowHandle; 3] = payout.try_into().ok()?;
        Some(Self {
            base,
            tier1,
            tier2,
            collateral,
        })
    }

    /// Payout legs in release order.
    pub fn payout(&self) -> [(LegName, &EscrowHandle); 3] {
        [
            (LegName::Base, &self.base),
            (LegName::Tier1, &self.tier1),
            (LegName::Tier2, &self.tier2),
        ]
    }

    /// All four legs.
    pub fn all(&self) -> [(LegName, &EscrowHandle); 4] {
        let [a, b, c] = self.payout();
        [a, b, c, (LegName::Collateral, &self.collateral)]
    }
}
