//! # Payout Policy
//!
//! Maps accumulated drop alerts to how many payout legs the courier earns
//! and whether the collateral is forfeited.
//!
//! | drop alerts | tier | legs released | collateral |
//! |-------------|------|---------------|------------|
//! | 0–2         | 3    | base, tier1, tier2 | returned |
//! | 3–4         | 2    | base, tier1   | returned   |
//! | 5–6         | 1    | base          | returned   |
//! | > 6         | 0    | none          | forfeited  |
//!
//! A contract with no telemetry record settles at tier 3 with the
//! collateral returned.
//!
//! Overtemperature and water counters are recorded but do not affect the
//! payout.

use serde::{Deserialize, Serialize};

use crate::telemetry::SensorTelemetry;

const TIER3_MAX_DROPS: u32 = 2;
const TIER2_MAX_DROPS: u32 = 4;
const TIER1_MAX_DROPS: u32 = 6;

/// Number of payout legs released, 0 through 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayoutTier(u8);

impl PayoutTier {
    pub const NONE: PayoutTier = PayoutTier(0);
    pub const FULL: PayoutTier = PayoutTier(3);

    pub fn value(&self) -> u8 {
        self.0
    }

    /// How many of the base/tier1/tier2 legs to finish, in order.
    pub fn legs_released(&self) -> usize {
        usize::from(self.0)
    }
}

impl std::fmt::Display for PayoutTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What happens to the courier's collateral at settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollateralDisposition {
    /// Cancel the collateral escrow back to the courier.
    ReturnToCourier,
    /// Finish the collateral escrow to the proposer.
    ForfeitToProposer,
}

/// Settlement outcome derived from telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutDecision {
    pub tier: PayoutTier,
    pub collateral: CollateralDisposition,
}

/// Stateless payout rules.
pub struct PayoutPolicy;

impl PayoutPolicy {
    pub fn tier(drop_alerts: u32) -> PayoutTier {
        match drop_alerts {
            d if d <= TIER3_MAX_DROPS => PayoutTier(3),
            d if d <= TIER2_MAX_DROPS => PayoutTier(2),
            d if d <= TIER1_MAX_DROPS => PayoutTier(1),
            _ => PayoutTier::NONE,
        }
    }

    pub fn collateral_forfeited(drop_alerts: u32) -> bool {
        drop_alerts > TIER1_MAX_DROPS
    }

    /// Full decision for a contract's telemetry, if any was recorded.
    pub fn decide(telemetry: Option<&SensorTelemetry>) -> PayoutDecision {
        let drops = telemetry.map(|t| t.drop_alerts).unwrap_or(0);
        PayoutDecision {
            tier: Self::tier(drops),
            collateral: if Self::collateral_forfeited(drops) {
                CollateralDisposition::ForfeitToProposer
            } else {
                CollateralDisposition::ReturnToCourier
            },
        }
    }
}
