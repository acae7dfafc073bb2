//! # Contract Status
//!
//! ```text
//! OPEN ──accept──▶ FULFILLMENT ──confirm──▶ COMPLETED (terminal)
//!   │                   │
//!   └───────┬───────────┘
//!           ▼
//!        FAILED (terminal, reserved)
//! ```
//!
//! FAILED is part of the transition table so storage and read models already
//! handle it, but no lifecycle operation produces it yet. A timeout sweep or
//! dispute flow would enter it through [`ContractStatus::can_transition_to`].

use serde::{Deserialize, Serialize};

/// Lifecycle status of a delivery contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractStatus {
    /// Listed and awaiting a courier.
    Open,
    /// Accepted; escrow legs exist and the delivery is in progress.
    Fulfillment,
    /// Both parties confirmed completion and escrows were settled.
    Completed,
    /// Abandoned. Reserved; no operation enters this state yet.
    Failed,
}

impl ContractStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [ContractStatus; 4] = [
        Self::Open,
        Self::Fulfillment,
        Self::Completed,
        Self::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Fulfillment => "FULFILLMENT",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Statuses that hold a sensor binding exclusively.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Legal successor statuses.
    pub fn valid_transitions(&self) -> &'static [ContractStatus] {
        match self {
            Self::Open => &[Self::Fulfillment, Self::Failed],
            Self::Fulfillment => &[Self::Completed, Self::Failed],
            Self::Completed | Self::Failed => &[],
        }
    }

    pub fn can_transition_to(&self, to: ContractStatus) -> bool {
        self.valid_transitions().contains(&to)
    }
}

impl std::fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContractStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(Self::Open),
            "FULFILLMENT" => Ok(Self::Fulfillment),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("unknown contract status: {other:?}")),
        }
    }
}
