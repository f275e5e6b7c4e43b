use serde::{Deserialize, Serialize};

/// Direction of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// +1 for long, -1 for short.
    pub fn sign(&self) -> f64 {
        match self {
            PositionSide::Long => 1.0,
            PositionSide::Short => -1.0,
        }
    }
}

/// Tiered exit and sizing plan for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskParameters {
    pub stop_loss: f64,
    /// Nearest target first.
    pub take_profit_levels: [f64; 3],
    /// Notional size per tier, in the same order as the targets.
    pub position_sizes: [f64; 3],
}

impl RiskParameters {
    /// Total notional across all tiers.
    pub fn total_size(&self) -> f64 {
        self.position_sizes.iter().sum()
    }
}
