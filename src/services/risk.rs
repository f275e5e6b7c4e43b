//! Tiered stop-loss, take-profit and position sizing.

use crate::config::RiskConfig;
use crate::error::ValidationError;
use crate::types::{PositionSide, RiskParameters};

/// Size ratios for the three take-profit tiers.
pub const TIER_RATIOS: [f64; 3] = [0.5, 0.3, 0.2];

/// Take-profit distance multipliers, nearest first.
const TARGET_MULTIPLIERS: [f64; 3] = [0.5, 1.0, 2.0];

/// Minimum stop distance as a fraction of entry (0.2%).
const MIN_STOP_FRACTION: f64 = 0.002;

/// Largest position as a fraction of the portfolio.
const MAX_POSITION_FRACTION: f64 = 0.5;

fn positive(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ValidationError::InvalidInput { field, value })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ValidationError::InvalidInput { field, value })
    }
}

/// Negative or NaN volatility counts as none.
fn clamp_volatility(volatility: f64) -> f64 {
    if volatility.is_nan() {
        0.0
    } else {
        volatility.max(0.0)
    }
}

/// Stop-loss below (long) or above (short) entry.
pub fn stop_loss(entry: f64, side: PositionSide, volatility: f64) -> Result<f64, ValidationError> {
    let entry = positive("entry", entry)?;
    let volatility = clamp_volatility(volatility);
    let distance = (volatility * entry * 0.5).max(entry * MIN_STOP_FRACTION);
    Ok(entry - side.sign() * distance)
}

/// Three take-profit targets, nearest first.
pub fn take_profit_levels(
    entry: f64,
    side: PositionSide,
    volatility: f64,
    risk_level: f64,
) -> Result<[f64; 3], ValidationError> {
    let entry = positive("entry", entry)?;
    let risk_level = non_negative("risk_level", risk_level)?;
    let base = clamp_volatility(volatility) * entry * (1.0 + risk_level);
    Ok(TARGET_MULTIPLIERS.map(|m| entry + side.sign() * m * base))
}

/// Tier sizes summing to `portfolio_value * risk_level * 0.2`.
pub fn position_sizes(portfolio_value: f64, risk_level: f64) -> Result<[f64; 3], ValidationError> {
    let portfolio_value = positive("portfolio_value", portfolio_value)?;
    let risk_level = non_negative("risk_level", risk_level)?;
    let base = portfolio_value * risk_level * 0.2;
    Ok(TIER_RATIOS.map(|ratio| base * ratio))
}

/// Size that loses `max_risk_pct` of the portfolio (scaled by risk) at the stop.
///
/// Capped at half the portfolio; a zero stop distance yields the cap.
pub fn position_size_from_stop(
    portfolio_value: f64,
    max_risk_pct: f64,
    price: f64,
    stop: f64,
    risk_level: f64,
) -> Result<f64, ValidationError> {
    let portfolio_value = positive("portfolio_value", portfolio_value)?;
    let price = positive("price", price)?;
    let max_risk_pct = non_negative("max_risk_pct", max_risk_pct)?;
    let risk_level = non_negative("risk_level", risk_level)?;
    if !stop.is_finite() {
        return Err(ValidationError::InvalidInput {
            field: "stop",
            value: stop,
        });
    }

    let cap = portfolio_value * MAX_POSITION_FRACTION;
    let distance = (price - stop).abs();
    if distance == 0.0 {
        return Ok(cap);
    }

    let risk_amount = max_risk_pct / 100.0 * portfolio_value * risk_level;
    Ok((risk_amount / distance).min(cap))
}

/// Trailing stop 30% of the open-profit distance behind the current price.
pub fn trailing_stop(
    current: f64,
    entry: f64,
    side: PositionSide,
) -> Result<f64, ValidationError> {
    let current = positive("current", current)?;
    let entry = positive("entry", entry)?;
    let distance = (current - entry).abs() * 0.3;
    Ok(current - side.sign() * distance)
}

/// Shrink a size by up to 40% as volatility rises.
pub fn adjust_for_volatility(base_size: f64, volatility: f64) -> f64 {
    let factor = 1.0 - (clamp_volatility(volatility) * 1.5).min(0.4);
    base_size * factor
}

/// Number of take-profit tiers the current price has reached (0-3).
pub fn scale_out_level(current: f64, entry: f64, side: PositionSide, targets: &[f64; 3]) -> usize {
    let profit = side.sign() * (current - entry) / entry;
    targets
        .iter()
        .take_while(|&&target| profit >= side.sign() * (target - entry) / entry)
        .count()
}

/// Risk functions bound to a portfolio configuration.
#[derive(Debug, Clone)]
pub struct RiskEngine {
    config: RiskConfig,
}

impl RiskEngine {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Stop, targets and tier sizes for one entry.
    pub fn plan(
        &self,
        entry: f64,
        side: PositionSide,
        volatility: f64,
        risk_level: f64,
    ) -> Result<RiskParameters, ValidationError> {
        Ok(RiskParameters {
            stop_loss: stop_loss(entry, side, volatility)?,
            take_profit_levels: take_profit_levels(entry, side, volatility, risk_level)?,
            position_sizes: position_sizes(self.config.portfolio_value, risk_level)?,
        })
    }

    /// Stop-based size using the configured portfolio and risk limit.
    pub fn size_for_stop(
        &self,
        price: f64,
        stop: f64,
        risk_level: f64,
    ) -> Result<f64, ValidationError> {
        position_size_from_stop(
            self.config.portfolio_value,
            self.config.max_risk_pct,
            price,
            stop,
            risk_level,
        )
    }

    /// Apply the configured leverage, keeping the half-portfolio cap.
    pub fn leveraged(&self, size: f64) -> f64 {
        (size * self.config.leverage).min(self.config.portfolio_value * MAX_POSITION_FRACTION)
    }
}

impl Default for RiskEngine {
    fn default() -> Self {
        Self::new(RiskConfig::default())
    }
}
