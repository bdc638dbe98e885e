//! Position sizing.
//!
//! Two independent share counts:
//! - fixed-fractional: floor(portfolio * pct_per_trade / entry_price)
//! - volatility-target: floor(portfolio * daily_risk_cap / (k_atr * atr))
//!
//! [`ConservativeSizing`] combines them by taking the smaller count.

/// Floor applied to prices and per-share risk before dividing.
pub const MIN_DIVISOR: f64 = 1e-9;

fn whole_shares(value: f64, divisor: f64) -> i64 {
    let shares = (value / divisor.max(MIN_DIVISOR)).floor();
    // `as` saturates on overflow and maps NaN to 0
    (shares as i64).max(0)
}

pub fn fixed_fractional(portfolio_value: f64, pct_per_trade: f64, entry_price: f64) -> i64 {
    let budget = portfolio_value.max(0.0) * pct_per_trade.max(0.0);
    whole_shares(budget, entry_price)
}

pub fn atr_target(portfolio_value: f64, daily_risk_cap: f64, atr: f64, k_atr: f64) -> i64 {
    let risk_budget = portfolio_value.max(0.0) * daily_risk_cap.max(0.0);
    let unit_risk = k_atr.max(0.0) * atr.max(MIN_DIVISOR);
    whole_shares(risk_budget, unit_risk)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingDecision {
    pub fixed_fractional: i64,
    pub volatility_target: Option<i64>,
    pub shares: i64,
}

/// Sizing policy: the smaller of the fixed-fractional and volatility-target
/// counts. With volatility targeting disabled only the fixed-fractional
/// count applies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConservativeSizing {
    pub pct_per_trade: f64,
    pub daily_risk_cap: f64,
    pub atr_multiplier: f64,
    pub volatility_target: bool,
}

impl Default for ConservativeSizing {
    fn default() -> Self {
        ConservativeSizing {
            pct_per_trade: 0.05,
            daily_risk_cap: 0.005,
            atr_multiplier: 3.0,
            volatility_target: true,
        }
    }
}

impl ConservativeSizing {
    /// Returns `None` when volatility targeting is on but ATR is undefined.
    pub fn size(
        &self,
        portfolio_value: f64,
        entry_price: f64,
        atr: Option<f64>,
    ) -> Option<SizingDecision> {
        let fixed = fixed_fractional(portfolio_value, self.pct_per_trade, entry_price);

        if !self.volatility_target {
            return Some(SizingDecision {
                fixed_fractional: fixed,
                volatility_target: None,
                shares: fixed,
            });
        }

        let atr = atr?;
        let volatility = atr_target(
            portfolio_value,
            self.daily_risk_cap,
            atr,
            self.atr_multiplier,
        );

        Some(SizingDecision {
            fixed_fractional: fixed,
            volatility_target: Some(volatility),
            shares: Self::combine(fixed, volatility),
        })
    }

    pub fn combine(fixed_fractional: i64, volatility_target: i64) -> i64 {
        fixed_fractional.min(volatility_target)
    }
}
