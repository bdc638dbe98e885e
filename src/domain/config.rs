//! Typed engine configuration.
//!
//! Built from a [`ConfigPort`] and validated before any run starts. Every
//! rejected value names its INI section and key.

use crate::domain::error::EngineError;
use crate::domain::sizing::ConservativeSizing;
use crate::domain::strategy::SignalGenerator;
use crate::domain::strategy::mean_reversion::MeanReversion;
use crate::domain::strategy::trend_crossover::TrendCrossover;
use crate::ports::config_port::ConfigPort;

/// Longest accepted stop cooldown, in calendar days.
pub const MAX_COOLDOWN_DAYS: i64 = 3650;

#[derive(Debug, Clone, PartialEq)]
pub struct MarketFilterConfig {
    pub enable: bool,
    pub sma_window: usize,
    pub symbol: String,
    pub allow_exits_when_closed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationConfig {
    pub enable: bool,
    pub window: usize,
    pub min_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AtrConfig {
    pub enable: bool,
    pub lookback: usize,
    pub multiplier: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskConfig {
    pub cooldown_days: i64,
    pub start_capital: f64,
    pub pct_per_trade: f64,
    pub daily_risk_cap: f64,
    pub max_sector_exposure: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeanReversionConfig {
    pub rsi_window: usize,
    pub buy_rsi: f64,
    pub sell_rsi: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendConfig {
    pub fast: usize,
    pub slow: usize,
    pub confirm_days: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    pub lookback_bars: usize,
    pub min_history: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub market_filter: MarketFilterConfig,
    pub confirmation: ConfirmationConfig,
    pub atr: AtrConfig,
    pub risk: RiskConfig,
    pub mean_reversion: MeanReversionConfig,
    pub trend: TrendConfig,
    pub history: HistoryConfig,
    pub kill_switch_enable: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            market_filter: MarketFilterConfig {
                enable: true,
                sma_window: 200,
                symbol: "SPY".to_string(),
                allow_exits_when_closed: true,
            },
            confirmation: ConfirmationConfig {
                enable: true,
                window: 3,
                min_count: 2,
            },
            atr: AtrConfig {
                enable: true,
                lookback: 14,
                multiplier: 3.0,
            },
            risk: RiskConfig {
                cooldown_days: 1,
                start_capital: 100_000.0,
                pct_per_trade: 0.05,
                daily_risk_cap: 0.005,
                max_sector_exposure: 0.30,
            },
            mean_reversion: MeanReversionConfig {
                rsi_window: 14,
                buy_rsi: 30.0,
                sell_rsi: 55.0,
            },
            trend: TrendConfig {
                fast: 20,
                slow: 100,
                confirm_days: 2,
            },
            history: HistoryConfig {
                lookback_bars: 250,
                min_history: 200,
            },
            kill_switch_enable: true,
        }
    }
}

fn window(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, EngineError> {
    let value = config.get_int(section, key, default as i64);
    if value < 1 {
        return Err(EngineError::invalid(section, key, "must be at least 1"));
    }
    usize::try_from(value).map_err(|_| EngineError::invalid(section, key, "out of range"))
}

fn fraction(section: &str, key: &str, value: f64) -> Result<(), EngineError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(EngineError::invalid(section, key, "must be in (0, 1]"))
    }
}

impl EngineConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, EngineError> {
        let d = EngineConfig::default();

        let symbol = config
            .get_string("market_filter", "symbol")
            .map(|s| s.trim().to_string())
            .unwrap_or(d.market_filter.symbol);
        if symbol.is_empty() {
            return Err(EngineError::invalid("market_filter", "symbol", "must not be empty"));
        }

        let cfg = EngineConfig {
            market_filter: MarketFilterConfig {
                enable: config.get_bool("market_filter", "enable", d.market_filter.enable),
                sma_window: window(config, "market_filter", "sma_window", d.market_filter.sma_window)?,
                symbol,
                allow_exits_when_closed: config.get_bool(
                    "market_filter",
                    "allow_exits_when_closed",
                    d.market_filter.allow_exits_when_closed,
                ),
            },
            confirmation: ConfirmationConfig {
                enable: config.get_bool("confirmation", "enable", d.confirmation.enable),
                window: window(config, "confirmation", "window", d.confirmation.window)?,
                min_count: window(config, "confirmation", "min_count", d.confirmation.min_count)?,
            },
            atr: AtrConfig {
                enable: config.get_bool("atr", "enable", d.atr.enable),
                lookback: window(config, "atr", "lookback", d.atr.lookback)?,
                multiplier: config.get_double("atr", "multiplier", d.atr.multiplier),
            },
            risk: RiskConfig {
                cooldown_days: config.get_int("risk", "cooldown_days", d.risk.cooldown_days),
                start_capital: config.get_double("risk", "start_capital", d.risk.start_capital),
                pct_per_trade: config.get_double("risk", "pct_per_trade", d.risk.pct_per_trade),
                daily_risk_cap: config.get_double("risk", "daily_risk_cap", d.risk.daily_risk_cap),
                max_sector_exposure: config.get_double(
                    "risk",
                    "max_sector_exposure",
                    d.risk.max_sector_exposure,
                ),
            },
            mean_reversion: MeanReversionConfig {
                rsi_window: window(config, "mean_reversion", "rsi_window", d.mean_reversion.rsi_window)?,
                buy_rsi: config.get_double("mean_reversion", "buy_rsi", d.mean_reversion.buy_rsi),
                sell_rsi: config.get_double("mean_reversion", "sell_rsi", d.mean_reversion.sell_rsi),
            },
            trend: TrendConfig {
                fast: window(config, "trend", "fast", d.trend.fast)?,
                slow: window(config, "trend", "slow", d.trend.slow)?,
                confirm_days: window(config, "trend", "confirm_days", d.trend.confirm_days)?,
            },
            history: HistoryConfig {
                lookback_bars: window(config, "engine", "lookback_bars", d.history.lookback_bars)?,
                min_history: window(config, "engine", "min_history", d.history.min_history)?,
            },
            kill_switch_enable: config.get_bool("kill_switch", "enable", d.kill_switch_enable),
        };

        cfg.validate()?;
        Ok(cfg)
    }

    /// Cross-field checks. Also applied to configs built in code.
    pub fn validate(&self) -> Result<(), EngineError> {
        let windows = [
            ("market_filter", "sma_window", self.market_filter.sma_window),
            ("confirmation", "window", self.confirmation.window),
            ("confirmation", "min_count", self.confirmation.min_count),
            ("atr", "lookback", self.atr.lookback),
            ("mean_reversion", "rsi_window", self.mean_reversion.rsi_window),
            ("trend", "fast", self.trend.fast),
            ("trend", "slow", self.trend.slow),
            ("trend", "confirm_days", self.trend.confirm_days),
            ("engine", "lookback_bars", self.history.lookback_bars),
            ("engine", "min_history", self.history.min_history),
        ];
        for (section, key, value) in windows {
            if value < 1 {
                return Err(EngineError::invalid(section, key, "must be at least 1"));
            }
        }

        if self.confirmation.min_count > self.confirmation.window {
            return Err(EngineError::invalid(
                "confirmation",
                "min_count",
                "must not exceed window",
            ));
        }

        if self.atr.multiplier <= 0.0 {
            return Err(EngineError::invalid("atr", "multiplier", "must be positive"));
        }

        if self.risk.start_capital <= 0.0 {
            return Err(EngineError::invalid("risk", "start_capital", "must be positive"));
        }
        if !(0..=MAX_COOLDOWN_DAYS).contains(&self.risk.cooldown_days) {
            return Err(EngineError::invalid(
                "risk",
                "cooldown_days",
                format!("must be between 0 and {MAX_COOLDOWN_DAYS}"),
            ));
        }
        fraction("risk", "pct_per_trade", self.risk.pct_per_trade)?;
        fraction("risk", "daily_risk_cap", self.risk.daily_risk_cap)?;
        fraction("risk", "max_sector_exposure", self.risk.max_sector_exposure)?;

        let mr = &self.mean_reversion;
        for (key, value) in [("buy_rsi", mr.buy_rsi), ("sell_rsi", mr.sell_rsi)] {
            if !(0.0..=100.0).contains(&value) {
                return Err(EngineError::invalid("mean_reversion", key, "must be in [0, 100]"));
            }
        }
        if mr.buy_rsi >= mr.sell_rsi {
            return Err(EngineError::invalid(
                "mean_reversion",
                "buy_rsi",
                "must be below sell_rsi",
            ));
        }

        if self.trend.fast >= self.trend.slow {
            return Err(EngineError::invalid("trend", "fast", "must be below slow"));
        }

        let longest = self.longest_lookback();
        if self.history.min_history < longest {
            return Err(EngineError::invalid(
                "engine",
                "min_history",
                format!("must be at least {longest} (longest strategy lookback)"),
            ));
        }
        if self.history.lookback_bars < self.history.min_history {
            return Err(EngineError::invalid(
                "engine",
                "lookback_bars",
                "must be at least min_history",
            ));
        }

        Ok(())
    }

    pub fn longest_lookback(&self) -> usize {
        let mut longest = self
            .mean_reversion()
            .min_history()
            .max(self.trend_crossover().min_history());
        if self.atr.enable {
            longest = longest.max(self.atr.lookback);
        }
        longest
    }

    pub fn mean_reversion(&self) -> MeanReversion {
        let (confirm_window, confirm_min_count) = if self.confirmation.enable {
            (self.confirmation.window, self.confirmation.min_count)
        } else {
            (1, 1)
        };
        MeanReversion {
            rsi_window: self.mean_reversion.rsi_window,
            buy_rsi: self.mean_reversion.buy_rsi,
            sell_rsi: self.mean_reversion.sell_rsi,
            confirm_window,
            confirm_min_count,
        }
    }

    pub fn trend_crossover(&self) -> TrendCrossover {
        TrendCrossover {
            fast: self.trend.fast,
            slow: self.trend.slow,
            confirm_days: self.trend.confirm_days,
        }
    }

    pub fn sizing(&self) -> ConservativeSizing {
        ConservativeSizing {
            pct_per_trade: self.risk.pct_per_trade,
            daily_risk_cap: self.risk.daily_risk_cap,
            atr_multiplier: self.atr.multiplier,
            volatility_target: self.atr.enable,
        }
    }
}
