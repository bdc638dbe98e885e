//! End-of-day decision orchestrator.
//!
//! One run evaluates the whole universe for exactly one trading date:
//! `GateCheck -> PerSymbolLoop -> StatisticsCommit -> Done`. Expected filter
//! outcomes are tallied as [`FilterReason`]s; only storage failures abort.

use crate::domain::config::EngineConfig;
use crate::domain::cooldown::cooldown_active;
use crate::domain::error::EngineError;
use crate::domain::exposure::SectorBook;
use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::{closes, PriceBar};
use crate::domain::order::{Order, OrderSide};
use crate::domain::regime::{read_gate, GateReading, GateSource, RunStatistics};
use crate::domain::strategy::{
    resolve, Direction, Evaluation, SignalGenerator, StrategyKind, StrategySignal,
};
use crate::domain::universe::{tradable, UniverseMember};
use crate::ports::data_port::MarketDataPort;
use crate::ports::ledger_port::LedgerPort;
use crate::ports::risk_port::RiskPort;
use crate::ports::EngineStore;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Strength recorded with every strategy signal.
pub const SIGNAL_STRENGTH: f64 = 1.0;

/// Borrowed port handles for one run.
#[derive(Clone, Copy)]
pub struct Ports<'a> {
    pub data: &'a dyn MarketDataPort,
    pub risk: &'a dyn RiskPort,
    pub ledger: &'a dyn LedgerPort,
}

impl<'a> Ports<'a> {
    pub fn from_store(store: &'a dyn EngineStore) -> Self {
        Ports {
            data: store.as_data(),
            risk: store.as_risk(),
            ledger: store.as_ledger(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    GateCheck,
    PerSymbolLoop,
    StatisticsCommit,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::GateCheck => "gate-check",
            RunPhase::PerSymbolLoop => "per-symbol-loop",
            RunPhase::StatisticsCommit => "statistics-commit",
            RunPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Why a candidate produced no order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FilterReason {
    Cooldown,
    InsufficientHistory,
    StaleData,
    GateClosed,
    KillSwitch,
    IndicatorUndefined,
    ZeroQuantity,
    SectorCap,
}

impl FilterReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterReason::Cooldown => "cooldown",
            FilterReason::InsufficientHistory => "insufficient-history",
            FilterReason::StaleData => "stale-data",
            FilterReason::GateClosed => "gate-closed",
            FilterReason::KillSwitch => "kill-switch",
            FilterReason::IndicatorUndefined => "indicator-undefined",
            FilterReason::ZeroQuantity => "zero-quantity",
            FilterReason::SectorCap => "sector-cap",
        }
    }
}

impl fmt::Display for FilterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolOutcome {
    Filtered(FilterReason),
    Hold,
    /// A buy or sell recorded without an order (signals-only mode).
    Signalled(Direction),
    Ordered { side: OrderSide, quantity: i64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub signals_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
        }
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(RunStatus::Completed),
            other => Err(format!("unknown run status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub trade_date: NaiveDate,
    pub run_timestamp: NaiveDateTime,
    pub status: RunStatus,
}

/// Gate state in force for the per-symbol loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateDecision {
    pub gate_open: bool,
    pub source: GateSource,
    pub kill_switch: bool,
    pub entries_allowed: bool,
    pub exits_allowed: bool,
}

impl GateDecision {
    fn entry_block(&self) -> FilterReason {
        if self.kill_switch {
            FilterReason::KillSwitch
        } else {
            FilterReason::GateClosed
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub trade_date: NaiveDate,
    pub gate: GateDecision,
    pub total_candidates: usize,
    pub filtered_candidates: usize,
    pub signals_generated: usize,
    pub orders_created: usize,
    pub filter_counts: BTreeMap<FilterReason, usize>,
}

impl RunSummary {
    fn new(trade_date: NaiveDate, gate: GateDecision) -> Self {
        RunSummary {
            trade_date,
            gate,
            total_candidates: 0,
            filtered_candidates: 0,
            signals_generated: 0,
            orders_created: 0,
            filter_counts: BTreeMap::new(),
        }
    }

    fn record(&mut self, outcome: &SymbolOutcome) {
        self.total_candidates += 1;
        match outcome {
            SymbolOutcome::Filtered(reason) => {
                self.filtered_candidates += 1;
                *self.filter_counts.entry(*reason).or_insert(0) += 1;
            }
            SymbolOutcome::Ordered { .. } => self.orders_created += 1,
            SymbolOutcome::Hold | SymbolOutcome::Signalled(_) => {}
        }
    }

    pub fn statistics(&self) -> RunStatistics {
        RunStatistics {
            total_candidates: self.total_candidates,
            filtered_candidates: self.filtered_candidates,
        }
    }

    pub fn filtered(&self, reason: FilterReason) -> usize {
        self.filter_counts.get(&reason).copied().unwrap_or(0)
    }
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

pub struct EodEngine<'a> {
    config: &'a EngineConfig,
    ports: Ports<'a>,
    options: RunOptions,
}

impl<'a> EodEngine<'a> {
    pub fn new(config: &'a EngineConfig, ports: Ports<'a>, options: RunOptions) -> Self {
        EodEngine {
            config,
            ports,
            options,
        }
    }

    /// The requested date, or the latest session in the store.
    pub fn resolve_trade_date(
        &self,
        requested: Option<NaiveDate>,
    ) -> Result<Option<NaiveDate>, EngineError> {
        match requested {
            Some(date) => Ok(Some(date)),
            None => self.ports.data.latest_session(),
        }
    }

    pub fn run(&self, date: NaiveDate) -> Result<RunSummary, EngineError> {
        info!("run {date}: phase {}", RunPhase::GateCheck);
        let gate = self.gate_check(date)?;

        info!("run {date}: phase {}", RunPhase::PerSymbolLoop);
        let universe = tradable(
            self.ports.data.list_universe()?,
            &self.config.market_filter.symbol,
        );
        let mut summary = RunSummary::new(date, gate);
        let mut book = SectorBook::new();

        for member in &universe {
            let outcome = self.evaluate_symbol(member, date, &gate, &mut book, &mut summary)?;
            debug!("{} {date}: {outcome:?}", member.symbol);
            summary.record(&outcome);
        }

        info!("run {date}: phase {}", RunPhase::StatisticsCommit);
        let stats = summary.statistics();
        self.ports.ledger.update_statistics(date, &stats)?;
        self.ports.ledger.record_run(&RunRecord {
            trade_date: date,
            run_timestamp: now(),
            status: RunStatus::Completed,
        })?;

        info!(
            "run {date}: phase {} ({} candidates, {} filtered, {:.1}% filtered, {} orders)",
            RunPhase::Done,
            stats.total_candidates,
            stats.filtered_candidates,
            stats.pct_filtered(),
            summary.orders_created
        );
        Ok(summary)
    }

    fn gate_check(&self, date: NaiveDate) -> Result<GateDecision, EngineError> {
        let filter = &self.config.market_filter;
        let lookback = self.config.history.lookback_bars.max(filter.sma_window);
        let reference = self.ports.data.fetch_bars(&filter.symbol, date, lookback)?;

        let (gate_open, source) = match read_gate(&reference, date, filter.sma_window) {
            GateReading::Computed {
                reference_close,
                reference_ma,
                open,
            } => {
                self.ports.ledger.upsert_gate(
                    date,
                    Some(reference_close),
                    Some(reference_ma),
                    open,
                )?;
                info!(
                    "gate {date}: {} close {reference_close:.2} vs SMA({}) {reference_ma:.2}",
                    if open { "open" } else { "closed" },
                    filter.sma_window
                );
                (open, GateSource::Computed)
            }
            GateReading::Unavailable { reason } => match self.ports.ledger.market_state(date)? {
                Some(cached) => {
                    warn!("gate {date}: {reason}; using cached gate {}", cached.gate);
                    (cached.gate, GateSource::Cached)
                }
                None => {
                    warn!("gate {date}: {reason}; treating gate as closed");
                    self.ports.ledger.upsert_gate(date, None, None, false)?;
                    (false, GateSource::FailSafe)
                }
            },
        };

        let kill_switch = if self.config.kill_switch_enable {
            match self.ports.risk.kill_switch(date)? {
                Some(state) if state.active => {
                    warn!(
                        "kill switch active for {date}: {}",
                        state.reason.as_deref().unwrap_or("no reason recorded")
                    );
                    true
                }
                _ => false,
            }
        } else {
            false
        };

        let gate_blocks = filter.enable && !gate_open;
        Ok(GateDecision {
            gate_open,
            source,
            kill_switch,
            entries_allowed: !gate_blocks && !kill_switch,
            exits_allowed: !gate_blocks || filter.allow_exits_when_closed,
        })
    }

    fn evaluate_symbol(
        &self,
        member: &UniverseMember,
        date: NaiveDate,
        gate: &GateDecision,
        book: &mut SectorBook,
        summary: &mut RunSummary,
    ) -> Result<SymbolOutcome, EngineError> {
        let symbol = member.symbol.as_str();

        if cooldown_active(self.ports.risk, symbol, date, self.config.risk.cooldown_days)? {
            return Ok(SymbolOutcome::Filtered(FilterReason::Cooldown));
        }

        let bars = self
            .ports
            .data
            .fetch_bars(symbol, date, self.config.history.lookback_bars)?;
        if bars.len() < self.config.history.min_history {
            return Ok(SymbolOutcome::Filtered(FilterReason::InsufficientHistory));
        }
        if bars.last().map(|b| b.date) != Some(date) {
            return Ok(SymbolOutcome::Filtered(FilterReason::StaleData));
        }

        let prices = closes(&bars);
        let mean_reversion = self.config.mean_reversion();
        let trend = self.config.trend_crossover();
        let generators: [&dyn SignalGenerator; 2] = [&mean_reversion, &trend];

        let mut directions = Vec::with_capacity(generators.len());
        for generator in generators {
            match generator.evaluate(&prices) {
                Evaluation::Signal(direction) => directions.push((generator.kind(), direction)),
                Evaluation::InsufficientHistory { have, need } => {
                    debug!("{symbol}: {} needs {need} bars, have {have}", generator.kind());
                    return Ok(SymbolOutcome::Filtered(FilterReason::InsufficientHistory));
                }
            }
        }

        for &(strategy, direction) in &directions {
            self.ports.ledger.upsert_signal(&StrategySignal {
                date,
                symbol: symbol.to_string(),
                strategy,
                direction,
                strength: SIGNAL_STRENGTH,
            })?;
        }

        let resolution = resolve(&directions);
        match (resolution.direction, resolution.strategy) {
            (Direction::Buy, Some(strategy)) => {
                summary.signals_generated += 1;
                self.enter(member, &bars, date, strategy, gate, book)
            }
            (Direction::Sell, Some(strategy)) => {
                summary.signals_generated += 1;
                self.exit(symbol, date, strategy, gate)
            }
            _ if !gate.entries_allowed => Ok(SymbolOutcome::Filtered(gate.entry_block())),
            _ => Ok(SymbolOutcome::Hold),
        }
    }

    fn enter(
        &self,
        member: &UniverseMember,
        bars: &[PriceBar],
        date: NaiveDate,
        strategy: StrategyKind,
        gate: &GateDecision,
        book: &mut SectorBook,
    ) -> Result<SymbolOutcome, EngineError> {
        if !gate.entries_allowed {
            return Ok(SymbolOutcome::Filtered(gate.entry_block()));
        }
        if self.options.signals_only {
            return Ok(SymbolOutcome::Signalled(Direction::Buy));
        }

        let Some(price) = bars.last().map(|b| b.close) else {
            return Ok(SymbolOutcome::Filtered(FilterReason::InsufficientHistory));
        };
        let atr = if self.config.atr.enable {
            IndicatorSeries::compute(bars, IndicatorType::Atr(self.config.atr.lookback)).latest()
        } else {
            None
        };

        let capital = self.config.risk.start_capital;
        let Some(decision) = self.config.sizing().size(capital, price, atr) else {
            return Ok(SymbolOutcome::Filtered(FilterReason::IndicatorUndefined));
        };
        if decision.shares <= 0 {
            return Ok(SymbolOutcome::Filtered(FilterReason::ZeroQuantity));
        }

        let sector = member.sector_key();
        let candidate_value = decision.shares as f64 * price;
        let held = self.ports.risk.sector_exposure(sector)?;
        if !book.approves(
            sector,
            held,
            capital,
            candidate_value,
            self.config.risk.max_sector_exposure,
        ) {
            debug!(
                "{}: sector '{sector}' cap reached (held {held:.2}, pending {:.2}, candidate {candidate_value:.2})",
                member.symbol,
                book.pending(sector)
            );
            return Ok(SymbolOutcome::Filtered(FilterReason::SectorCap));
        }

        let order = Order::entry(date, &member.symbol, decision.shares, strategy, now());
        self.ports.ledger.append_order(&order)?;
        book.commit(sector, candidate_value);

        Ok(SymbolOutcome::Ordered {
            side: OrderSide::Buy,
            quantity: decision.shares,
        })
    }

    fn exit(
        &self,
        symbol: &str,
        date: NaiveDate,
        strategy: StrategyKind,
        gate: &GateDecision,
    ) -> Result<SymbolOutcome, EngineError> {
        if !gate.exits_allowed {
            return Ok(SymbolOutcome::Filtered(FilterReason::GateClosed));
        }
        if self.options.signals_only {
            return Ok(SymbolOutcome::Signalled(Direction::Sell));
        }

        let order = Order::exit(date, symbol, strategy, now());
        self.ports.ledger.append_order(&order)?;
        Ok(SymbolOutcome::Ordered {
            side: OrderSide::Sell,
            quantity: order.quantity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(entries_allowed: bool, kill_switch: bool) -> GateDecision {
        GateDecision {
            gate_open: !kill_switch && entries_allowed,
            source: GateSource::Computed,
            kill_switch,
            entries_allowed,
            exits_allowed: true,
        }
    }

    #[test]
    fn summary_tallies_outcomes() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let mut summary = RunSummary::new(date, decision(true, false));

        summary.record(&SymbolOutcome::Hold);
        summary.record(&SymbolOutcome::Filtered(FilterReason::Cooldown));
        summary.record(&SymbolOutcome::Filtered(FilterReason::Cooldown));
        summary.record(&SymbolOutcome::Filtered(FilterReason::SectorCap));
        summary.record(&SymbolOutcome::Ordered {
            side: OrderSide::Buy,
            quantity: 10,
        });
        summary.record(&SymbolOutcome::Signalled(Direction::Sell));

        assert_eq!(summary.total_candidates, 6);
        assert_eq!(summary.filtered_candidates, 3);
        assert_eq!(summary.orders_created, 1);
        assert_eq!(summary.filtered(FilterReason::Cooldown), 2);
        assert_eq!(summary.filtered(FilterReason::SectorCap), 1);
        assert_eq!(summary.filtered(FilterReason::StaleData), 0);
        assert!((summary.statistics().pct_filtered() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn entry_block_prefers_kill_switch() {
        assert_eq!(decision(false, true).entry_block(), FilterReason::KillSwitch);
        assert_eq!(decision(false, false).entry_block(), FilterReason::GateClosed);
    }

    #[test]
    fn names() {
        assert_eq!(FilterReason::SectorCap.to_string(), "sector-cap");
        assert_eq!(RunPhase::StatisticsCommit.to_string(), "statistics-commit");
        assert_eq!("completed".parse::<RunStatus>().unwrap(), RunStatus::Completed);
        assert!("failed".parse::<RunStatus>().is_err());
    }
}
