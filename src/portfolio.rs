use crate::context::RunContext;
use crate::error::Result;
use crate::ledger::{CostLedgers, FinalizedCostRecord};
use crate::models::{
    CostPosting, DailyLedgerRow, DailyValuation, Direction, TradeKey, TradeOutcome,
};
use crate::trade::Trade;
use chrono::NaiveDate;
use log::warn;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Run-level trade statistics, updated as trades are realized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioStats {
    pub gain: f64,
    pub pain: f64,
    pub positive_trades: u32,
    pub total_trades: u32,
    pub consecutive_losses: u32,
    pub max_consecutive_losses: u32,
    pub last_outcome: Option<TradeOutcome>,
}

/// The finalized output of a run: per-date ledger rows net of costs, the
/// three finalized cost tables, and the realized trade statistics.
#[derive(Debug, Clone)]
pub struct FinalizedLedger {
    pub rows: Vec<DailyLedgerRow>,
    pub transaction_costs: Vec<FinalizedCostRecord>,
    pub commissions: Vec<FinalizedCostRecord>,
    pub slippage: Vec<FinalizedCostRecord>,
    pub starting_cash: f64,
    pub stats: PortfolioStats,
}

/// Owns the set of active trades, the cash balance, the cost ledgers, and
/// the daily valuation ledger.
///
/// Only realized primary-leg value flows back into `cash`; hedge cash is
/// intentionally not tracked against the pool, mirroring the accounting
/// asymmetry of the entry side where only the primary value is debited.
pub struct Portfolio {
    trades: HashMap<TradeKey, Trade>,
    pub cash: f64,
    pub starting_cash: f64,
    pub per_symbol_allocation: f64,
    stats: PortfolioStats,
    daily: Vec<DailyValuation>,
    ledgers: CostLedgers,
}

impl Portfolio {
    pub fn new(ctx: &RunContext, starting_cash: f64) -> Self {
        Self {
            trades: HashMap::new(),
            cash: starting_cash,
            starting_cash,
            per_symbol_allocation: 1.0,
            stats: PortfolioStats::default(),
            daily: Vec::new(),
            ledgers: CostLedgers::new(&ctx.params),
        }
    }

    pub fn stats(&self) -> &PortfolioStats {
        &self.stats
    }

    pub fn daily(&self) -> &[DailyValuation] {
        &self.daily
    }

    pub fn active_trade_count(&self) -> usize {
        self.trades.len()
    }

    pub fn trade(&self, key: &TradeKey) -> Option<&Trade> {
        self.trades.get(key)
    }

    /// Opens a trade keyed by `(symbol, direction)`, sized at the current
    /// cash times the per-symbol allocation fraction. An open on an existing
    /// key replaces the prior trade without realizing it; the strategy
    /// contract promises at most one open per day per key, so a replacement
    /// is logged as a warning rather than rejected.
    pub fn open(
        &mut self,
        ctx: &RunContext,
        date: NaiveDate,
        symbol: &str,
        hedge_symbol: Option<String>,
        direction: Direction,
    ) -> Result<()> {
        let mut trade = Trade::new(symbol, hedge_symbol, direction);
        let hint = self.cash * self.per_symbol_allocation;
        let posting = trade.open(ctx, date, Some(hint))?;

        self.cash -= trade.current_value;
        self.ledgers.post(&posting);

        let key = trade.key();
        if let Some(previous) = self.trades.insert(key.clone(), trade) {
            warn!(
                "Replaced active {} trade on {}; prior combined value {:.2} dropped unrealized",
                key.direction.as_str(),
                key.symbol,
                previous.combined_value()
            );
        }
        Ok(())
    }

    /// Records the day's valuation, marks every active trade to market, and
    /// evaluates exit constraints.
    ///
    /// Exposure is captured before the marks (the value carried into the
    /// day); P&L after them. Per-trade updates are independent, so they run
    /// as a parallel map with cost postings applied after the barrier;
    /// aggregation walks trades in key order so results never depend on map
    /// iteration order.
    pub fn value_all(&mut self, ctx: &RunContext, date: NaiveDate) -> Result<()> {
        let mut entries: Vec<(&TradeKey, &mut Trade)> = self.trades.iter_mut().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        let mut record = DailyValuation::zeroed(date);
        for (_, trade) in entries.iter() {
            record.long_value += trade.long_value();
            record.short_value += trade.short_value();
            record.stock_value += trade.current_value;
            record.hedge_value += trade.hedge_current_value;
        }

        let postings: Result<Vec<Option<CostPosting>>> = entries
            .par_iter_mut()
            .map(|(_, trade)| {
                let posting = trade.mark_to_market(ctx, date)?;
                trade.check_exit(ctx, date);
                Ok(posting)
            })
            .collect();
        for posting in postings?.into_iter().flatten() {
            self.ledgers.post(&posting);
        }

        for (_, trade) in entries.iter() {
            record.pl_long += trade.long_pl();
            record.pl_short += trade.short_pl();
            record.pl_stock += trade.current_pl;
            record.pl_hedge += trade.hedge_current_pl;
            record.pl_total += trade.current_pl + trade.hedge_current_pl;
        }

        self.daily.push(record);
        Ok(())
    }

    /// Realizes every trade marked for closing (or all of them on the final
    /// day): records the outcome, returns the primary leg's value to cash,
    /// and posts exit costs for both legs.
    pub fn realize_closed(&mut self, date: NaiveDate, is_final_day: bool) {
        let mut closing: Vec<TradeKey> = self
            .trades
            .iter()
            .filter(|(_, trade)| trade.to_close || is_final_day)
            .map(|(key, _)| key.clone())
            .collect();
        closing.sort();

        for key in closing {
            let Some(trade) = self.trades.remove(&key) else {
                continue;
            };
            self.record_outcome(&trade);
            self.cash += trade.current_value;
            self.ledgers.post(&CostPosting {
                date,
                value: trade.current_value,
                hedge_value: trade.hedge_current_value,
                direction: trade.direction,
            });
        }
    }

    fn record_outcome(&mut self, trade: &Trade) {
        let total_pl = trade.total_pl();
        if total_pl < 0.0 {
            match self.stats.last_outcome {
                Some(TradeOutcome::Win) => self.stats.consecutive_losses = 1,
                _ => self.stats.consecutive_losses += 1,
            }
            self.stats.max_consecutive_losses = self
                .stats
                .max_consecutive_losses
                .max(self.stats.consecutive_losses);
            self.stats.pain += total_pl;
            self.stats.last_outcome = Some(TradeOutcome::Loss);
        } else if total_pl > 0.0 {
            self.stats.positive_trades += 1;
            self.stats.gain += total_pl;
            self.stats.last_outcome = Some(TradeOutcome::Win);
        }
        self.stats.total_trades += 1;
    }

    /// Pure reduction over the raw daily records: nets each day's P&L
    /// against that day's costs under the same long/short/stock/hedge
    /// attribution, accumulates the cumulative series, and derives gross
    /// exposure and the period return. Consumes the portfolio; the ledger is
    /// read-only afterward.
    pub fn finalize(self) -> FinalizedLedger {
        let dates: Vec<NaiveDate> = self.daily.iter().map(|record| record.date).collect();

        let mut cum_pl = 0.0;
        let mut cum_pl_stock = 0.0;
        let mut cum_pl_hedge = 0.0;
        let rows = self
            .daily
            .iter()
            .map(|raw| {
                let costs = self.ledgers.combined(raw.date);
                let pl_stock = raw.pl_stock - costs.stock;
                let pl_hedge = raw.pl_hedge - costs.hedge;
                let pl_long = raw.pl_long - costs.long;
                let pl_short = raw.pl_short - costs.short;
                let pl_total = pl_stock + pl_hedge;

                cum_pl += pl_total;
                cum_pl_stock += pl_stock;
                cum_pl_hedge += pl_hedge;

                let gross_exposure = raw.stock_value + raw.hedge_value;
                let return_total = if gross_exposure == 0.0 {
                    None
                } else {
                    Some(pl_total / gross_exposure)
                };

                DailyLedgerRow {
                    date: raw.date,
                    long_value: raw.long_value,
                    short_value: raw.short_value,
                    stock_value: raw.stock_value,
                    hedge_value: raw.hedge_value,
                    pl_long,
                    pl_short,
                    pl_stock,
                    pl_hedge,
                    pl_total,
                    cum_pl,
                    cum_pl_stock,
                    cum_pl_hedge,
                    gross_exposure,
                    return_total,
                }
            })
            .collect();

        FinalizedLedger {
            rows,
            transaction_costs: self.ledgers.transaction.finalize(&dates),
            commissions: self.ledgers.commission.finalize(&dates),
            slippage: self.ledgers.slippage.finalize(&dates),
            starting_cash: self.starting_cash,
            stats: self.stats,
        }
    }
}
