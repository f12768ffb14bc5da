use crate::context::{RunContext, SimClock};
use crate::error::{EngineError, Result};
use crate::models::SummaryMetrics;
use crate::performance::PerformanceCalculator;
use crate::portfolio::{FinalizedLedger, Portfolio};
use chrono::{Datelike, NaiveDate};
use log::info;

/// Rebalance policy: decides which trades to open. Invoked after each
/// trading day's valuation and realization, so trades it opens are first
/// valued on the next trading day. The engine only knows how to open, grow,
/// value, and close a trade once instructed.
pub trait Strategy {
    fn rebalance(
        &mut self,
        portfolio: &mut Portfolio,
        ctx: &RunContext,
        date: NaiveDate,
    ) -> Result<()>;
}

/// Strategy that never trades. Useful as a placeholder and in tests.
pub struct NoRebalance;

impl Strategy for NoRebalance {
    fn rebalance(&mut self, _: &mut Portfolio, _: &RunContext, _: NaiveDate) -> Result<()> {
        Ok(())
    }
}

/// Completed run: the finalized ledger and its summary metrics.
pub struct BacktestOutcome {
    pub ledger: FinalizedLedger,
    pub metrics: SummaryMetrics,
}

/// Walks the simulated horizon one calendar day at a time, processing
/// weekdays only. Day t+1 is never touched before day t's valuation, exit
/// decisions, and cash realization are committed.
pub struct Backtest<S> {
    start_date: NaiveDate,
    end_date: NaiveDate,
    strategy: S,
}

fn is_trading_day(date: NaiveDate) -> bool {
    date.weekday().number_from_monday() <= 5
}

impl<S: Strategy> Backtest<S> {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, strategy: S) -> Result<Self> {
        if end_date < start_date {
            return Err(EngineError::invalid_parameter(format!(
                "backtest end date {} precedes start date {}",
                end_date, start_date
            )));
        }
        Ok(Self {
            start_date,
            end_date,
            strategy,
        })
    }

    pub fn run(mut self, ctx: &RunContext, starting_cash: f64) -> Result<BacktestOutcome> {
        if !(starting_cash.is_finite() && starting_cash > 0.0) {
            return Err(EngineError::invalid_parameter(format!(
                "starting cash must be positive (value: {})",
                starting_cash
            )));
        }

        let mut portfolio = Portfolio::new(ctx, starting_cash);
        let mut clock = SimClock::new(self.start_date);

        while clock.current_date() <= self.end_date {
            let date = clock.current_date();
            if is_trading_day(date) {
                let is_final_day = date == self.end_date;
                portfolio.value_all(ctx, date)?;
                portfolio.realize_closed(date, is_final_day);
                // Nothing opened on the final day could ever be realized.
                if !is_final_day {
                    self.strategy.rebalance(&mut portfolio, ctx, date)?;
                }
            }
            clock.advance();

            let elapsed = (clock.current_date() - self.start_date).num_days();
            if elapsed > 0 && elapsed % 365 == 0 {
                let years = elapsed / 365;
                info!(
                    "Strategy run for {} year{}",
                    years,
                    if years == 1 { "" } else { "s" }
                );
            }
        }

        let ledger = portfolio.finalize();
        let metrics = PerformanceCalculator::calculate(&ledger);
        Ok(BacktestOutcome { ledger, metrics })
    }
}
