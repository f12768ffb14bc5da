//! Daily simulation engine for hedged long/short equity portfolios.
//!
//! The engine owns the position lifecycle (entry sizing, pyramiding,
//! mark-to-market, trailing/fixed exits) and the portfolio accounting layer
//! that aggregates trades into a per-day valuation ledger, flat-rate cost
//! ledgers, and summary performance metrics. Market data, regime labels,
//! and the rebalance policy are external collaborators passed in through
//! [`context::RunContext`] and the [`backtest::Strategy`] trait.

pub mod backtest;
pub mod context;
pub mod error;
pub mod ledger;
pub mod market_data;
pub mod models;
pub mod params;
pub mod performance;
pub mod portfolio;
pub mod sizing;
pub mod trade;

pub use backtest::{Backtest, BacktestOutcome, NoRebalance, Strategy};
pub use context::{RunContext, SimClock};
pub use error::{EngineError, Result};
pub use market_data::MarketData;
pub use models::{
    Bar, DailyLedgerRow, DailyValuation, Direction, PositionSizing, PyramidScheme, SummaryMetrics,
    TradeKey,
};
pub use params::BacktestParams;
pub use performance::{PerformanceCalculator, RegimeProvider};
pub use portfolio::{FinalizedLedger, Portfolio, PortfolioStats};
pub use trade::Trade;
