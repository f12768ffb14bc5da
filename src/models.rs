use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Market direction of a position leg.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }

    /// Sign applied to a raw market return: +1 for long exposure, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }
}

/// Schedule for adding to a winning position.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PyramidScheme {
    None,
    Upright,
    Equal,
    Reflective,
}

impl PyramidScheme {
    pub fn as_str(self) -> &'static str {
        match self {
            PyramidScheme::None => "none",
            PyramidScheme::Upright => "upright",
            PyramidScheme::Equal => "equal",
            PyramidScheme::Reflective => "reflective",
        }
    }
}

/// Initial entry sizing scheme.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PositionSizing {
    Equal,
    RiskAdjusted,
    Kelly,
}

impl PositionSizing {
    pub fn as_str(self) -> &'static str {
        match self {
            PositionSizing::Equal => "equal",
            PositionSizing::RiskAdjusted => "risk_adjusted",
            PositionSizing::Kelly => "kelly",
        }
    }
}

/// Realized result of a closed trade, as tracked by the loss-streak stats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeOutcome {
    Win,
    Loss,
}

/// Key of an active trade. At most one trade per symbol and direction is
/// active at a time; opening a duplicate replaces the prior entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TradeKey {
    pub symbol: String,
    pub direction: Direction,
}

/// One daily market data row for a symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub date: NaiveDate,
    pub close: f64,
    pub high: f64,
    pub low: f64,
}

/// A request to post trading costs for both legs of a trade, produced by
/// `Trade` operations and applied to the ledgers by `Portfolio`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostPosting {
    pub date: NaiveDate,
    pub value: f64,
    pub hedge_value: f64,
    pub direction: Direction,
}

/// Raw per-date valuation record, appended once per simulated trading day.
///
/// Values are the exposure carried into the day (before that day's
/// mark-to-market); P&L fields are the day's marks. Long/short buckets
/// attribute both legs by market direction: a long trade's hedge leg counts
/// as short exposure, and vice versa.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyValuation {
    pub date: NaiveDate,
    pub long_value: f64,
    pub short_value: f64,
    pub stock_value: f64,
    pub hedge_value: f64,
    pub pl_long: f64,
    pub pl_short: f64,
    pub pl_stock: f64,
    pub pl_hedge: f64,
    pub pl_total: f64,
}

impl DailyValuation {
    pub fn zeroed(date: NaiveDate) -> Self {
        Self {
            date,
            long_value: 0.0,
            short_value: 0.0,
            stock_value: 0.0,
            hedge_value: 0.0,
            pl_long: 0.0,
            pl_short: 0.0,
            pl_stock: 0.0,
            pl_hedge: 0.0,
            pl_total: 0.0,
        }
    }
}

/// Finalized per-date ledger row: the raw valuation net of that date's
/// costs, with cumulative series and the period return.
///
/// `return_total` is absent (not zero) on days with no gross exposure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyLedgerRow {
    pub date: NaiveDate,
    pub long_value: f64,
    pub short_value: f64,
    pub stock_value: f64,
    pub hedge_value: f64,
    pub pl_long: f64,
    pub pl_short: f64,
    pub pl_stock: f64,
    pub pl_hedge: f64,
    pub pl_total: f64,
    pub cum_pl: f64,
    pub cum_pl_stock: f64,
    pub cum_pl_hedge: f64,
    pub gross_exposure: f64,
    pub return_total: Option<f64>,
}

/// Summary performance metrics derived from the finalized daily ledger and
/// the portfolio's run statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryMetrics {
    pub cagr_pct: f64,
    pub annualized_vol_pct: f64,
    /// CAGR over annualized volatility, in percent. Not a true Sharpe ratio:
    /// no risk-free leg, non-excess returns.
    pub sharpe_like_pct: f64,
    pub win_rate_pct: f64,
    pub num_trades: u32,
    pub win_loss_ratio: f64,
    pub profit_loss_ratio: f64,
    pub avg_daily_pl: f64,
    pub daily_pl_std: f64,
    pub avg_daily_return_bps: f64,
    pub max_consecutive_losses: u32,
    pub max_drawdown_pct: f64,
    pub lake_ratio: f64,
    pub gain_to_pain_ratio: f64,
}
