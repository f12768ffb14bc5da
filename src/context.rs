use crate::error::Result;
use crate::market_data::MarketData;
use crate::params::BacktestParams;
use chrono::{Duration, NaiveDate};
use std::sync::Arc;

/// Immutable per-run context: validated parameters plus the market data
/// handle. Passed explicitly into every component so that independent runs
/// never share mutable state.
#[derive(Clone)]
pub struct RunContext {
    pub params: BacktestParams,
    pub data: Arc<MarketData>,
}

impl RunContext {
    pub fn new(params: BacktestParams, data: Arc<MarketData>) -> Result<Self> {
        let params = params.validated()?;
        Ok(Self { params, data })
    }
}

/// Simulation clock. Advanced only by the top-level driver; everything else
/// receives the current date as a plain value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimClock {
    current: NaiveDate,
}

impl SimClock {
    pub fn new(start: NaiveDate) -> Self {
        Self { current: start }
    }

    pub fn current_date(&self) -> NaiveDate {
        self.current
    }

    pub fn advance(&mut self) -> NaiveDate {
        self.current += Duration::days(1);
        self.current
    }
}
