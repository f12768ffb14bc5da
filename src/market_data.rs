use crate::error::{EngineError, Result};
use crate::models::Bar;
use chrono::NaiveDate;
use statrs::statistics::Statistics;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Immutable per-run view of historical market data.
///
/// Series are aligned to the union of all observed dates; absent cells stay
/// absent and surface as `MissingData` on lookup — the core never fills
/// gaps. Daily returns are derived from consecutive closes, with the first
/// observation of a symbol reported as a zero return.
#[derive(Clone)]
pub struct MarketData {
    dates: Arc<Vec<NaiveDate>>,
    series: Arc<HashMap<String, SymbolSeries>>,
}

struct SymbolSeries {
    closes: Vec<Option<f64>>,
    highs: Vec<Option<f64>>,
    lows: Vec<Option<f64>>,
    returns: Vec<Option<f64>>,
}

impl MarketData {
    pub fn from_bars(bars: &[Bar]) -> Result<Self> {
        if bars.is_empty() {
            return Err(EngineError::invalid_parameter(
                "market data requires at least one bar",
            ));
        }

        let mut date_set = BTreeSet::new();
        for bar in bars {
            date_set.insert(bar.date);
        }
        let dates: Vec<NaiveDate> = date_set.into_iter().collect();
        let index_of: HashMap<NaiveDate, usize> = dates
            .iter()
            .enumerate()
            .map(|(idx, date)| (*date, idx))
            .collect();

        let mut series: HashMap<String, SymbolSeries> = HashMap::new();
        for bar in bars {
            let entry = series
                .entry(bar.symbol.clone())
                .or_insert_with(|| SymbolSeries {
                    closes: vec![None; dates.len()],
                    highs: vec![None; dates.len()],
                    lows: vec![None; dates.len()],
                    returns: vec![None; dates.len()],
                });
            let idx = index_of[&bar.date];
            entry.closes[idx] = Some(bar.close);
            entry.highs[idx] = Some(bar.high);
            entry.lows[idx] = Some(bar.low);
        }

        for symbol_series in series.values_mut() {
            let mut first_seen = false;
            for idx in 0..symbol_series.closes.len() {
                let Some(close) = symbol_series.closes[idx] else {
                    continue;
                };
                if !first_seen {
                    symbol_series.returns[idx] = Some(0.0);
                    first_seen = true;
                    continue;
                }
                let prev = if idx > 0 {
                    symbol_series.closes[idx - 1]
                } else {
                    None
                };
                if let Some(prev_close) = prev {
                    if prev_close != 0.0 {
                        symbol_series.returns[idx] = Some(close / prev_close - 1.0);
                    }
                }
            }
        }

        Ok(Self {
            dates: Arc::new(dates),
            series: Arc::new(series),
        })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        self.dates.as_slice()
    }

    pub fn has_symbol(&self, symbol: &str) -> bool {
        self.series.contains_key(symbol)
    }

    fn date_index(&self, symbol: &str, date: NaiveDate) -> Result<usize> {
        self.dates
            .binary_search(&date)
            .map_err(|_| EngineError::missing_data(symbol, date))
    }

    fn symbol_series(&self, symbol: &str, date: NaiveDate) -> Result<&SymbolSeries> {
        self.series
            .get(symbol)
            .ok_or_else(|| EngineError::missing_data(symbol, date))
    }

    fn cell(&self, values: &[Option<f64>], symbol: &str, date: NaiveDate) -> Result<f64> {
        let idx = self.date_index(symbol, date)?;
        values[idx].ok_or_else(|| EngineError::missing_data(symbol, date))
    }

    pub fn close(&self, symbol: &str, date: NaiveDate) -> Result<f64> {
        let series = self.symbol_series(symbol, date)?;
        self.cell(&series.closes, symbol, date)
    }

    pub fn high(&self, symbol: &str, date: NaiveDate) -> Result<f64> {
        let series = self.symbol_series(symbol, date)?;
        self.cell(&series.highs, symbol, date)
    }

    pub fn low(&self, symbol: &str, date: NaiveDate) -> Result<f64> {
        let series = self.symbol_series(symbol, date)?;
        self.cell(&series.lows, symbol, date)
    }

    pub fn daily_return(&self, symbol: &str, date: NaiveDate) -> Result<f64> {
        let series = self.symbol_series(symbol, date)?;
        self.cell(&series.returns, symbol, date)
    }

    /// Returns observed in the `lookback` trading rows strictly preceding
    /// `date`, oldest first. Absent cells are skipped, so the window may be
    /// shorter than requested (or empty near the start of the series).
    pub fn trailing_returns(
        &self,
        symbol: &str,
        date: NaiveDate,
        lookback: usize,
    ) -> Result<Vec<f64>> {
        let series = self.symbol_series(symbol, date)?;
        let idx = self.date_index(symbol, date)?;
        let start = idx.saturating_sub(lookback);
        Ok(series.returns[start..idx]
            .iter()
            .copied()
            .flatten()
            .collect())
    }

    /// Sample standard deviation of the trailing return window, or `None`
    /// when fewer than two observations are available.
    pub fn trailing_return_std(
        &self,
        symbol: &str,
        date: NaiveDate,
        lookback: usize,
    ) -> Result<Option<f64>> {
        let window = self.trailing_returns(symbol, date, lookback)?;
        if window.len() < 2 {
            return Ok(None);
        }
        Ok(Some(window.std_dev()))
    }
}
