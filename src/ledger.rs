use crate::models::{CostPosting, Direction};
use crate::params::BacktestParams;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-date cost bucket totals.
///
/// `stock`/`hedge` split by leg identity; `long`/`short` split by the leg's
/// market-direction exposure, so a long trade's hedge leg lands in `short`
/// and a short trade's hedge leg lands in `long`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct CostRecord {
    pub long: f64,
    pub short: f64,
    pub stock: f64,
    pub hedge: f64,
}

impl CostRecord {
    fn accumulate(&mut self, other: CostRecord) {
        self.long += other.long;
        self.short += other.short;
        self.stock += other.stock;
        self.hedge += other.hedge;
    }
}

/// Finalized per-date cost row with total and running cumulative columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizedCostRecord {
    pub date: NaiveDate,
    pub long: f64,
    pub short: f64,
    pub stock: f64,
    pub hedge: f64,
    pub total: f64,
    pub cumulative: f64,
}

/// One flat-rate cost ledger (transaction cost, commission, or slippage).
/// Dates with no postings read as all zeros.
#[derive(Debug, Clone)]
pub struct CostLedger {
    rate: f64,
    entries: BTreeMap<NaiveDate, CostRecord>,
}

impl CostLedger {
    pub fn new(rate: f64) -> Self {
        Self {
            rate,
            entries: BTreeMap::new(),
        }
    }

    pub fn post(&mut self, posting: &CostPosting) {
        let cost = posting.value * self.rate;
        let hedge_cost = posting.hedge_value * self.rate;
        let record = self.entries.entry(posting.date).or_default();
        record.stock += cost;
        record.hedge += hedge_cost;
        match posting.direction {
            Direction::Long => {
                record.long += cost;
                record.short += hedge_cost;
            }
            Direction::Short => {
                record.short += cost;
                record.long += hedge_cost;
            }
        }
    }

    pub fn record(&self, date: NaiveDate) -> CostRecord {
        self.entries.get(&date).copied().unwrap_or_default()
    }

    /// Produces one row per requested date in order, computing the total and
    /// cumulative columns over exactly those dates.
    pub fn finalize(&self, dates: &[NaiveDate]) -> Vec<FinalizedCostRecord> {
        let mut cumulative = 0.0;
        dates
            .iter()
            .map(|&date| {
                let record = self.record(date);
                let total = record.long + record.short;
                cumulative += total;
                FinalizedCostRecord {
                    date,
                    long: record.long,
                    short: record.short,
                    stock: record.stock,
                    hedge: record.hedge,
                    total,
                    cumulative,
                }
            })
            .collect()
    }
}

/// The three cost ledgers of a run, always posted together.
#[derive(Debug, Clone)]
pub struct CostLedgers {
    pub transaction: CostLedger,
    pub commission: CostLedger,
    pub slippage: CostLedger,
}

impl CostLedgers {
    pub fn new(params: &BacktestParams) -> Self {
        Self {
            transaction: CostLedger::new(params.transaction_cost_rate),
            commission: CostLedger::new(params.commission_rate),
            slippage: CostLedger::new(params.slippage_rate),
        }
    }

    pub fn post(&mut self, posting: &CostPosting) {
        self.transaction.post(posting);
        self.commission.post(posting);
        self.slippage.post(posting);
    }

    /// Bucket totals for a date summed across all three ledgers.
    pub fn combined(&self, date: NaiveDate) -> CostRecord {
        let mut combined = self.transaction.record(date);
        combined.accumulate(self.commission.record(date));
        combined.accumulate(self.slippage.record(date));
        combined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posting(date: NaiveDate, value: f64, hedge_value: f64, direction: Direction) -> CostPosting {
        CostPosting {
            date,
            value,
            hedge_value,
            direction,
        }
    }

    #[test]
    fn long_trade_hedge_cost_lands_in_short_bucket() {
        let date = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();
        let mut ledger = CostLedger::new(0.001);
        ledger.post(&posting(date, 10_000.0, 10_000.0, Direction::Long));

        let record = ledger.record(date);
        assert!((record.long - 10.0).abs() < 1e-9);
        assert!((record.short - 10.0).abs() < 1e-9);
        assert!((record.stock - 10.0).abs() < 1e-9);
        assert!((record.hedge - 10.0).abs() < 1e-9);
    }

    #[test]
    fn short_trade_attribution_is_mirrored() {
        let date = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();
        let mut ledger = CostLedger::new(0.001);
        ledger.post(&posting(date, 20_000.0, 5_000.0, Direction::Short));

        let record = ledger.record(date);
        assert!((record.short - 20.0).abs() < 1e-9);
        assert!((record.long - 5.0).abs() < 1e-9);
        assert!((record.stock - 20.0).abs() < 1e-9);
        assert!((record.hedge - 5.0).abs() < 1e-9);
    }

    #[test]
    fn all_three_ledgers_receive_identical_attribution() {
        let date = NaiveDate::from_ymd_opt(2021, 6, 2).unwrap();
        let params = BacktestParams {
            transaction_cost_rate: 0.0003,
            commission_rate: 0.0001,
            slippage_rate: 0.0002,
            ..BacktestParams::default()
        };
        let mut ledgers = CostLedgers::new(&params);
        ledgers.post(&posting(date, 50_000.0, 50_000.0, Direction::Long));

        for (ledger, rate) in [
            (&ledgers.transaction, 0.0003),
            (&ledgers.commission, 0.0001),
            (&ledgers.slippage, 0.0002),
        ] {
            let record = ledger.record(date);
            assert!((record.long - 50_000.0 * rate).abs() < 1e-9);
            assert!((record.short - 50_000.0 * rate).abs() < 1e-9);
        }

        let combined = ledgers.combined(date);
        assert!((combined.stock - 50_000.0 * 0.0006).abs() < 1e-9);
    }

    #[test]
    fn finalize_accumulates_totals_over_requested_dates() {
        let d1 = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2021, 6, 2).unwrap();
        let d3 = NaiveDate::from_ymd_opt(2021, 6, 3).unwrap();
        let mut ledger = CostLedger::new(0.01);
        ledger.post(&posting(d1, 1_000.0, 0.0, Direction::Long));
        ledger.post(&posting(d3, 2_000.0, 0.0, Direction::Short));

        let rows = ledger.finalize(&[d1, d2, d3]);
        assert_eq!(rows.len(), 3);
        assert!((rows[0].total - 10.0).abs() < 1e-9);
        assert!((rows[1].total).abs() < 1e-12);
        assert!((rows[1].cumulative - 10.0).abs() < 1e-9);
        assert!((rows[2].cumulative - 30.0).abs() < 1e-9);
    }
}
