use crate::models::SummaryMetrics;
use crate::portfolio::FinalizedLedger;
use chrono::NaiveDate;
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Source of regime labels for post-hoc segmentation. Never consulted by the
/// simulation itself.
pub trait RegimeProvider {
    fn regime_label(&self, date: NaiveDate) -> Option<String>;
}

pub struct PerformanceCalculator;

impl PerformanceCalculator {
    /// Reduces the finalized daily ledger and realized trade statistics into
    /// the summary metrics table.
    pub fn calculate(ledger: &FinalizedLedger) -> SummaryMetrics {
        let stats = &ledger.stats;
        let equity: Vec<f64> = ledger
            .rows
            .iter()
            .map(|row| ledger.starting_cash + row.cum_pl)
            .collect();

        let cagr = Self::calculate_cagr(ledger, &equity);

        let returns: Vec<f64> = ledger
            .rows
            .iter()
            .filter_map(|row| row.return_total)
            .collect();
        let daily_vol = if returns.is_empty() {
            0.0
        } else {
            returns.clone().population_std_dev()
        };
        let annualized_vol = daily_vol * TRADING_DAYS_PER_YEAR.sqrt();
        let sharpe_like_pct = if annualized_vol > 0.0 {
            100.0 * cagr / annualized_vol
        } else {
            0.0
        };
        let avg_daily_return_bps = if returns.is_empty() {
            0.0
        } else {
            returns.mean() * 10_000.0
        };

        let pl_series: Vec<f64> = ledger.rows.iter().map(|row| row.pl_total).collect();
        let avg_daily_pl = if pl_series.is_empty() {
            0.0
        } else {
            pl_series.clone().mean()
        };
        let daily_pl_std = if pl_series.len() < 2 {
            0.0
        } else {
            pl_series.std_dev()
        };

        let win_rate_pct = if stats.total_trades > 0 {
            100.0 * stats.positive_trades as f64 / stats.total_trades as f64
        } else {
            0.0
        };
        let losing_trades = stats.total_trades - stats.positive_trades;
        let win_loss_ratio = if losing_trades > 0 {
            stats.positive_trades as f64 / losing_trades as f64
        } else {
            f64::INFINITY
        };
        let gain_to_pain_ratio = if stats.pain == 0.0 {
            f64::INFINITY
        } else {
            stats.gain / stats.pain.abs()
        };
        let profit_loss_ratio = Self::profit_loss_ratio(
            stats.gain,
            stats.pain,
            stats.positive_trades,
            stats.total_trades,
        );

        SummaryMetrics {
            cagr_pct: cagr * 100.0,
            annualized_vol_pct: annualized_vol * 100.0,
            sharpe_like_pct,
            win_rate_pct,
            num_trades: stats.total_trades,
            win_loss_ratio,
            profit_loss_ratio,
            avg_daily_pl,
            daily_pl_std,
            avg_daily_return_bps,
            max_consecutive_losses: stats.max_consecutive_losses,
            max_drawdown_pct: Self::max_drawdown(&equity) * 100.0,
            lake_ratio: Self::lake_ratio(&equity),
            gain_to_pain_ratio,
        }
    }

    /// Mean period return per regime label, for post-hoc segmentation of the
    /// finalized ledger. Days without a label or without exposure are
    /// skipped.
    pub fn mean_return_by_regime(
        ledger: &FinalizedLedger,
        regimes: &dyn RegimeProvider,
    ) -> BTreeMap<String, f64> {
        let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
        for row in &ledger.rows {
            let Some(period_return) = row.return_total else {
                continue;
            };
            let Some(label) = regimes.regime_label(row.date) else {
                continue;
            };
            let entry = sums.entry(label).or_insert((0.0, 0));
            entry.0 += period_return;
            entry.1 += 1;
        }
        sums.into_iter()
            .map(|(label, (sum, count))| (label, sum / count as f64))
            .collect()
    }

    fn calculate_cagr(ledger: &FinalizedLedger, equity: &[f64]) -> f64 {
        let (Some(first_row), Some(last_row)) = (ledger.rows.first(), ledger.rows.last()) else {
            return 0.0;
        };
        let days = (last_row.date - first_row.date).num_days();
        if days <= 0 {
            return 0.0;
        }
        let final_equity = *equity.last().expect("rows imply equity");
        let ratio = final_equity / ledger.starting_cash;
        if ratio <= 0.0 || !ratio.is_finite() {
            return -1.0;
        }
        ratio.powf(365.0 / days as f64) - 1.0
    }

    /// Largest peak-to-trough loss as a negative fraction of the running
    /// peak.
    fn max_drawdown(equity: &[f64]) -> f64 {
        let mut peak = f64::NEG_INFINITY;
        let mut worst = 0.0f64;
        for &value in equity {
            if value > peak {
                peak = value;
            } else if peak > 0.0 {
                let drawdown = 1.0 - value / peak;
                if drawdown > worst {
                    worst = drawdown;
                }
            }
        }
        -worst
    }

    /// Area between the equity curve and its running peak, normalized by the
    /// cumulative equity.
    fn lake_ratio(equity: &[f64]) -> f64 {
        let mut peak = f64::NEG_INFINITY;
        let mut water = 0.0;
        let mut earth = 0.0;
        for &value in equity {
            if value > peak {
                peak = value;
            }
            water += peak - value;
            earth += value;
        }
        if earth == 0.0 {
            0.0
        } else {
            water / earth
        }
    }

    fn profit_loss_ratio(gain: f64, pain: f64, positive_trades: u32, total_trades: u32) -> f64 {
        if positive_trades == 0 || total_trades == positive_trades {
            return 0.0;
        }
        let avg_win = gain / positive_trades as f64;
        let avg_loss = (pain / (total_trades - positive_trades) as f64).abs();
        if avg_loss == 0.0 {
            return 0.0;
        }
        avg_win / avg_loss
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DailyLedgerRow;
    use crate::portfolio::PortfolioStats;
    use chrono::Duration;

    fn row(date: NaiveDate, pl_total: f64, cum_pl: f64, gross_exposure: f64) -> DailyLedgerRow {
        DailyLedgerRow {
            date,
            long_value: gross_exposure,
            short_value: 0.0,
            stock_value: gross_exposure,
            hedge_value: 0.0,
            pl_long: pl_total,
            pl_short: 0.0,
            pl_stock: pl_total,
            pl_hedge: 0.0,
            pl_total,
            cum_pl,
            cum_pl_stock: cum_pl,
            cum_pl_hedge: 0.0,
            gross_exposure,
            return_total: if gross_exposure == 0.0 {
                None
            } else {
                Some(pl_total / gross_exposure)
            },
        }
    }

    fn ledger(rows: Vec<DailyLedgerRow>, stats: PortfolioStats) -> FinalizedLedger {
        FinalizedLedger {
            rows,
            transaction_costs: Vec::new(),
            commissions: Vec::new(),
            slippage: Vec::new(),
            starting_cash: 1_000_000.0,
            stats,
        }
    }

    fn date(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + Duration::days(offset)
    }

    #[test]
    fn cagr_follows_the_annualization_formula() {
        let rows = vec![
            row(date(0), 0.0, 0.0, 0.0),
            row(date(365), 100_000.0, 100_000.0, 500_000.0),
        ];
        let metrics = PerformanceCalculator::calculate(&ledger(rows, PortfolioStats::default()));
        assert!((metrics.cagr_pct - 10.0).abs() < 1e-9);
    }

    #[test]
    fn drawdown_and_lake_ratio_measure_the_dip() {
        let rows = vec![
            row(date(0), 0.0, 0.0, 0.0),
            row(date(1), 100_000.0, 100_000.0, 100_000.0),
            row(date(2), -200_000.0, -100_000.0, 100_000.0),
            row(date(3), 50_000.0, -50_000.0, 100_000.0),
        ];
        let metrics = PerformanceCalculator::calculate(&ledger(rows, PortfolioStats::default()));

        // equity: 1.0M, 1.1M, 0.9M, 0.95M; trough 0.9/1.1
        let expected_dd = -(1.0 - 900_000.0 / 1_100_000.0) * 100.0;
        assert!((metrics.max_drawdown_pct - expected_dd).abs() < 1e-9);

        let water = (1_100_000.0 - 900_000.0) + (1_100_000.0 - 950_000.0);
        let earth = 1_000_000.0 + 1_100_000.0 + 900_000.0 + 950_000.0;
        assert!((metrics.lake_ratio - water / earth).abs() < 1e-12);
    }

    #[test]
    fn gain_to_pain_is_infinite_without_losses() {
        let stats = PortfolioStats {
            gain: 5_000.0,
            pain: 0.0,
            positive_trades: 3,
            total_trades: 3,
            ..PortfolioStats::default()
        };
        let rows = vec![row(date(0), 0.0, 0.0, 0.0), row(date(1), 0.0, 0.0, 0.0)];
        let metrics = PerformanceCalculator::calculate(&ledger(rows, stats));
        assert!(metrics.gain_to_pain_ratio.is_infinite());
        assert!(metrics.win_loss_ratio.is_infinite());
        // all winners: profit/loss ratio is reported as the 0.0 sentinel
        assert_eq!(metrics.profit_loss_ratio, 0.0);
        assert!((metrics.win_rate_pct - 100.0).abs() < 1e-12);
    }

    #[test]
    fn profit_loss_ratio_compares_average_win_and_loss() {
        let stats = PortfolioStats {
            gain: 3_000.0,
            pain: -1_000.0,
            positive_trades: 3,
            total_trades: 5,
            ..PortfolioStats::default()
        };
        let rows = vec![row(date(0), 0.0, 0.0, 0.0)];
        let metrics = PerformanceCalculator::calculate(&ledger(rows, stats));
        // avg win 1000 vs avg loss 500
        assert!((metrics.profit_loss_ratio - 2.0).abs() < 1e-12);
        assert!((metrics.win_loss_ratio - 1.5).abs() < 1e-12);
        assert!((metrics.win_rate_pct - 60.0).abs() < 1e-12);
    }

    #[test]
    fn empty_ledger_produces_quiet_zeros() {
        let metrics = PerformanceCalculator::calculate(&ledger(
            Vec::new(),
            PortfolioStats::default(),
        ));
        assert_eq!(metrics.cagr_pct, 0.0);
        assert_eq!(metrics.annualized_vol_pct, 0.0);
        assert_eq!(metrics.num_trades, 0);
        assert_eq!(metrics.win_rate_pct, 0.0);
    }

    #[test]
    fn regime_segmentation_averages_labelled_days() {
        struct AlternatingRegimes;
        impl RegimeProvider for AlternatingRegimes {
            fn regime_label(&self, date: NaiveDate) -> Option<String> {
                let label = if (date - NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()).num_days() % 2
                    == 0
                {
                    "bullish + low var"
                } else {
                    "bearish + low var"
                };
                Some(label.to_string())
            }
        }

        let rows = vec![
            row(date(0), 1_000.0, 1_000.0, 100_000.0),
            row(date(1), -500.0, 500.0, 100_000.0),
            row(date(2), 2_000.0, 2_500.0, 100_000.0),
            row(date(3), 0.0, 2_500.0, 0.0),
        ];
        let ledger = ledger(rows, PortfolioStats::default());
        let by_regime = PerformanceCalculator::mean_return_by_regime(&ledger, &AlternatingRegimes);

        assert_eq!(by_regime.len(), 2);
        let bullish = by_regime["bullish + low var"];
        assert!((bullish - (0.01 + 0.02) / 2.0).abs() < 1e-12);
        let bearish = by_regime["bearish + low var"];
        assert!((bearish + 0.005).abs() < 1e-12);
    }
}
