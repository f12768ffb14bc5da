use crate::error::{EngineError, Result};
use crate::market_data::MarketData;
use crate::models::{PositionSizing, PyramidScheme};
use chrono::NaiveDate;

/// Lookback for the trailing return standard deviation used by risk-adjusted
/// sizing and the pyramiding trigger.
pub const VOLATILITY_WINDOW: usize = 20;
/// Lookback for the Kelly fraction's return history.
pub const KELLY_LOOKBACK: usize = 100;
/// Risk divisor applied on top of the per-slot allocation for risk-adjusted
/// sizing.
pub const RISK_DIVISOR: f64 = 3.0;

pub struct InitialSizingParams<'a> {
    pub data: &'a MarketData,
    pub symbol: &'a str,
    pub date: NaiveDate,
    pub scheme: PositionSizing,
    pub available_capital: f64,
    pub max_investment_per_symbol: f64,
}

/// Computes the entry value for a new trade under the configured scheme.
pub fn determine_entry_value(params: InitialSizingParams) -> Result<f64> {
    let InitialSizingParams {
        data,
        symbol,
        date,
        scheme,
        available_capital,
        max_investment_per_symbol,
    } = params;

    let per_slot = available_capital / max_investment_per_symbol;
    match scheme {
        PositionSizing::Equal => Ok(per_slot),
        PositionSizing::RiskAdjusted => {
            let std = data.trailing_return_std(symbol, date, VOLATILITY_WINDOW)?;
            match std {
                Some(value) if value.is_finite() && value > 0.0 => {
                    Ok(per_slot / RISK_DIVISOR / value)
                }
                _ => Err(EngineError::insufficient_history(
                    symbol,
                    date,
                    format!(
                        "risk-adjusted sizing needs a usable {}-day return std",
                        VOLATILITY_WINDOW
                    ),
                )),
            }
        }
        PositionSizing::Kelly => {
            let history = data.trailing_returns(symbol, date, KELLY_LOOKBACK)?;
            Ok(kelly_fraction(&history) * per_slot)
        }
    }
}

/// Kelly fraction over a trailing return history.
///
/// Falls back to 1.0 (full sizing) whenever the fraction is unusable: empty
/// history, zero win rate, or a non-finite/non-positive result.
pub fn kelly_fraction(history: &[f64]) -> f64 {
    if history.is_empty() {
        return 1.0;
    }
    let sum_positive: f64 = history.iter().filter(|r| **r > 0.0).sum();
    let sum_negative: f64 = history.iter().filter(|r| **r < 0.0).sum();
    let count_positive = history.iter().filter(|r| **r > 0.0).count();
    let win_rate = count_positive as f64 / history.len() as f64;
    let w = sum_positive / (sum_positive + sum_negative.abs());
    if win_rate > 0.0 {
        let k = w - (1.0 - w) / win_rate;
        if k.is_finite() && k > 0.0 {
            return k;
        }
    }
    1.0
}

/// First incremental value seeded at trade open.
pub fn opening_increment(scheme: PyramidScheme, entry_value: f64) -> f64 {
    match scheme {
        PyramidScheme::None => 0.0,
        PyramidScheme::Upright | PyramidScheme::Reflective => 0.5 * entry_value,
        PyramidScheme::Equal => entry_value,
    }
}

/// Schedule update applied after a completed increment.
///
/// `completed_increases` counts the add that just finished (1 for the
/// first). Reflective halves after the first add, flips sign after the
/// second, and doubles the now-negative magnitude from then on, producing
/// the sequence 50, 25, -25, -50, ... for an opening increment of 50.
pub fn next_incremental_value(
    scheme: PyramidScheme,
    current: f64,
    completed_increases: u32,
) -> f64 {
    match scheme {
        PyramidScheme::None | PyramidScheme::Equal => current,
        PyramidScheme::Upright => 0.5 * current,
        PyramidScheme::Reflective => {
            if completed_increases < 2 {
                0.5 * current
            } else if completed_increases == 2 {
                -current
            } else {
                2.0 * current
            }
        }
    }
}

/// Daily pyramiding trigger: the signed return must exceed the trailing
/// return standard deviation. An unavailable std never triggers.
pub fn volatility_breakout(signed_return: f64, trailing_std: Option<f64>) -> bool {
    matches!(trailing_std, Some(std) if signed_return > std)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Bar;
    use chrono::{Datelike, Duration};

    fn weekday_series(symbol: &str, start: NaiveDate, closes: &[f64]) -> Vec<Bar> {
        let mut bars = Vec::new();
        let mut date = start;
        for &close in closes {
            while date.weekday().number_from_monday() > 5 {
                date += Duration::days(1);
            }
            bars.push(Bar {
                symbol: symbol.to_string(),
                date,
                close,
                high: close,
                low: close,
            });
            date += Duration::days(1);
        }
        bars
    }

    #[test]
    fn equal_sizing_divides_capital_across_slots() {
        let start = NaiveDate::from_ymd_opt(2021, 3, 1).unwrap();
        let bars = weekday_series("AAA", start, &[100.0, 101.0]);
        let data = MarketData::from_bars(&bars).unwrap();

        let value = determine_entry_value(InitialSizingParams {
            data: &data,
            symbol: "AAA",
            date: bars[1].date,
            scheme: PositionSizing::Equal,
            available_capital: 50_000.0,
            max_investment_per_symbol: 5.0,
        })
        .unwrap();
        assert!((value - 10_000.0).abs() < 1e-9);
    }

    #[test]
    fn risk_adjusted_sizing_fails_without_history() {
        let start = NaiveDate::from_ymd_opt(2021, 3, 1).unwrap();
        let bars = weekday_series("AAA", start, &[100.0, 101.0]);
        let data = MarketData::from_bars(&bars).unwrap();

        let result = determine_entry_value(InitialSizingParams {
            data: &data,
            symbol: "AAA",
            date: bars[1].date,
            scheme: PositionSizing::RiskAdjusted,
            available_capital: 50_000.0,
            max_investment_per_symbol: 5.0,
        });
        assert!(matches!(
            result,
            Err(EngineError::InsufficientHistory { .. })
        ));
    }

    #[test]
    fn risk_adjusted_sizing_scales_inversely_with_volatility() {
        let start = NaiveDate::from_ymd_opt(2021, 3, 1).unwrap();
        let closes: Vec<f64> = (0..25)
            .map(|i| 100.0 * if i % 2 == 0 { 1.0 } else { 1.02 })
            .collect();
        let bars = weekday_series("AAA", start, &closes);
        let data = MarketData::from_bars(&bars).unwrap();
        let date = bars.last().unwrap().date;

        let std = data
            .trailing_return_std("AAA", date, VOLATILITY_WINDOW)
            .unwrap()
            .unwrap();
        let value = determine_entry_value(InitialSizingParams {
            data: &data,
            symbol: "AAA",
            date,
            scheme: PositionSizing::RiskAdjusted,
            available_capital: 50_000.0,
            max_investment_per_symbol: 5.0,
        })
        .unwrap();
        assert!((value - 10_000.0 / RISK_DIVISOR / std).abs() < 1e-9);
    }

    #[test]
    fn kelly_fraction_falls_back_to_full_sizing() {
        assert_eq!(kelly_fraction(&[]), 1.0);
        // all losers: win rate 0
        assert_eq!(kelly_fraction(&[-0.01, -0.02]), 1.0);
        // negative edge collapses to the fallback
        assert_eq!(kelly_fraction(&[0.001, -0.05, -0.06]), 1.0);
    }

    #[test]
    fn kelly_fraction_rewards_positive_edge() {
        let history = [0.02, 0.03, -0.01, 0.04, -0.005];
        let k = kelly_fraction(&history);
        assert!(k > 0.0 && k < 1.0);

        let sum_pos = 0.02 + 0.03 + 0.04;
        let sum_neg_abs = 0.015;
        let w = sum_pos / (sum_pos + sum_neg_abs);
        let expected = w - (1.0 - w) / (3.0 / 5.0);
        assert!((k - expected).abs() < 1e-12);
    }

    #[test]
    fn reflective_schedule_matches_expected_sequence() {
        // opening increment for entry 100
        let mut value = opening_increment(PyramidScheme::Reflective, 100.0);
        assert!((value - 50.0).abs() < 1e-12);

        let mut observed = vec![value];
        for add in 1..=4 {
            value = next_incremental_value(PyramidScheme::Reflective, value, add);
            observed.push(value);
        }
        assert_eq!(observed, vec![50.0, 25.0, -25.0, -50.0, -100.0]);
    }

    #[test]
    fn upright_halves_and_equal_stays_flat() {
        assert!((next_incremental_value(PyramidScheme::Upright, 40.0, 1) - 20.0).abs() < 1e-12);
        assert!((next_incremental_value(PyramidScheme::Equal, 40.0, 3) - 40.0).abs() < 1e-12);
    }

    #[test]
    fn breakout_requires_usable_std() {
        assert!(volatility_breakout(0.05, Some(0.02)));
        assert!(!volatility_breakout(0.01, Some(0.02)));
        assert!(!volatility_breakout(0.05, None));
    }
}
