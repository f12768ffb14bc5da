use crate::error::{EngineError, Result};
use crate::models::{PositionSizing, PyramidScheme};

/// Immutable per-run simulation parameters.
///
/// Owned by the run context and read-only to `Trade` and `Portfolio`.
/// Misconfiguration is a programmer error surfaced by `validated()` at
/// construction time, never retried.
#[derive(Debug, Clone)]
pub struct BacktestParams {
    /// Advisory holding period for strategy implementations. The engine
    /// itself never reads it; exits are governed by `max_holding_period`.
    pub holding_period: u32,
    /// Capital base per symbol; also the cap on total investment a single
    /// trade can reach through pyramiding.
    pub per_symbol_investment: f64,
    pub transaction_cost_rate: f64,
    pub commission_rate: f64,
    pub slippage_rate: f64,
    /// Number of concurrent slots the per-symbol capital is divided across
    /// when the sizer computes an entry value.
    pub max_investment_per_symbol: f64,
    /// Calendar days a trade may stay open. `f64::INFINITY` disables.
    pub max_holding_period: f64,
    /// Trailing semantics (drawdown from the peak combined value) when true,
    /// fixed semantics (return on combined entry value) when false.
    pub use_trailing_stop: bool,
    /// Loss threshold as a (negative) fraction, e.g. -0.05.
    pub stop_loss_fraction: f64,
    /// Profit-taking threshold as a fraction. `f64::INFINITY` disables.
    pub max_profit_fraction: f64,
    pub pyramid_scheme: PyramidScheme,
    pub position_sizing: PositionSizing,
}

impl Default for BacktestParams {
    fn default() -> Self {
        Self {
            holding_period: 20,
            per_symbol_investment: 50_000.0,
            transaction_cost_rate: 0.0003,
            commission_rate: 0.0,
            slippage_rate: 0.0,
            max_investment_per_symbol: 5.0,
            max_holding_period: f64::INFINITY,
            use_trailing_stop: true,
            stop_loss_fraction: -0.05,
            max_profit_fraction: f64::INFINITY,
            pyramid_scheme: PyramidScheme::Equal,
            position_sizing: PositionSizing::Equal,
        }
    }
}

impl BacktestParams {
    /// Checks the parameter set and returns it unchanged when sound.
    pub fn validated(self) -> Result<Self> {
        if !(self.per_symbol_investment.is_finite() && self.per_symbol_investment > 0.0) {
            return Err(EngineError::invalid_parameter(format!(
                "per_symbol_investment must be positive (value: {})",
                self.per_symbol_investment
            )));
        }
        if !(self.max_investment_per_symbol.is_finite() && self.max_investment_per_symbol > 0.0) {
            return Err(EngineError::invalid_parameter(format!(
                "max_investment_per_symbol must be positive (value: {})",
                self.max_investment_per_symbol
            )));
        }
        for (name, rate) in [
            ("transaction_cost_rate", self.transaction_cost_rate),
            ("commission_rate", self.commission_rate),
            ("slippage_rate", self.slippage_rate),
        ] {
            if !(rate.is_finite() && rate >= 0.0) {
                return Err(EngineError::invalid_parameter(format!(
                    "{} must be a non-negative finite rate (value: {})",
                    name, rate
                )));
            }
        }
        if self.max_holding_period.is_nan() || self.max_holding_period <= 0.0 {
            return Err(EngineError::invalid_parameter(format!(
                "max_holding_period must be positive (value: {})",
                self.max_holding_period
            )));
        }
        if self.stop_loss_fraction.is_nan() || self.stop_loss_fraction > 0.0 {
            return Err(EngineError::invalid_parameter(format!(
                "stop_loss_fraction must be zero or negative (value: {})",
                self.stop_loss_fraction
            )));
        }
        if self.max_profit_fraction.is_nan() || self.max_profit_fraction < 0.0 {
            return Err(EngineError::invalid_parameter(format!(
                "max_profit_fraction must be non-negative (value: {})",
                self.max_profit_fraction
            )));
        }
        Ok(self)
    }
}
