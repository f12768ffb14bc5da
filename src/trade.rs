use crate::context::RunContext;
use crate::error::{EngineError, Result};
use crate::models::{CostPosting, Direction, PyramidScheme, TradeKey};
use crate::sizing::{
    determine_entry_value, next_incremental_value, opening_increment, volatility_breakout,
    InitialSizingParams, VOLATILITY_WINDOW,
};
use chrono::NaiveDate;

/// One hedged position: a primary leg plus an optional equal-notional hedge
/// leg in the opposite market direction.
///
/// `shares` reflects entry and add events only; `current_value` compounds by
/// the daily return, so the two are not kept consistent day to day. All
/// hedge fields stay zero when there is no hedge symbol. Once `to_close` is
/// set it is never unset.
#[derive(Debug, Clone)]
pub struct Trade {
    pub symbol: String,
    pub hedge_symbol: Option<String>,
    pub direction: Direction,

    pub entry_date: Option<NaiveDate>,
    pub shares: f64,
    pub entry_price: f64,
    pub entry_value: f64,
    pub current_value: f64,
    pub current_pl: f64,

    pub hedge_shares: f64,
    pub hedge_entry_price: f64,
    pub hedge_entry_value: f64,
    pub hedge_current_value: f64,
    pub hedge_current_pl: f64,

    /// High-water mark of the combined primary+hedge value.
    pub max_port_value: f64,
    pub to_close: bool,

    pub incremental_entry_value: f64,
    pub num_increases: u32,
    /// Cap on total entry value across all increments.
    pub max_ever_investable: f64,
}

impl Trade {
    pub fn new(
        symbol: impl Into<String>,
        hedge_symbol: Option<String>,
        direction: Direction,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            hedge_symbol,
            direction,
            entry_date: None,
            shares: 0.0,
            entry_price: 0.0,
            entry_value: 0.0,
            current_value: 0.0,
            current_pl: 0.0,
            hedge_shares: 0.0,
            hedge_entry_price: 0.0,
            hedge_entry_value: 0.0,
            hedge_current_value: 0.0,
            hedge_current_pl: 0.0,
            max_port_value: 0.0,
            to_close: false,
            incremental_entry_value: 0.0,
            num_increases: 0,
            max_ever_investable: 0.0,
        }
    }

    pub fn key(&self) -> TradeKey {
        TradeKey {
            symbol: self.symbol.clone(),
            direction: self.direction,
        }
    }

    pub fn hedge_direction(&self) -> Direction {
        self.direction.opposite()
    }

    pub fn combined_value(&self) -> f64 {
        self.current_value + self.hedge_current_value
    }

    pub fn combined_entry_value(&self) -> f64 {
        self.entry_value + self.hedge_entry_value
    }

    /// Total unrealized P&L relative to entry, both legs.
    pub fn total_pl(&self) -> f64 {
        self.combined_value() - self.combined_entry_value()
    }

    /// Value attributed to long market exposure (both legs).
    pub fn long_value(&self) -> f64 {
        match self.direction {
            Direction::Long => self.current_value,
            Direction::Short => self.hedge_current_value,
        }
    }

    /// Value attributed to short market exposure (both legs).
    pub fn short_value(&self) -> f64 {
        match self.direction {
            Direction::Long => self.hedge_current_value,
            Direction::Short => self.current_value,
        }
    }

    pub fn long_pl(&self) -> f64 {
        match self.direction {
            Direction::Long => self.current_pl,
            Direction::Short => self.hedge_current_pl,
        }
    }

    pub fn short_pl(&self) -> f64 {
        match self.direction {
            Direction::Long => self.hedge_current_pl,
            Direction::Short => self.current_pl,
        }
    }

    fn priced(ctx: &RunContext, symbol: &str, date: NaiveDate) -> Result<f64> {
        let price = ctx.data.close(symbol, date)?;
        if price.is_finite() && price > 0.0 {
            Ok(price)
        } else {
            Err(EngineError::missing_data(symbol, date))
        }
    }

    /// Opens the trade on `date`, sizing it from `capital_hint` when given
    /// (the portfolio always provides one) or through the position sizer
    /// otherwise. Returns the entry cost posting for the caller to apply.
    pub fn open(
        &mut self,
        ctx: &RunContext,
        date: NaiveDate,
        capital_hint: Option<f64>,
    ) -> Result<CostPosting> {
        let entry_price = Self::priced(ctx, &self.symbol, date)?;
        self.max_ever_investable = ctx.params.per_symbol_investment;

        let entry_value = match capital_hint {
            Some(value) => value,
            None => determine_entry_value(InitialSizingParams {
                data: &ctx.data,
                symbol: &self.symbol,
                date,
                scheme: ctx.params.position_sizing,
                available_capital: ctx.params.per_symbol_investment,
                max_investment_per_symbol: ctx.params.max_investment_per_symbol,
            })?,
        };
        if !(entry_value.is_finite() && entry_value > 0.0) {
            return Err(EngineError::invalid_parameter(format!(
                "entry value for {} must be positive (value: {})",
                self.symbol, entry_value
            )));
        }

        self.entry_date = Some(date);
        self.entry_price = entry_price;
        self.entry_value = entry_value;
        self.current_value = entry_value;
        self.shares = entry_value / entry_price;

        if let Some(hedge_symbol) = self.hedge_symbol.clone() {
            let hedge_price = Self::priced(ctx, &hedge_symbol, date)?;
            self.hedge_entry_price = hedge_price;
            self.hedge_entry_value = entry_value;
            self.hedge_current_value = entry_value;
            self.hedge_shares = entry_value / hedge_price;
        }

        self.incremental_entry_value = opening_increment(ctx.params.pyramid_scheme, entry_value);
        self.max_port_value = self.combined_value();

        Ok(CostPosting {
            date,
            value: self.current_value,
            hedge_value: self.hedge_current_value,
            direction: self.direction,
        })
    }

    /// Applies the day's return to both legs, attempts at most one
    /// pyramiding increment, and refreshes the value high-water mark.
    /// Returns the incremental cost posting when an increment happened.
    pub fn mark_to_market(
        &mut self,
        ctx: &RunContext,
        date: NaiveDate,
    ) -> Result<Option<CostPosting>> {
        let signed_return = self.direction.sign() * ctx.data.daily_return(&self.symbol, date)?;
        self.current_pl = self.current_value * signed_return;
        self.current_value += self.current_pl;

        if let Some(hedge_symbol) = self.hedge_symbol.clone() {
            let hedge_signed =
                self.hedge_direction().sign() * ctx.data.daily_return(&hedge_symbol, date)?;
            self.hedge_current_pl = self.hedge_current_value * hedge_signed;
            self.hedge_current_value += self.hedge_current_pl;
        } else {
            self.hedge_current_pl = 0.0;
        }

        let trailing_std = ctx
            .data
            .trailing_return_std(&self.symbol, date, VOLATILITY_WINDOW)?;
        let posting = if volatility_breakout(signed_return, trailing_std) {
            self.grow(ctx, date)?
        } else {
            None
        };

        self.max_port_value = self.max_port_value.max(self.combined_value());
        Ok(posting)
    }

    /// Adds the next increment to both legs at current prices. A capped
    /// increment of zero or less performs no add.
    fn grow(&mut self, ctx: &RunContext, date: NaiveDate) -> Result<Option<CostPosting>> {
        if ctx.params.pyramid_scheme == PyramidScheme::None {
            return Ok(None);
        }

        self.incremental_entry_value = self
            .incremental_entry_value
            .min(self.max_ever_investable - self.entry_value);
        let add_value = self.incremental_entry_value;
        if add_value <= 0.0 {
            return Ok(None);
        }

        let price = Self::priced(ctx, &self.symbol, date)?;
        let add_shares = add_value / price;

        let mut add_hedge_value = 0.0;
        if let Some(hedge_symbol) = self.hedge_symbol.clone() {
            let hedge_price = Self::priced(ctx, &hedge_symbol, date)?;
            add_hedge_value = add_value;
            let add_hedge_shares = add_hedge_value / hedge_price;
            if self.hedge_shares + add_hedge_shares > 0.0 {
                self.hedge_entry_price = (self.hedge_entry_price * self.hedge_shares
                    + hedge_price * add_hedge_shares)
                    / (self.hedge_shares + add_hedge_shares);
            }
            self.hedge_shares += add_hedge_shares;
            self.hedge_current_value += add_hedge_value;
            self.hedge_entry_value += add_hedge_value;
        }

        self.entry_price = (self.entry_price * self.shares + price * add_shares)
            / (self.shares + add_shares);
        self.shares += add_shares;
        self.current_value += add_value;
        self.entry_value += add_value;

        self.num_increases += 1;
        self.incremental_entry_value = next_incremental_value(
            ctx.params.pyramid_scheme,
            self.incremental_entry_value,
            self.num_increases,
        );

        let combined = self.combined_value();
        if combined > self.max_port_value {
            self.max_port_value = combined;
        }

        Ok(Some(CostPosting {
            date,
            value: add_value,
            hedge_value: add_hedge_value,
            direction: self.direction,
        }))
    }

    /// Evaluates the holding-period and loss/profit constraints, latching
    /// `to_close` on any breach. Returns the latched flag.
    pub fn check_exit(&mut self, ctx: &RunContext, date: NaiveDate) -> bool {
        let Some(entry_date) = self.entry_date else {
            return self.to_close;
        };

        let days_held = (date - entry_date).num_days() as f64;
        if days_held >= ctx.params.max_holding_period {
            self.to_close = true;
        } else {
            let combined = self.combined_value();
            let total_return = if ctx.params.use_trailing_stop {
                (combined - self.max_port_value) / self.max_port_value
            } else {
                let combined_entry = self.combined_entry_value();
                (combined - combined_entry) / combined_entry
            };
            if total_return <= ctx.params.stop_loss_fraction {
                self.to_close = true;
            }
            if total_return >= ctx.params.max_profit_fraction {
                self.to_close = true;
            }
        }

        self.to_close
    }
}
