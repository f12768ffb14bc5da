use chrono::NaiveDate;
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Error types raised by the simulation core.
///
/// Ratio computations with zero denominators are never errors; each metric
/// defines its own sentinel (infinity or an absent value) instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The market data collaborator has no row for this symbol/date.
    #[error("No market data for {symbol} on {date}")]
    MissingData { symbol: String, date: NaiveDate },

    /// A trailing-window computation found too little usable history.
    #[error("Insufficient history for {symbol} on {date}: {detail}")]
    InsufficientHistory {
        symbol: String,
        date: NaiveDate,
        detail: String,
    },

    /// Misconfiguration caught at construction time. Fatal, never retried.
    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },
}

impl EngineError {
    pub fn missing_data(symbol: impl Into<String>, date: NaiveDate) -> Self {
        Self::MissingData {
            symbol: symbol.into(),
            date,
        }
    }

    pub fn insufficient_history(
        symbol: impl Into<String>,
        date: NaiveDate,
        detail: impl Into<String>,
    ) -> Self {
        Self::InsufficientHistory {
            symbol: symbol.into(),
            date,
            detail: detail.into(),
        }
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }
}
