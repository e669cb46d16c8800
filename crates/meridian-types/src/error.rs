//! Time arithmetic and parsing errors

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    /// The result of a delay or unit conversion is not representable.
    #[error("time overflow: {base} + {delay} is not representable")]
    Overflow { base: String, delay: String },

    /// A raw tick count does not fit the target time domain.
    #[error("{0} ticks are outside the time domain")]
    OutOfDomain(i64),

    #[error("invalid time: {0}")]
    Parse(String),
}
