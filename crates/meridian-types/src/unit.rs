//! Fixed-ratio time units.
//!
//! Conversions between human-readable magnitudes and the internal tick
//! representation. Every unit is expressed as a `numerator / denominator`
//! ratio of one second, and the internal unit is fixed once for all at
//! [`TimeUnit::INTERN`] (picoseconds).
//!
//! Converting from a finer to a coarser unit truncates:
//!
//! ```
//! # use meridian_types::TimeUnit;
//! assert_eq!(TimeUnit::Micros.to_unit(100, TimeUnit::Seconds).unwrap(), 0);
//! assert_eq!(TimeUnit::Hours.to_unit(3, TimeUnit::Millis).unwrap(), 10_800_000);
//! ```

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::TimeError;

/// A time unit with a fixed ratio to one second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeUnit {
    Femtos,
    Picos,
    Nanos,
    Micros,
    Millis,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Unit of the internal tick representation.
    pub const INTERN: TimeUnit = TimeUnit::Picos;

    /// All units, finest first.
    pub const ALL: [TimeUnit; 9] = [
        TimeUnit::Femtos,
        TimeUnit::Picos,
        TimeUnit::Nanos,
        TimeUnit::Micros,
        TimeUnit::Millis,
        TimeUnit::Seconds,
        TimeUnit::Minutes,
        TimeUnit::Hours,
        TimeUnit::Days,
    ];

    /// Standard abbreviation.
    pub fn abbrev(self) -> &'static str {
        match self {
            TimeUnit::Femtos => "fs",
            TimeUnit::Picos => "ps",
            TimeUnit::Nanos => "ns",
            TimeUnit::Micros => "us",
            TimeUnit::Millis => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "min",
            TimeUnit::Hours => "hr",
            TimeUnit::Days => "d",
        }
    }

    /// Seconds per unit, as `numerator / denominator`.
    pub fn ratio(self) -> (i128, i128) {
        match self {
            TimeUnit::Femtos => (1, 1_000_000_000_000_000),
            TimeUnit::Picos => (1, 1_000_000_000_000),
            TimeUnit::Nanos => (1, 1_000_000_000),
            TimeUnit::Micros => (1, 1_000_000),
            TimeUnit::Millis => (1, 1_000),
            TimeUnit::Seconds => (1, 1),
            TimeUnit::Minutes => (60, 1),
            TimeUnit::Hours => (3_600, 1),
            TimeUnit::Days => (86_400, 1),
        }
    }

    /// Converts `amount` of `self` into `unit`.
    pub fn to_unit(self, amount: i64, unit: TimeUnit) -> Result<i64, TimeError> {
        let (num, den) = self.ratio();
        let (unit_num, unit_den) = unit.ratio();
        let scaled = i128::from(amount) * num * unit_den / (den * unit_num);
        i64::try_from(scaled).map_err(|_| TimeError::Overflow {
            base: self.format(amount, true),
            delay: format!("conversion to {}", unit.abbrev()),
        })
    }

    /// Converts `amount` of `unit` into `self`.
    pub fn from_unit(self, amount: i64, unit: TimeUnit) -> Result<i64, TimeError> {
        unit.to_unit(amount, self)
    }

    /// Converts `amount` of `self` into internal ticks.
    pub fn to_intern(self, amount: i64) -> Result<i64, TimeError> {
        self.to_unit(amount, Self::INTERN)
    }

    /// Converts internal ticks into `self`.
    pub fn from_intern(self, ticks: i64) -> Result<i64, TimeError> {
        self.from_unit(ticks, Self::INTERN)
    }

    /// Formats `amount` followed by this unit's abbreviation.
    pub fn format(self, amount: i64, spaced: bool) -> String {
        if spaced {
            format!("{amount} {}", self.abbrev())
        } else {
            format!("{amount}{}", self.abbrev())
        }
    }

    /// Parses `"<integer>[ <abbrev>]"` into internal ticks.
    ///
    /// A missing unit means the value is already expressed in the internal
    /// unit.
    pub fn parse_time(input: &str) -> Result<i64, TimeError> {
        let mut parts = input.split_whitespace();
        let value = parts
            .next()
            .ok_or_else(|| TimeError::Parse(format!("empty time value: {input:?}")))?;
        let value: i64 = value
            .parse()
            .map_err(|e| TimeError::Parse(format!("invalid time amount {value:?}: {e}")))?;

        let Some(abbrev) = parts.next() else {
            return Ok(value);
        };
        if parts.next().is_some() {
            return Err(TimeError::Parse(format!("trailing input in {input:?}")));
        }
        abbrev.parse::<TimeUnit>()?.to_intern(value)
    }
}

impl FromStr for TimeUnit {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeUnit::ALL
            .into_iter()
            .find(|unit| unit.abbrev() == s)
            .ok_or_else(|| TimeError::Parse(format!("unknown time unit {s:?}")))
    }
}

impl Display for TimeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.abbrev())
    }
}
