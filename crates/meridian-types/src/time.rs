//! Virtual time for the simulation kernel.
//!
//! A [`VirtualTime`] is either a finite point `At(u)` on an ordered domain
//! `U`, or [`VirtualTime::Never`], the reserved infinite value. Time only
//! moves when the super-scheduler dispatches events; nothing here ever reads
//! the wall clock.
//!
//! # Ordering
//!
//! ```text
//! At(0) < At(1) < ... < At(U::MAX) < Never
//! ```
//!
//! `Never` sorts after every finite value and compares equal only to itself,
//! which lets "no pending event" take part in min-of-deadlines computations
//! without an extra `Option` layer.

use std::fmt::{Debug, Display};
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::TimeError;

/// Default time domain: signed 64-bit ticks of the internal time unit.
///
/// Signed so that a negative delay can express "no timeout" for condition
/// waits.
pub type Ticks = i64;

// ============================================================================
// Time Domain
// ============================================================================

/// The comparable value domain underneath a [`VirtualTime`].
///
/// Delay arithmetic is checked: an addition that cannot be represented is a
/// fatal [`TimeError::Overflow`], never a wraparound.
pub trait TimeDomain:
    Copy + Ord + Hash + Debug + Display + Send + Sync + TryFrom<i64> + 'static
{
    /// The origin of the timeline.
    const ZERO: Self;

    /// Adds two values, returning `None` when the result is not representable.
    fn checked_add(self, rhs: Self) -> Option<Self>;

    /// Returns `true` for values strictly below [`TimeDomain::ZERO`].
    fn is_negative(self) -> bool;
}

macro_rules! impl_signed_domain {
    ($($t:ty),*) => {
        $(
            impl TimeDomain for $t {
                const ZERO: Self = 0;

                #[inline]
                fn checked_add(self, rhs: Self) -> Option<Self> {
                    <$t>::checked_add(self, rhs)
                }

                #[inline]
                fn is_negative(self) -> bool {
                    self < 0
                }
            }
        )*
    };
}

macro_rules! impl_unsigned_domain {
    ($($t:ty),*) => {
        $(
            impl TimeDomain for $t {
                const ZERO: Self = 0;

                #[inline]
                fn checked_add(self, rhs: Self) -> Option<Self> {
                    <$t>::checked_add(self, rhs)
                }

                #[inline]
                fn is_negative(self) -> bool {
                    false
                }
            }
        )*
    };
}

impl_signed_domain!(i32, i64);
impl_unsigned_domain!(u32, u64);

// ============================================================================
// Virtual Time
// ============================================================================

/// A point on the simulation timeline, or the infinite value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VirtualTime<U = Ticks> {
    /// A finite point in time.
    At(U),
    /// The reserved "never" value. Sorts after every finite time.
    Never,
}

impl<U: TimeDomain> VirtualTime<U> {
    /// The infinite time.
    pub const NEVER: Self = VirtualTime::Never;

    /// Creates a finite time.
    #[inline]
    pub fn at(value: U) -> Self {
        VirtualTime::At(value)
    }

    /// The origin of the timeline.
    #[inline]
    pub fn zero() -> Self {
        VirtualTime::At(U::ZERO)
    }

    /// Converts a raw internal tick count into this domain.
    pub fn from_ticks(ticks: i64) -> Result<Self, TimeError> {
        U::try_from(ticks)
            .map(VirtualTime::At)
            .map_err(|_| TimeError::OutOfDomain(ticks))
    }

    /// Returns `true` for the infinite value.
    #[inline]
    pub fn is_infinite(self) -> bool {
        matches!(self, VirtualTime::Never)
    }

    /// Returns the finite value, or `None` for the infinite time.
    #[inline]
    pub fn get(self) -> Option<U> {
        match self {
            VirtualTime::At(value) => Some(value),
            VirtualTime::Never => None,
        }
    }

    /// Returns the time `delay` after `self`.
    ///
    /// The infinite time stays infinite. A finite result that cannot be
    /// represented in `U` is an [`TimeError::Overflow`].
    pub fn delayed(self, delay: U) -> Result<Self, TimeError> {
        match self {
            VirtualTime::Never => Ok(VirtualTime::Never),
            VirtualTime::At(base) => base
                .checked_add(delay)
                .map(VirtualTime::At)
                .ok_or_else(|| TimeError::Overflow {
                    base: base.to_string(),
                    delay: delay.to_string(),
                }),
        }
    }

    /// Returns `true` if `self` is strictly before `other`.
    #[inline]
    pub fn is_before(self, other: Self) -> bool {
        self < other
    }

    /// Returns `true` if `self` is strictly after `other`.
    #[inline]
    pub fn is_after(self, other: Self) -> bool {
        self > other
    }
}

impl<U: TimeDomain> Default for VirtualTime<U> {
    fn default() -> Self {
        Self::zero()
    }
}

impl<U: Display> Display for VirtualTime<U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VirtualTime::At(value) => write!(f, "T={value}"),
            VirtualTime::Never => write!(f, "T=inf"),
        }
    }
}

impl<U: TimeDomain> From<U> for VirtualTime<U> {
    fn from(value: U) -> Self {
        VirtualTime::At(value)
    }
}

// ============================================================================
// Tests
// ============================================================================
