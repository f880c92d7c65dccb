//! Currency amounts.

use std::fmt;
use std::iter::Sum;
use std::ops::Add;

use serde::{Deserialize, Serialize};

/// An amount in integer cents. Serialized as the bare cent count.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money {
    cents: i64,
}

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Price of `quantity` units at this unit price.
    pub fn times(&self, quantity: u32) -> Money {
        Money::from_cents(self.cents * i64::from(quantity))
    }
}

/// Dollars with two decimals, e.g. `$199.98`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Money {
        Money::from_cents(self.cents + rhs.cents)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}
