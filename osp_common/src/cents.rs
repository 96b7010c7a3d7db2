use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

/// A monetary amount in minor currency units (cents).
///
/// All prices, totals and settlement figures in the platform are integers in minor units. Fractional
/// amounts do not exist anywhere in the system, so `Cents` wraps an `i64` and never touches floats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Cents(i64);

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in cents: {0}")]
pub struct CentsConversionError(String);

impl Cents {
    pub const ZERO: Cents = Cents(0);

    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl From<i64> for Cents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Cents {
    type Error = CentsConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(CentsConversionError(format!("{value} is too large")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Add for Cents {
    type Output = Cents;

    fn add(self, rhs: Self) -> Self::Output {
        Cents(self.0 + rhs.0)
    }
}

impl Sub for Cents {
    type Output = Cents;

    fn sub(self, rhs: Self) -> Self::Output {
        Cents(self.0 - rhs.0)
    }
}

impl AddAssign for Cents {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Cents {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Cents {
    type Output = Cents;

    fn neg(self) -> Self::Output {
        Cents(-self.0)
    }
}

/// Unit price × quantity.
impl Mul<i64> for Cents {
    type Output = Cents;

    fn mul(self, rhs: i64) -> Self::Output {
        Cents(self.0 * rhs)
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Cents::ZERO, Add::add)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arithmetic() {
        let price = Cents::new(1000);
        assert_eq!(price * 2, Cents::new(2000));
        assert_eq!(price + Cents::new(500), Cents::new(1500));
        assert_eq!(price - Cents::new(300), Cents::new(700));
        let mut total = Cents::ZERO;
        total += Cents::new(250);
        total += Cents::new(250);
        assert_eq!(total.value(), 500);
    }

    #[test]
    fn display_formats_major_and_minor_units() {
        assert_eq!(Cents::new(123_456).to_string(), "1234.56");
        assert_eq!(Cents::new(7).to_string(), "0.07");
        assert_eq!(Cents::new(-150).to_string(), "-1.50");
    }

    #[test]
    fn sums_an_iterator() {
        let total: Cents = [100, 200, 300].into_iter().map(Cents::new).sum();
        assert_eq!(total, Cents::new(600));
    }
}
