use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Div, Mul},
    str::FromStr,
};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::op;

//--------------------------------------        Money        ---------------------------------------------------------
/// A monetary amount in the order's currency. Amounts reported by the fulfillment provider are decimal strings, so
/// they are carried as exact decimals rather than floats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, AddAssign, add_assign);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<Decimal> for Money {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Div<Decimal> for Money {
    type Output = Option<Self>;

    /// Division by zero yields `None` instead of panicking.
    fn div(self, rhs: Decimal) -> Self::Output {
        self.0.checked_div(rhs).map(Self)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a monetary amount: {0}")]
pub struct MoneyConversionError(String);

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(Decimal::from(value))
    }
}

impl FromStr for Money {
    type Err = MoneyConversionError;

    /// Parses plain (`12.50`) and scientific (`1.25E1`) notation.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Decimal::from_str(s)
            .or_else(|_| Decimal::from_scientific(s))
            .map(Self)
            .map_err(|e| MoneyConversionError(format!("{s}. {e}")))
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Money {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    /// `None` when the product cannot be represented.
    pub fn checked_mul(&self, rhs: Decimal) -> Option<Self> {
        self.0.checked_mul(rhs).map(Self)
    }

    pub fn checked_add(&self, rhs: Money) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Like [`Sum`], but yields `None` instead of panicking when the total overflows.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(values: I) -> Option<Self> {
        values.into_iter().try_fold(Self::zero(), |acc, v| acc.checked_add(v))
    }

    /// Parses a provider-supplied figure, treating anything unparseable as zero.
    pub fn parse_or_zero(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }

    /// Two amounts are considered close when they differ by no more than one cent or one percent of the larger
    /// amount, whichever is greater.
    pub fn is_close(&self, other: &Money) -> bool {
        let one_cent = Decimal::new(1, 2);
        let larger = self.0.max(other.0);
        let tolerance = one_cent.max(larger * one_cent);
        match self.0.checked_sub(other.0) {
            Some(diff) => diff.abs() <= tolerance,
            None => false,
        }
    }
}

#[cfg(test)]
mod test {
    use rust_decimal::Decimal;

    use super::Money;

    fn m(s: &str) -> Money {
        s.parse().unwrap()
    }

    #[test]
    fn closeness_uses_one_percent_of_larger_value() {
        assert!(m("100").is_close(&m("101")));
        assert!(!m("100").is_close(&m("101.02")));
        assert!(m("0.001").is_close(&m("0.009")));
        assert!(!m("6").is_close(&m("12")));
        assert!(m("12").is_close(&m("12")));
    }

    #[test]
    fn parsing() {
        assert_eq!(m(" 12.50 "), Money::from(Decimal::new(1250, 2)));
        assert_eq!(m("1.5E1"), Money::from(15));
        assert!(Money::parse_or_zero("n/a").is_zero());
        assert!(Money::parse_or_zero("").is_zero());
    }

    #[test]
    fn arithmetic() {
        let total: Money = [m("1.10"), m("2.20"), m("3.30")].into_iter().sum();
        assert_eq!(total, m("6.60"));
        assert_eq!(m("2") * Decimal::from(3), m("6"));
        assert_eq!(m("6") / Decimal::from(3), Some(m("2")));
        assert_eq!(m("6") / Decimal::ZERO, None);
        assert_eq!(format!("{}", m("3.14159")), "3.14");
        assert_eq!((-m("4.5")).abs(), m("4.5"));
    }

    #[test]
    fn checked_arithmetic_reports_overflow() {
        let huge = Money::from(Decimal::MAX);
        assert_eq!(m("2.5").checked_mul(Decimal::from(2)), Some(m("5")));
        assert_eq!(m("1E28").checked_mul(Decimal::from(10)), None);
        assert_eq!(huge.checked_add(m("1")), None);
        assert_eq!(Money::checked_sum([m("1"), m("2")]), Some(m("3")));
        assert_eq!(Money::checked_sum([huge, huge]), None);
        assert!(!huge.is_close(&-huge));
    }
}
