use std::{
    fmt::Display,
    ops::{Add, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const MINOR_UNITS_PER_MAJOR: i64 = 100;
const FRACTION_DIGITS: usize = 2;

//--------------------------------------        Money         ---------------------------------------------------------
/// A monetary amount, held as a whole number of minor currency units (cents, centavos).
///
/// Amounts are never represented as floating point values. Decimal strings are parsed digit by digit, so "1500.10"
/// is exactly 150_010 minor units.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Value cannot be represented as a monetary amount: {0}")]
pub struct MoneyParseError(String);

impl From<i64> for Money {
    fn from(minor_units: i64) -> Self {
        Self(minor_units)
    }
}

impl FromStr for Money {
    type Err = MoneyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let (whole, fraction) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(MoneyParseError(format!("'{s}' contains no digits")));
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MoneyParseError(format!("'{s}' is not a decimal number")));
        }
        // Extra precision is only acceptable if it carries no value, e.g. "10.500"
        let (kept, excess) = fraction.split_at(fraction.len().min(FRACTION_DIGITS));
        if excess.bytes().any(|b| b != b'0') {
            return Err(MoneyParseError(format!("'{s}' has more than {FRACTION_DIGITS} decimal places")));
        }
        let whole = match whole {
            "" => 0,
            w => w.parse::<i64>().map_err(|e| MoneyParseError(format!("{s}: {e}")))?,
        };
        let mut cents = 0i64;
        for (i, b) in kept.bytes().enumerate() {
            let digit = i64::from(b - b'0');
            cents += digit * 10i64.pow((FRACTION_DIGITS - 1 - i) as u32);
        }
        let total = whole
            .checked_mul(MINOR_UNITS_PER_MAJOR)
            .and_then(|v| v.checked_add(cents))
            .ok_or_else(|| MoneyParseError(format!("'{s}' is too large")))?;
        Ok(Self(if negative { -total } else { total }))
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per_major = MINOR_UNITS_PER_MAJOR.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / per_major, abs % per_major)
    }
}

impl Money {
    pub fn minor_units(&self) -> i64 {
        self.0
    }

    pub fn from_major(units: i64) -> Self {
        Self(units * MINOR_UNITS_PER_MAJOR)
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// `None` if the product does not fit.
    pub fn checked_mul(self, rhs: i64) -> Option<Self> {
        self.0.checked_mul(rhs).map(Self)
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }
}
