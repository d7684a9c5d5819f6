use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;
use thiserror::Error;

/// Prices are stored in hundredths (cents).
pub const PRICE_SCALE: u32 = 2;
/// Quantities are stored in thousandths.
pub const QUANTITY_SCALE: u32 = 3;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("'{0}' is not a number")]
    NotANumber(String),
    #[error("amount cannot be negative: {0}")]
    Negative(Decimal),
    #[error("amount is out of range: {0}")]
    OutOfRange(Decimal),
}

/// Money in its stored, scaled integer form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(pub i64);

/// Quantity in thousandths of a unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity(pub i64);

impl Price {
    pub const ZERO: Self = Self(0);

    pub fn parse(s: &str) -> Result<Self, AmountError> {
        parse_decimal(s).and_then(Self::from_decimal)
    }

    pub fn from_decimal(value: Decimal) -> Result<Self, AmountError> {
        scale(value, PRICE_SCALE).map(Self)
    }

    /// The human-scale value, e.g. `12.50`.
    pub fn actual(self) -> Decimal {
        Decimal::new(self.0, PRICE_SCALE)
    }

    pub fn scaled(self) -> i64 {
        self.0
    }

    pub fn checked_add(self, other: Self) -> Result<Self, AmountError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or_else(|| AmountError::OutOfRange(self.actual() + other.actual()))
    }
}

impl Quantity {
    pub fn parse(s: &str) -> Result<Self, AmountError> {
        parse_decimal(s).and_then(Self::from_decimal)
    }

    pub fn from_decimal(value: Decimal) -> Result<Self, AmountError> {
        scale(value, QUANTITY_SCALE).map(Self)
    }

    pub fn actual(self) -> Decimal {
        Decimal::new(self.0, QUANTITY_SCALE)
    }

    pub fn scaled(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.actual())
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.actual())
    }
}

/// Value of one receipt line in price units: `price * quantity`, rounded
/// half up to a whole cent. `db::ITEM_VALUE_SQL` must compute the same thing.
pub fn line_value(price: Price, quantity: Quantity) -> Result<Price, AmountError> {
    let scale = 10_i128.pow(QUANTITY_SCALE);
    let value = (i128::from(price.0) * i128::from(quantity.0) + scale / 2).div_euclid(scale);
    i64::try_from(value).map(Price).map_err(|_| {
        AmountError::OutOfRange(
            price
                .actual()
                .checked_mul(quantity.actual())
                .unwrap_or(Decimal::MAX),
        )
    })
}

fn parse_decimal(s: &str) -> Result<Decimal, AmountError> {
    let cleaned = s.trim().replace(',', ".");
    Decimal::from_str(&cleaned).map_err(|_| AmountError::NotANumber(s.to_string()))
}

fn scale(value: Decimal, dp: u32) -> Result<i64, AmountError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(AmountError::Negative(value));
    }
    let rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    rounded
        .checked_mul(Decimal::from(10_i64.pow(dp)))
        .and_then(|d| d.to_i64())
        .ok_or(AmountError::OutOfRange(value))
}
