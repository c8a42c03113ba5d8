use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Errors raised while mapping prices onto the tick grid
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PrecisionError {
    /// Tick size is zero or negative
    #[error("Invalid tick size: {0}")]
    InvalidIncrement(Decimal),
    /// Price does not fit an i64 tick key
    #[error("Price {price} is outside the representable key range for tick size {increment}")]
    PriceOutOfRange { price: Decimal, increment: Decimal },
    /// Price is not an exact multiple of the tick size
    #[error("Price {price} is not aligned to tick size {increment}")]
    Misaligned { price: Decimal, increment: Decimal },
}

/// Maps decimal prices to integer tick keys and back.
///
/// Prices that sit between two ticks are rounded half-to-even so that a
/// stream of mid-tick prints does not drift in one direction.
#[derive(Debug, Clone, Default)]
pub struct PricePrecisionManager {
    /// Reject prices that are not exact tick multiples instead of rounding them
    pub strict_alignment: bool,
}

impl PricePrecisionManager {
    pub fn strict() -> Self {
        Self { strict_alignment: true }
    }

    /// Convert price to its tick key
    pub fn price_to_key(&self, price: Decimal, increment: Decimal) -> Result<i64, PrecisionError> {
        self.validate_increment(increment)?;

        let ratio = price
            .checked_div(increment)
            .ok_or(PrecisionError::PriceOutOfRange { price, increment })?;

        if self.strict_alignment && !ratio.fract().is_zero() {
            return Err(PrecisionError::Misaligned { price, increment });
        }

        ratio
            .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
            .to_i64()
            .ok_or(PrecisionError::PriceOutOfRange { price, increment })
    }

    /// Convert tick key back to price
    pub fn key_to_price(&self, key: i64, increment: Decimal) -> Result<Decimal, PrecisionError> {
        self.validate_increment(increment)?;
        Decimal::from(key)
            .checked_mul(increment)
            .ok_or(PrecisionError::PriceOutOfRange { price: Decimal::from(key), increment })
    }

    /// Snap a price onto the nearest tick
    pub fn quantize(&self, price: Decimal, increment: Decimal) -> Result<Decimal, PrecisionError> {
        let key = self.price_to_key(price, increment)?;
        self.key_to_price(key, increment)
    }

    pub fn is_aligned(&self, price: Decimal, increment: Decimal) -> bool {
        increment > Decimal::ZERO && (price % increment).is_zero()
    }

    fn validate_increment(&self, increment: Decimal) -> Result<(), PrecisionError> {
        if increment <= Decimal::ZERO {
            return Err(PrecisionError::InvalidIncrement(increment));
        }
        Ok(())
    }
}
