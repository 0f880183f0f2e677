//! Currency amount handling.
//!
//! Donations are stored in major units (rupees). The gateway speaks minor
//! units (paise) and, depending on the API version, delivers them as an
//! integer, a float, or a decimal string. Anything else fails closed.

use bigdecimal::num_bigint::{BigInt, Sign};
use bigdecimal::{BigDecimal, ToPrimitive, Zero};
use serde_json::Value;
use std::str::FromStr;

/// Largest amount the `NUMERIC(12, 2)` column holds, in minor units.
const MAX_DONATION_MINOR: i64 = 999_999_999_999;

/// Digits in `MAX_DONATION_MINOR`.
const MAX_MINOR_DIGITS: i64 = 12;

/// Bound on the mantissa before trailing zeros are folded away.
const MAX_MANTISSA_BITS: u64 = 128;

/// Largest donation accepted, in major units.
pub fn max_donation() -> BigDecimal {
    BigDecimal::new(MAX_DONATION_MINOR.into(), 2)
}

/// Splits `value` into a mantissa without trailing zeros and its scale.
/// Never rescales, so the cost depends on the digits written, not on the
/// exponent.
fn reduced(value: &BigDecimal) -> Result<(BigInt, i64), AmountError> {
    let (mut digits, mut scale) = value.as_bigint_and_exponent();
    if digits.bits() > MAX_MANTISSA_BITS {
        return Err(AmountError::TooManyDigits);
    }
    if digits.is_zero() {
        return Ok((digits, 0));
    }
    let ten = BigInt::from(10);
    while (&digits % &ten).is_zero() {
        digits /= &ten;
        scale -= 1;
    }
    Ok((digits, scale))
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AmountError {
    #[error("unsupported amount representation: {0}")]
    Unsupported(String),
    #[error("amount must be greater than zero")]
    NotPositive,
    #[error("amount has more than two decimal places")]
    TooPrecise,
    #[error("amount exceeds the maximum of 9999999999.99")]
    OutOfRange,
    #[error("amount has too many digits")]
    TooManyDigits,
}

/// Loosely-typed amount reported by the gateway, in minor units.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericAmount {
    Integer(i64),
    Float(f64),
    DecimalString(String),
}

impl TryFrom<&Value> for NumericAmount {
    type Error = AmountError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Self::Float(f))
                } else {
                    Err(AmountError::Unsupported(n.to_string()))
                }
            }
            Value::String(s) => Ok(Self::DecimalString(s.clone())),
            Value::Null => Err(AmountError::Unsupported("null".to_string())),
            Value::Bool(_) => Err(AmountError::Unsupported("boolean".to_string())),
            Value::Array(_) => Err(AmountError::Unsupported("array".to_string())),
            Value::Object(_) => Err(AmountError::Unsupported("object".to_string())),
        }
    }
}

impl NumericAmount {
    /// The amount in minor units as an exact decimal.
    pub fn to_minor(&self) -> Result<BigDecimal, AmountError> {
        match self {
            Self::Integer(i) => Ok(BigDecimal::from(*i)),
            Self::Float(f) => {
                if !f.is_finite() {
                    return Err(AmountError::Unsupported(f.to_string()));
                }
                // f64 Display never uses exponent notation.
                BigDecimal::from_str(&f.to_string())
                    .map_err(|_| AmountError::Unsupported(f.to_string()))
            }
            Self::DecimalString(s) => BigDecimal::from_str(s.trim())
                .map_err(|_| AmountError::Unsupported(format!("'{}'", s))),
        }
    }

    /// Converts to major units with two decimal places. Non-positive
    /// amounts are rejected.
    pub fn to_major_units(&self) -> Result<BigDecimal, AmountError> {
        let (digits, scale) = reduced(&self.to_minor()?)?;
        if digits.sign() != Sign::Plus {
            return Err(AmountError::NotPositive);
        }
        if scale > 0 {
            return Err(AmountError::Unsupported(
                "fractional minor-unit amount".to_string(),
            ));
        }
        if -scale > MAX_MINOR_DIGITS {
            return Err(AmountError::OutOfRange);
        }
        let minor = (digits * BigInt::from(10_i64.pow((-scale) as u32)))
            .to_i64()
            .ok_or(AmountError::OutOfRange)?;
        if minor > MAX_DONATION_MINOR {
            return Err(AmountError::OutOfRange);
        }
        Ok(BigDecimal::new(minor.into(), 2))
    }
}

/// Converts a requested major-unit amount into the integer minor units the
/// gateway expects for order creation.
///
/// The exponent is bounded before any rescaling, so a short input such as
/// `1e2000000` is rejected without expanding it.
pub fn to_minor_units(major: &BigDecimal) -> Result<i64, AmountError> {
    let (digits, scale) = reduced(major)?;
    if digits.sign() != Sign::Plus {
        return Err(AmountError::NotPositive);
    }
    if scale > 2 {
        return Err(AmountError::TooPrecise);
    }
    if -scale > MAX_MINOR_DIGITS - 2 {
        return Err(AmountError::OutOfRange);
    }
    // digits * 10^(2 - scale), with 2 - scale in [0, 12].
    let minor = (digits * BigInt::from(10_i64.pow((2 - scale) as u32)))
        .to_i64()
        .ok_or(AmountError::OutOfRange)?;
    if minor > MAX_DONATION_MINOR {
        return Err(AmountError::OutOfRange);
    }
    Ok(minor)
}
