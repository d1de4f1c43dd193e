//! Deterministic fixed-point and wide-integer primitives
//!
//! Ratios, fees and prices are `rust_decimal::Decimal` values: a 96-bit
//! mantissa with up to 28 fractional digits, computed with integer arithmetic
//! only, so every platform produces identical bits. Base token amounts are
//! `u128` and never pass through `Decimal` themselves: amount products and
//! quotients are taken in `U256`, and only ratios are lifted into the decimal
//! domain. The stableswap solver works in `U256` to keep products such as
//! `D^(n+1)` from overflowing.
//!
//! Rounding rules:
//! - [`mul_floor`] and [`mul_div_floor`] round down (amounts paid out by
//!   the pool)
//! - [`mul_ceil`], [`div_ceil`] and [`mul_div_ceil`] round up
//!   (amounts paid into the pool)
//! - [`ratio`] truncates, [`ratio_ceil`] rounds up, at 28 fractional digits
//!   or as many as the mantissa allows
//! - [`approx_sqrt`] stops once a Newton step moves by at most 10^-18

use crate::error::{AmmError, AmmResult};
use primitive_types::U256;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;

/// Base token amount
pub type Amount = u128;

const SQRT_MAX_ITERATIONS: usize = 300;
const DECIMAL_MAX_SCALE: u32 = 28;
const SQRT_EPSILON: Decimal = dec!(0.000000000000000001);

pub fn add(lhs: Decimal, rhs: Decimal) -> AmmResult<Decimal> {
    lhs.checked_add(rhs).ok_or(AmmError::Overflow {
        operation: "decimal addition",
    })
}

pub fn sub(lhs: Decimal, rhs: Decimal) -> AmmResult<Decimal> {
    lhs.checked_sub(rhs).ok_or(AmmError::Overflow {
        operation: "decimal subtraction",
    })
}

pub fn mul(lhs: Decimal, rhs: Decimal) -> AmmResult<Decimal> {
    lhs.checked_mul(rhs).ok_or(AmmError::Overflow {
        operation: "decimal multiplication",
    })
}

pub fn quo(lhs: Decimal, rhs: Decimal) -> AmmResult<Decimal> {
    if rhs.is_zero() {
        return Err(AmmError::DivisionByZero {
            operation: "decimal division",
        });
    }
    lhs.checked_div(rhs).ok_or(AmmError::Overflow {
        operation: "decimal division",
    })
}

/// `1 - value`, used for fee complements
pub fn one_minus(value: Decimal) -> AmmResult<Decimal> {
    sub(Decimal::ONE, value)
}

/// Square root by Newton's method: x_new = (x + value/x) / 2
///
/// The iteration count is bounded and the stopping rule depends only on the
/// input, so the result is reproducible bit for bit.
pub fn approx_sqrt(value: Decimal) -> AmmResult<Decimal> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(AmmError::NegativeValue { value });
    }
    if value.is_zero() || value == Decimal::ONE {
        return Ok(value);
    }

    let mut x = if value > Decimal::ONE {
        value
    } else {
        Decimal::ONE
    };

    for _ in 0..SQRT_MAX_ITERATIONS {
        let next_x = quo(add(x, quo(value, x)?)?, dec!(2))?;
        let delta = (next_x - x).abs();
        x = next_x;
        if delta <= SQRT_EPSILON {
            break;
        }
    }

    Ok(x)
}

/// `base ^ exponent`; exact for integral exponents
pub fn pow(base: Decimal, exponent: Decimal) -> AmmResult<Decimal> {
    const OPERATION: &str = "decimal power";

    if exponent.fract().is_zero() {
        let exp = exponent
            .to_i64()
            .ok_or(AmmError::Overflow { operation: OPERATION })?;
        base.checked_powi(exp)
            .ok_or(AmmError::Overflow { operation: OPERATION })
    } else {
        base.checked_powd(exponent)
            .ok_or(AmmError::Overflow { operation: OPERATION })
    }
}

/// `num / den` as a decimal, rounded down
pub fn ratio(num: U256, den: U256) -> AmmResult<Decimal> {
    lift_ratio(num, den, false)
}

/// `num / den` as a decimal, rounded up in the last digit
pub fn ratio_ceil(num: U256, den: U256) -> AmmResult<Decimal> {
    lift_ratio(num, den, true)
}

/// Ratio of two base amounts, rounded down
pub fn amount_ratio(num: Amount, den: Amount) -> AmmResult<Decimal> {
    ratio(u256_from(num), u256_from(den))
}

fn lift_ratio(num: U256, den: U256, round_up: bool) -> AmmResult<Decimal> {
    if den.is_zero() {
        return Err(AmmError::DivisionByZero {
            operation: "ratio",
        });
    }
    let max_mantissa = U256::from(Decimal::MAX.mantissa().unsigned_abs());

    // Largest scale whose quotient still fits the 96-bit mantissa
    for scale in (0..=DECIMAL_MAX_SCALE).rev() {
        let Some(scaled) = num.checked_mul(U256::exp10(scale as usize)) else {
            continue;
        };
        let quotient = if round_up {
            u256_div_ceil(scaled, den)?
        } else {
            scaled / den
        };
        if quotient <= max_mantissa {
            let mantissa = i128::try_from(quotient.low_u128()).map_err(|_| AmmError::Overflow {
                operation: "ratio",
            })?;
            return Decimal::try_from_i128_with_scale(mantissa, scale).map_err(|_| {
                AmmError::Overflow {
                    operation: "ratio",
                }
            });
        }
    }

    Err(AmmError::AmountOverflow {
        value: (num / den).to_string(),
    })
}

/// Mantissa and `10^scale` of a non-negative decimal
pub fn decimal_parts(factor: Decimal) -> AmmResult<(U256, U256)> {
    if factor.is_sign_negative() && !factor.is_zero() {
        return Err(AmmError::NegativeValue { value: factor });
    }
    Ok((
        U256::from(factor.mantissa().unsigned_abs()),
        U256::exp10(factor.scale() as usize),
    ))
}

/// `amount * factor`, rounded down
pub fn mul_floor(amount: Amount, factor: Decimal) -> AmmResult<Amount> {
    let (mantissa, scale) = decimal_parts(factor)?;
    u256_to_amount(u256_div(u256_mul(u256_from(amount), mantissa)?, scale)?)
}

/// `amount * factor`, rounded up
pub fn mul_ceil(amount: Amount, factor: Decimal) -> AmmResult<Amount> {
    let (mantissa, scale) = decimal_parts(factor)?;
    u256_to_amount(u256_div_ceil(u256_mul(u256_from(amount), mantissa)?, scale)?)
}

/// `amount / factor`, rounded up
pub fn div_ceil(amount: Amount, factor: Decimal) -> AmmResult<Amount> {
    let (mantissa, scale) = decimal_parts(factor)?;
    u256_to_amount(u256_div_ceil(u256_mul(u256_from(amount), scale)?, mantissa)?)
}

/// `a * b / c`, rounded down, exact for any `u128` operands
pub fn mul_div_floor(a: Amount, b: Amount, c: Amount) -> AmmResult<Amount> {
    u256_to_amount(u256_div(u256_mul(u256_from(a), u256_from(b))?, u256_from(c))?)
}

/// `a * b / c`, rounded up
pub fn mul_div_ceil(a: Amount, b: Amount, c: Amount) -> AmmResult<Amount> {
    u256_to_amount(u256_div_ceil(u256_mul(u256_from(a), u256_from(b))?, u256_from(c))?)
}

pub fn u256_from(amount: Amount) -> U256 {
    U256::from(amount)
}

/// Narrow a solver result back to a base amount
pub fn u256_to_amount(value: U256) -> AmmResult<Amount> {
    if value > U256::from(u128::MAX) {
        return Err(AmmError::AmountOverflow {
            value: value.to_string(),
        });
    }
    Ok(value.low_u128())
}

pub fn u256_add(lhs: U256, rhs: U256) -> AmmResult<U256> {
    lhs.checked_add(rhs).ok_or(AmmError::Overflow {
        operation: "u256 addition",
    })
}

pub fn u256_sub(lhs: U256, rhs: U256) -> AmmResult<U256> {
    lhs.checked_sub(rhs).ok_or(AmmError::Overflow {
        operation: "u256 subtraction",
    })
}

pub fn u256_mul(lhs: U256, rhs: U256) -> AmmResult<U256> {
    lhs.checked_mul(rhs).ok_or(AmmError::Overflow {
        operation: "u256 multiplication",
    })
}

pub fn u256_div(lhs: U256, rhs: U256) -> AmmResult<U256> {
    if rhs.is_zero() {
        return Err(AmmError::DivisionByZero {
            operation: "u256 division",
        });
    }
    Ok(lhs / rhs)
}

pub fn u256_div_ceil(lhs: U256, rhs: U256) -> AmmResult<U256> {
    let quotient = u256_div(lhs, rhs)?;
    if (lhs % rhs).is_zero() {
        Ok(quotient)
    } else {
        u256_add(quotient, U256::one())
    }
}

pub fn u256_abs_diff(lhs: U256, rhs: U256) -> U256 {
    if lhs > rhs {
        lhs - rhs
    } else {
        rhs - lhs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqrt_accuracy() {
        let result = approx_sqrt(dec!(100)).unwrap();
        assert!((result - dec!(10)).abs() < dec!(0.000000000001));

        let result = approx_sqrt(dec!(2)).unwrap();
        assert!((result - dec!(1.414213562373095048)).abs() < dec!(0.000000000001));

        let result = approx_sqrt(dec!(0.25)).unwrap();
        assert!((result - dec!(0.5)).abs() < dec!(0.000000000001));
    }

    #[test]
    fn test_sqrt_edges() {
        assert_eq!(approx_sqrt(Decimal::ZERO).unwrap(), Decimal::ZERO);
        assert_eq!(approx_sqrt(Decimal::ONE).unwrap(), Decimal::ONE);
        assert!(matches!(
            approx_sqrt(dec!(-4)),
            Err(AmmError::NegativeValue { .. })
        ));
    }

    #[test]
    fn test_sqrt_is_deterministic() {
        let a = approx_sqrt(dec!(1.7320508)).unwrap();
        let b = approx_sqrt(dec!(1.7320508)).unwrap();
        assert_eq!(a.serialize(), b.serialize());
    }

    #[test]
    fn test_quo_by_zero() {
        assert!(matches!(
            quo(dec!(1), Decimal::ZERO),
            Err(AmmError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_integral_pow_is_exact() {
        assert_eq!(pow(dec!(0.5), dec!(1)).unwrap(), dec!(0.5));
        assert_eq!(pow(dec!(0.5), dec!(3)).unwrap(), dec!(0.125));
    }

    #[test]
    fn test_fractional_pow() {
        let result = pow(dec!(0.25), dec!(0.5)).unwrap();
        assert!((result - dec!(0.5)).abs() < dec!(0.0000001));
    }

    #[test]
    fn test_ratio_rounding() {
        let third = ratio(U256::from(1u8), U256::from(3u8)).unwrap();
        assert_eq!(third, dec!(0.3333333333333333333333333333));
        let third_up = ratio_ceil(U256::from(1u8), U256::from(3u8)).unwrap();
        assert_eq!(third_up, dec!(0.3333333333333333333333333334));
        assert_eq!(ratio(U256::from(4u8), U256::from(2u8)).unwrap(), dec!(2));
        assert!(matches!(
            ratio(U256::one(), U256::zero()),
            Err(AmmError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_ratio_of_amounts_beyond_decimal_range() {
        let huge = 10u128.pow(36);
        assert_eq!(amount_ratio(huge, 2 * huge).unwrap(), dec!(0.5));
        // Large quotients drop fractional digits instead of failing
        let big = amount_ratio(10u128.pow(28), 3).unwrap();
        assert_eq!(big.scale(), 1);
        assert_eq!(big.trunc(), dec!(3333333333333333333333333333));
        assert!(matches!(
            amount_ratio(u128::MAX, 1),
            Err(AmmError::AmountOverflow { .. })
        ));
    }

    #[test]
    fn test_scaled_amount_products() {
        assert_eq!(mul_floor(1_000, dec!(0.997)).unwrap(), 997);
        assert_eq!(mul_floor(999, dec!(0.5)).unwrap(), 499);
        assert_eq!(mul_ceil(999, dec!(0.5)).unwrap(), 500);
        assert_eq!(div_ceil(997, dec!(0.997)).unwrap(), 1_000);
        assert_eq!(div_ceil(10, dec!(0.997)).unwrap(), 11);
        assert!(div_ceil(10, Decimal::ZERO).is_err());
        assert!(mul_floor(10, dec!(-0.1)).is_err());

        let huge = 10u128.pow(30);
        assert_eq!(mul_floor(huge, dec!(0.25)).unwrap(), huge / 4);
        assert_eq!(mul_div_floor(huge, huge, 4 * huge).unwrap(), huge / 4);
        assert_eq!(mul_div_floor(7, 10, 3).unwrap(), 23);
        assert_eq!(mul_div_ceil(7, 10, 3).unwrap(), 24);
        assert_eq!(mul_div_ceil(6, 10, 3).unwrap(), 20);
    }

    #[test]
    fn test_u256_narrowing() {
        assert_eq!(u256_to_amount(U256::from(42u64)).unwrap(), 42);
        let too_big = U256::from(u128::MAX) + U256::one();
        assert!(u256_to_amount(too_big).is_err());
        assert!(u256_div(U256::one(), U256::zero()).is_err());
        assert_eq!(u256_abs_diff(U256::from(3u8), U256::from(5u8)), U256::from(2u8));
    }
}
