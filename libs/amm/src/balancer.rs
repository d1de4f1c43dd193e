//! Weighted constant-product solver
//!
//! Holds `x^wx * y^wy` constant across a swap:
//!
//! ```text
//! y_after = y_prior * (x_prior / x_after)^(wx / wy)
//! delta_y = y_prior * (1 - (x_prior / x_after)^(wx / wy))
//! ```
//!
//! Balances stay integers throughout. Only the balance ratio and the weight
//! ratio are lifted into `Decimal`, so pools far beyond the decimal range
//! still price. The balance ratio is rounded in the pool's favour before the
//! power is taken.

use crate::error::AmmResult;
use crate::fixed_point::{
    amount_ratio, decimal_parts, mul_ceil, mul_floor, one_minus, pow, quo, ratio, ratio_ceil, sub,
    u256_add, u256_from, u256_mul, u256_sub, Amount,
};
use rust_decimal::Decimal;

/// Amount of the out-asset released when `amount_in` enters the pool, of
/// which only the `keep` fraction counts toward the invariant
pub fn out_given_in(
    balance_in: Amount,
    weight_in: u128,
    balance_out: Amount,
    weight_out: u128,
    amount_in: Amount,
    keep: Decimal,
) -> AmmResult<Amount> {
    let (keep_mantissa, keep_scale) = decimal_parts(keep)?;
    let prior = u256_mul(u256_from(balance_in), keep_scale)?;
    let after = u256_add(prior, u256_mul(u256_from(amount_in), keep_mantissa)?)?;

    let y_ratio = pow(ratio_ceil(prior, after)?, amount_ratio(weight_in, weight_out)?)?;
    mul_floor(balance_out, one_minus(y_ratio)?)
}

/// Amount of the in-asset, before the `keep` fraction is applied, that
/// releases exactly `amount_out`
///
/// `amount_out` must be below `balance_out`.
pub fn in_given_out(
    balance_in: Amount,
    weight_in: u128,
    balance_out: Amount,
    weight_out: u128,
    amount_out: Amount,
    keep: Decimal,
) -> AmmResult<Amount> {
    let prior = u256_from(balance_out);
    let after = u256_sub(prior, u256_from(amount_out))?;

    // (x0)(y0) = (x0 + in)(y0 - out), solved with the out-asset as x
    let x_ratio = pow(ratio_ceil(prior, after)?, amount_ratio(weight_out, weight_in)?)?;
    let growth = sub(x_ratio, Decimal::ONE)?;
    mul_ceil(balance_in, quo(growth, keep)?)
}

/// Marginal price of the out-asset in units of the in-asset:
/// `(B_in / W_in) / (B_out / W_out)`
pub fn spot_price(
    balance_in: Amount,
    weight_in: u128,
    balance_out: Amount,
    weight_out: u128,
) -> AmmResult<Decimal> {
    ratio(
        u256_mul(u256_from(balance_in), u256_from(weight_out))?,
        u256_mul(u256_from(balance_out), u256_from(weight_in))?,
    )
}
