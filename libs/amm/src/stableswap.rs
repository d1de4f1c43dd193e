//! Stableswap (Curve-style) invariant solvers
//!
//! The invariant over `n` balances `x_i` with amplification `A`:
//!
//! ```text
//! A * n^n * sum(x_i) + D = A * D * n^n + D^(n+1) / (n^n * prod(x_i))
//! ```
//!
//! All iteration happens in `U256` integer arithmetic. Every loop is bounded
//! by [`MAX_SOLVER_ITERATIONS`] and stops once a step moves by at most one
//! unit. A zero balance anywhere makes the curve undefined; such a pool is
//! reported as borked and only withdrawals remain possible.

use crate::error::{AmmError, AmmResult};
use crate::fixed_point::{
    add, mul, quo, ratio, u256_abs_diff, u256_add, u256_div, u256_from, u256_mul, u256_sub,
    u256_to_amount, Amount,
};
use crate::pool::{Coin, MIN_POOL_ASSETS};
use primitive_types::U256;
use rust_decimal::Decimal;
use tracing::{trace, warn};

/// Upper bound on Newton iterations for both `D` and `y`
pub const MAX_SOLVER_ITERATIONS: usize = 255;

/// `A * n^n`
fn ann(amp: u64, n_coins: usize) -> AmmResult<U256> {
    let n = U256::from(n_coins);
    let mut n_pow_n = U256::one();
    for _ in 0..n_coins {
        n_pow_n = u256_mul(n_pow_n, n)?;
    }
    u256_mul(U256::from(amp), n_pow_n)
}

fn checked_balances(balances: &[Coin]) -> AmmResult<Vec<U256>> {
    if balances.len() < MIN_POOL_ASSETS {
        return Err(AmmError::TooFewPoolAssets {
            count: balances.len(),
            min: MIN_POOL_ASSETS,
        });
    }
    balances
        .iter()
        .map(|coin| {
            if coin.amount == 0 {
                Err(AmmError::BorkedPool {
                    denom: coin.denom.clone(),
                })
            } else {
                Ok(u256_from(coin.amount))
            }
        })
        .collect()
}

fn check_indices(balances: &[Coin], i: usize, j: usize) -> AmmResult<()> {
    for index in [i, j] {
        if index >= balances.len() {
            return Err(AmmError::TokenDenomNotFound {
                denom: format!("#{index}"),
            });
        }
    }
    if i == j {
        return Err(AmmError::SameDenom {
            denom: balances[i].denom.clone(),
        });
    }
    Ok(())
}

/// Solve the invariant `D` for the given balances
pub fn get_d(balances: &[Coin], amp: u64) -> AmmResult<U256> {
    if amp == 0 {
        return Err(AmmError::AmplificationTooLow);
    }
    let xs = checked_balances(balances)?;
    let n = U256::from(xs.len());
    let ann = ann(amp, xs.len())?;

    let mut sum = U256::zero();
    for x in &xs {
        sum = u256_add(sum, *x)?;
    }

    let ann_minus_one = u256_sub(ann, U256::one())?;
    let n_plus_one = u256_add(n, U256::one())?;
    let ann_sum = u256_mul(ann, sum)?;

    let mut d = sum;
    for iteration in 0..MAX_SOLVER_ITERATIONS {
        let mut d_p = d;
        for x in &xs {
            d_p = u256_div(u256_mul(d_p, d)?, u256_mul(*x, n)?)?;
        }
        let previous = d;

        // D = (Ann * S + D_P * n) * D / ((Ann - 1) * D + (n + 1) * D_P)
        let numerator = u256_mul(u256_add(ann_sum, u256_mul(d_p, n)?)?, d)?;
        let denominator = u256_add(u256_mul(ann_minus_one, d)?, u256_mul(n_plus_one, d_p)?)?;
        d = u256_div(numerator, denominator)?;

        if u256_abs_diff(d, previous) < U256::from(2u8) {
            trace!(iterations = iteration + 1, d = %d, "stableswap D converged");
            return Ok(d);
        }
    }

    warn!(d = %d, "stableswap D did not converge within iteration bound");
    Ok(d)
}

/// New balance of asset `j` once asset `i` holds `new_x_i`, keeping the
/// invariant of the current `balances`
pub fn solve_y(
    balances: &[Coin],
    amp: u64,
    i: usize,
    j: usize,
    new_x_i: Amount,
) -> AmmResult<Amount> {
    check_indices(balances, i, j)?;
    let d = get_d(balances, amp)?;
    let n = U256::from(balances.len());
    let ann = ann(amp, balances.len())?;

    let mut c = d;
    let mut sum = U256::zero();
    for (k, coin) in balances.iter().enumerate() {
        let x = if k == i {
            u256_from(new_x_i)
        } else if k != j {
            u256_from(coin.amount)
        } else {
            continue;
        };
        sum = u256_add(sum, x)?;
        c = u256_div(u256_mul(c, d)?, u256_mul(x, n)?)?;
    }

    c = u256_div(u256_mul(c, d)?, u256_mul(ann, n)?)?;
    let b = u256_add(sum, u256_div(d, ann)?)?;

    // y = (y^2 + c) / (2y + b - D)
    let mut y = d;
    for iteration in 0..MAX_SOLVER_ITERATIONS {
        let previous = y;
        let numerator = u256_add(u256_mul(y, y)?, c)?;
        let denominator = u256_sub(u256_add(u256_mul(U256::from(2u8), y)?, b)?, d)?;
        y = u256_div(numerator, denominator)?;

        if u256_abs_diff(y, previous) < U256::from(2u8) {
            trace!(iterations = iteration + 1, y = %y, "stableswap y converged");
            return u256_to_amount(y);
        }
    }

    warn!(y = %y, "stableswap y did not converge within iteration bound");
    u256_to_amount(y)
}

/// Amount of asset `j` released when `dx` of asset `i` is added
///
/// Rounding can leave the solved balance a unit above the old one for dust
/// inputs; that case yields zero rather than an error.
pub fn exchange(balances: &[Coin], amp: u64, i: usize, j: usize, dx: Amount) -> AmmResult<Amount> {
    check_indices(balances, i, j)?;
    let new_x = balances[i]
        .amount
        .checked_add(dx)
        .ok_or(AmmError::Overflow {
            operation: "stableswap exchange input",
        })?;
    let new_y = solve_y(balances, amp, i, j, new_x)?;
    Ok(balances[j].amount.saturating_sub(new_y))
}

/// Amount of asset `i` the curve needs for asset `j` to release `dy`
///
/// Runs the `y` solver with the roles swapped and adds one unit against
/// solver truncation. Fees are left to the caller.
pub fn exchange_inverse(
    balances: &[Coin],
    amp: u64,
    i: usize,
    j: usize,
    dy: Amount,
) -> AmmResult<Amount> {
    check_indices(balances, i, j)?;
    let available = balances[j].amount;
    if dy >= available {
        return Err(AmmError::InsufficientLiquidity {
            denom: balances[j].denom.clone(),
            requested: dy,
            available,
        });
    }
    let new_x = solve_y(balances, amp, j, i, available - dy)?;
    new_x
        .saturating_sub(balances[i].amount)
        .checked_add(1)
        .ok_or(AmmError::Overflow {
            operation: "stableswap inverse input",
        })
}

/// Marginal price of asset `j` in units of asset `i`
///
/// With `f_k = Ann + (D / x_k) * prod(D / (n * x_m))` the partial derivative
/// of the invariant along `x_k`, the price is `f_j / f_i`.
pub fn spot_price(balances: &[Coin], amp: u64, i: usize, j: usize) -> AmmResult<Decimal> {
    check_indices(balances, i, j)?;
    let d = get_d(balances, amp)?;
    let n = U256::from(balances.len());
    let ann = ratio(ann(amp, balances.len())?, U256::one())?;

    let mut product = Decimal::ONE;
    for coin in balances {
        product = mul(product, ratio(d, u256_mul(n, u256_from(coin.amount))?)?)?;
    }

    let partial = |k: usize| -> AmmResult<Decimal> {
        let x_k = u256_from(balances[k].amount);
        add(ann, mul(ratio(d, x_k)?, product)?)
    };

    quo(partial(j)?, partial(i)?)
}
