//! Pool share accounting: joins, exits and the balance bookkeeping behind them

use crate::error::{AmmError, AmmResult};
use crate::fixed_point::{
    add, approx_sqrt, decimal_parts, mul_div_ceil, mul_div_floor, mul_floor, one_minus, quo, ratio,
    sub, u256_div, u256_from, u256_mul, u256_sub, u256_to_amount, Amount,
};
use crate::pool::{Coin, Coins, Pool, PoolType, INIT_POOL_SHARES_SUPPLY};
use crate::stableswap;
use primitive_types::U256;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Tokens released by an exit and the fee kept by the pool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitOutcome {
    pub tokens_out: Coins,
    pub fees: Coins,
}

impl Pool {
    /// Deposit `tokens_in`, returning the shares minted and the unused coins
    ///
    /// Balancer pools take a single-asset join for one denom and a maximal
    /// exact-ratio join for several. Stableswap pools consume the whole deposit.
    /// A pool with no outstanding shares is re-seeded with
    /// [`INIT_POOL_SHARES_SUPPLY`].
    pub fn add_tokens_to_pool(&mut self, tokens_in: &Coins) -> AmmResult<(Amount, Coins)> {
        if tokens_in.is_empty() {
            return Err(AmmError::EmptyDeposit);
        }
        self.ensure_tokens_in_pool(tokens_in)?;

        let (num_shares, rem_coins) = if self.total_shares.amount == 0 {
            (INIT_POOL_SHARES_SUPPLY, Coins::empty())
        } else {
            match self.params.pool_type {
                PoolType::Stableswap => {
                    (self.num_shares_out_from_tokens_in_stableswap(tokens_in)?, Coins::empty())
                }
                PoolType::Balancer => self.num_shares_out_from_tokens_in(tokens_in)?,
            }
        };

        self.increment_balances(num_shares, &tokens_in.checked_sub(&rem_coins)?)?;

        debug!(
            pool_id = self.id,
            tokens_in = %tokens_in,
            num_shares,
            rem_coins = %rem_coins,
            "added tokens to pool"
        );
        Ok((num_shares, rem_coins))
    }

    /// Deposit all of `tokens_in` into a balancer pool: an exact-ratio join
    /// followed by a single-asset join of whatever remains
    pub fn add_all_tokens_to_pool(&mut self, tokens_in: &Coins) -> AmmResult<(Amount, Coins)> {
        if self.params.pool_type == PoolType::Stableswap {
            return Err(AmmError::InvalidPoolType(PoolType::Stableswap.to_string()));
        }

        let mut staged = self.clone();
        let (mut num_shares, mut rem_coins): (Amount, Coins) = (0, tokens_in.clone());
        if tokens_in.len() > 1 {
            (num_shares, rem_coins) = staged.add_tokens_to_pool(tokens_in)?;
        }

        if !rem_coins.is_empty() {
            let (second_shares, _) = staged.add_tokens_to_pool(&rem_coins)?;
            num_shares = num_shares
                .checked_add(second_shares)
                .ok_or(AmmError::Overflow {
                    operation: "share addition",
                })?;
        }

        *self = staged;
        Ok((num_shares, Coins::empty()))
    }

    fn num_shares_out_from_tokens_in(&self, tokens_in: &Coins) -> AmmResult<(Amount, Coins)> {
        if tokens_in.len() == 1 {
            return Ok((self.single_asset_join_shares(tokens_in)?, Coins::empty()));
        }

        // Share fractions `amount / balance`, compared by cross-multiplication
        let mut fractions = Vec::with_capacity(tokens_in.len());
        for coin in tokens_in {
            fractions.push((coin, self.nonzero_balance_of(&coin.denom)?));
        }
        let mut min_fraction: Option<(Amount, Amount)> = None;
        let mut uniform = true;
        for (coin, balance) in &fractions {
            let Some((min_amount, min_balance)) = min_fraction else {
                min_fraction = Some((coin.amount, *balance));
                continue;
            };
            let lhs = u256_mul(u256_from(coin.amount), u256_from(min_balance))?;
            let rhs = u256_mul(u256_from(min_amount), u256_from(*balance))?;
            if lhs != rhs {
                uniform = false;
            }
            if lhs < rhs {
                min_fraction = Some((coin.amount, *balance));
            }
        }
        let Some((min_amount, min_balance)) = min_fraction else {
            return Err(AmmError::EmptyDeposit);
        };

        if min_amount == 0 {
            return Ok((0, tokens_in.clone()));
        }

        let num_shares = mul_div_floor(self.total_shares.amount, min_amount, min_balance)?;
        if uniform {
            return Ok((num_shares, Coins::empty()));
        }

        let mut remainder = Vec::new();
        for (coin, balance) in &fractions {
            let used = mul_div_ceil(*balance, min_amount, min_balance)?;
            let remaining = coin.amount.checked_sub(used).ok_or(AmmError::Overflow {
                operation: "exact-ratio join remainder",
            })?;
            if remaining > 0 {
                remainder.push(Coin::new(coin.denom.clone(), remaining));
            }
        }

        Ok((num_shares, Coins::new(remainder)?))
    }

    /// `total * (sqrt(1 + (1 - fee/2) * amount / balance) - 1)`
    fn single_asset_join_shares(&self, tokens_in: &Coins) -> AmmResult<Amount> {
        let Some(coin) = tokens_in.iter().next() else {
            return Err(AmmError::EmptyDeposit);
        };
        let balance = self.nonzero_balance_of(&coin.denom)?;

        let fee_factor = one_minus(quo(self.params.swap_fee, dec!(2))?)?;
        let (factor_mantissa, factor_scale) = decimal_parts(fee_factor)?;
        let growth = ratio(
            u256_mul(u256_from(coin.amount), factor_mantissa)?,
            u256_mul(u256_from(balance), factor_scale)?,
        )?;
        let join_share = approx_sqrt(add(growth, Decimal::ONE)?)?;

        mul_floor(self.total_shares.amount, sub(join_share, Decimal::ONE)?)
    }

    fn num_shares_out_from_tokens_in_stableswap(&self, tokens_in: &Coins) -> AmmResult<Amount> {
        let amp = self.amplification()?;
        let reserves = self.reserves();
        let d0 = stableswap::get_d(&reserves, amp)?;

        let mut deposited = reserves;
        for reserve in deposited.iter_mut() {
            reserve.amount = reserve
                .amount
                .checked_add(tokens_in.amount_of(&reserve.denom))
                .ok_or(AmmError::Overflow {
                    operation: "stableswap join balance",
                })?;
        }
        let d1 = stableswap::get_d(&deposited, amp)?;

        if d1 < d0 {
            let err = AmmError::InvariantLowerAfterJoining {
                d0: u256_to_amount(d0)?,
                d1: u256_to_amount(d1)?,
            };
            error!(pool_id = self.id, error = %err, "stableswap invariant decreased on join");
            return Err(err);
        }

        let minted = u256_div(
            u256_mul(u256_from(self.total_shares.amount), u256_sub(d1, d0)?)?,
            d0,
        )?;
        u256_to_amount(minted)
    }

    fn nonzero_balance_of(&self, denom: &str) -> AmmResult<Amount> {
        match self.balance_of(denom)? {
            0 => Err(AmmError::BorkedPool {
                denom: denom.to_string(),
            }),
            balance => Ok(balance),
        }
    }

    /// Tokens and fees an exit of `shares_in` would produce, without
    /// touching the pool
    pub fn tokens_out_from_pool_shares_in(&self, shares_in: Amount) -> AmmResult<ExitOutcome> {
        let total_shares = self.total_shares.amount;
        if shares_in == 0 || shares_in > total_shares {
            return Err(AmmError::InvalidShareAmount {
                shares_in,
                total_shares,
            });
        }

        let keep_ratio = one_minus(self.params.exit_fee)?;

        let mut tokens_out = Vec::with_capacity(self.assets.len());
        let mut fees = Vec::with_capacity(self.assets.len());
        for asset in &self.assets {
            let raw = mul_div_floor(shares_in, asset.token.amount, total_shares)?;
            let token_out = mul_floor(raw, keep_ratio)?;
            tokens_out.push(Coin::new(asset.token.denom.clone(), token_out));
            fees.push(Coin::new(asset.token.denom.clone(), raw - token_out));
        }

        Ok(ExitOutcome {
            tokens_out: Coins::new(tokens_out)?,
            fees: Coins::new(fees)?,
        })
    }

    /// Burn `shares_in` and release the matching share of every asset,
    /// less the exit fee
    pub fn exit_pool(&mut self, shares_in: Amount) -> AmmResult<ExitOutcome> {
        let outcome = self.tokens_out_from_pool_shares_in(shares_in)?;
        if outcome.tokens_out.is_empty() {
            return Err(AmmError::InsufficientSharesForWithdrawal {
                min_shares: self.min_shares_in_for_tokens_out()?,
            });
        }

        for coin in &outcome.tokens_out {
            self.subtract_from_balance(&coin.denom, coin.amount)?;
        }
        self.total_shares.amount -= shares_in;

        debug!(
            pool_id = self.id,
            shares_in,
            tokens_out = %outcome.tokens_out,
            fees = %outcome.fees,
            "exited pool"
        );
        Ok(outcome)
    }

    /// Share threshold callers can pre-check an exit against:
    /// `max_i trunc(2 / (B_i / (1 - exit_fee)) * total_shares)`
    ///
    /// With a 100% exit fee no exit releases anything, and the threshold is
    /// the whole share supply.
    pub fn min_shares_in_for_tokens_out(&self) -> AmmResult<Amount> {
        let total_shares = self.total_shares.amount;
        let keep_ratio = one_minus(self.params.exit_fee)?;
        if keep_ratio.is_zero() {
            return Ok(total_shares);
        }
        let (keep_mantissa, keep_scale) = decimal_parts(keep_ratio)?;
        let numerator = u256_mul(u256_mul(U256::from(2u8), u256_from(total_shares))?, keep_mantissa)?;

        let mut min_shares = 0;
        for coin in &self.pool_balances() {
            let threshold = u256_div(numerator, u256_mul(keep_scale, u256_from(coin.amount))?)?;
            min_shares = min_shares.max(u256_to_amount(threshold)?);
        }
        Ok(min_shares)
    }

    /// Add `new_liquidity` to the balances and mint `num_shares`
    pub fn increment_balances(&mut self, num_shares: Amount, new_liquidity: &Coins) -> AmmResult<()> {
        self.ensure_tokens_in_pool(new_liquidity)?;
        let total_shares = self
            .total_shares
            .amount
            .checked_add(num_shares)
            .ok_or(AmmError::Overflow {
                operation: "total shares increment",
            })?;

        for coin in new_liquidity {
            self.add_to_balance(&coin.denom, coin.amount)?;
        }
        self.total_shares.amount = total_shares;
        Ok(())
    }
}
