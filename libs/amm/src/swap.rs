//! Swap pricing and application
//!
//! Quotes are pure: they read a [`Pool`] and return amounts. Only
//! [`Pool::apply_swap`] mutates balances, and callers run it on the pool value
//! they intend to persist.
//!
//! Fees are charged on the input asset. The fee convention always favours the
//! pool: outputs are truncated, required inputs are rounded up.

use crate::balancer;
use crate::error::{AmmError, AmmResult};
use crate::fixed_point::{div_ceil, mul_floor, one_minus};
use crate::pool::{Coin, Pool, PoolType};
use crate::stableswap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Result of pricing an exact-input swap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapQuote {
    pub token_out: Coin,
    /// Portion of the input retained as swap fee, in the input denom
    pub fee: Coin,
}

impl Pool {
    fn swap_indices(&self, denom_in: &str, denom_out: &str) -> AmmResult<(usize, usize)> {
        if denom_in == denom_out {
            return Err(AmmError::SameDenom {
                denom: denom_in.to_string(),
            });
        }
        let (i, _) = self.get_pool_asset_and_index(denom_in)?;
        let (j, _) = self.get_pool_asset_and_index(denom_out)?;
        Ok((i, j))
    }

    fn ensure_funded(&self, indices: [usize; 2]) -> AmmResult<()> {
        for index in indices {
            let token = &self.assets[index].token;
            if token.is_zero() {
                return Err(AmmError::BorkedPool {
                    denom: token.denom.clone(),
                });
            }
        }
        Ok(())
    }

    /// Amount of `token_out_denom` received for `token_in`
    ///
    /// `no_fee` skips the swap fee; single-asset joins price their implicit
    /// swap this way so the fee is not charged twice.
    pub fn calc_out_amt_given_in(
        &self,
        token_in: &Coin,
        token_out_denom: &str,
        no_fee: bool,
    ) -> AmmResult<SwapQuote> {
        let (i, j) = self.swap_indices(&token_in.denom, token_out_denom)?;
        if token_in.is_zero() {
            return Err(AmmError::InvalidTokenIn {
                denom: token_in.denom.clone(),
            });
        }
        self.ensure_funded([i, j])?;

        let fee_rate = if no_fee {
            Decimal::ZERO
        } else {
            self.params.swap_fee
        };
        let keep = one_minus(fee_rate)?;

        let asset_in = &self.assets[i];
        let asset_out = &self.assets[j];

        let amount_out = match self.params.pool_type {
            PoolType::Balancer => balancer::out_given_in(
                asset_in.token.amount,
                asset_in.weight,
                asset_out.token.amount,
                asset_out.weight,
                token_in.amount,
                keep,
            )?,
            PoolType::Stableswap => stableswap::exchange(
                &self.reserves(),
                self.amplification()?,
                i,
                j,
                mul_floor(token_in.amount, keep)?,
            )?,
        };

        if amount_out == 0 {
            return Err(AmmError::SwapOutputTooSmall {
                denom: token_in.denom.clone(),
            });
        }

        let fee = mul_floor(token_in.amount, fee_rate)?;

        debug!(
            pool_id = self.id,
            token_in = %token_in,
            token_out_denom,
            amount_out,
            fee,
            "priced exact-input swap"
        );

        Ok(SwapQuote {
            token_out: Coin::new(token_out_denom, amount_out),
            fee: Coin::new(token_in.denom.clone(), fee),
        })
    }

    /// Amount of `token_in_denom` required to receive exactly `token_out`,
    /// swap fee included
    pub fn calc_in_amt_given_out(&self, token_out: &Coin, token_in_denom: &str) -> AmmResult<Coin> {
        let (i, j) = self.swap_indices(token_in_denom, &token_out.denom)?;
        if token_out.is_zero() {
            return Err(AmmError::InvalidTokenOut {
                denom: token_out.denom.clone(),
            });
        }
        self.ensure_funded([i, j])?;

        let asset_in = &self.assets[i];
        let asset_out = &self.assets[j];
        if token_out.amount >= asset_out.token.amount {
            return Err(AmmError::InsufficientLiquidity {
                denom: token_out.denom.clone(),
                requested: token_out.amount,
                available: asset_out.token.amount,
            });
        }

        let keep = one_minus(self.params.swap_fee)?;
        let amount_in = match self.params.pool_type {
            PoolType::Balancer => balancer::in_given_out(
                asset_in.token.amount,
                asset_in.weight,
                asset_out.token.amount,
                asset_out.weight,
                token_out.amount,
                keep,
            )?,
            PoolType::Stableswap => {
                let amount_in_after_fee = stableswap::exchange_inverse(
                    &self.reserves(),
                    self.amplification()?,
                    i,
                    j,
                    token_out.amount,
                )?;
                div_ceil(amount_in_after_fee, keep)?
            }
        };

        debug!(
            pool_id = self.id,
            token_out = %token_out,
            token_in_denom,
            amount_in,
            "priced exact-output swap"
        );

        Ok(Coin::new(token_in_denom, amount_in))
    }

    /// Add `token_in` to and remove `token_out` from the pool balances
    pub fn apply_swap(&mut self, token_in: &Coin, token_out: &Coin) -> AmmResult<()> {
        if token_in.is_zero() {
            return Err(AmmError::InvalidTokenIn {
                denom: token_in.denom.clone(),
            });
        }
        if token_out.is_zero() {
            return Err(AmmError::InvalidTokenOut {
                denom: token_out.denom.clone(),
            });
        }
        let (_, j) = self.swap_indices(&token_in.denom, &token_out.denom)?;

        let available = self.assets[j].token.amount;
        if token_out.amount > available {
            return Err(AmmError::InsufficientLiquidity {
                denom: token_out.denom.clone(),
                requested: token_out.amount,
                available,
            });
        }

        self.add_to_balance(&token_in.denom, token_in.amount)?;
        self.subtract_from_balance(&token_out.denom, token_out.amount)
    }

    /// Marginal price of `token_out_denom` quoted in `token_in_denom`
    pub fn calc_spot_price(&self, token_in_denom: &str, token_out_denom: &str) -> AmmResult<Decimal> {
        let (i, j) = self.swap_indices(token_in_denom, token_out_denom)?;
        self.ensure_funded([i, j])?;

        match self.params.pool_type {
            PoolType::Balancer => {
                let asset_in = &self.assets[i];
                let asset_out = &self.assets[j];
                balancer::spot_price(
                    asset_in.token.amount,
                    asset_in.weight,
                    asset_out.token.amount,
                    asset_out.weight,
                )
            }
            PoolType::Stableswap => {
                stableswap::spot_price(&self.reserves(), self.amplification()?, i, j)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{share_base_denom, PoolAsset, PoolParams};
    use rust_decimal_macros::dec;

    fn balancer_pool(balances: [(&str, u128); 2], swap_fee: Decimal) -> Pool {
        Pool {
            id: 1,
            params: PoolParams::balancer(swap_fee, dec!(0)),
            assets: balances
                .iter()
                .map(|(denom, amount)| PoolAsset::new(*denom, *amount, 1 << 30))
                .collect(),
            total_weight: 2 << 30,
            total_shares: Coin::new(share_base_denom(1), 100),
        }
    }

    fn stableswap_pool(balances: [(&str, u128); 2], swap_fee: Decimal, amp: u64) -> Pool {
        let mut pool = balancer_pool(balances, swap_fee);
        pool.params = PoolParams::stableswap(swap_fee, dec!(0), amp);
        pool
    }

    #[test]
    fn test_calc_out_amt_given_in_balancer() {
        let cases = [
            ((100, 100), dec!(0.0003), 10, 9, 0),
            ((100_000_000, 100_000_000), dec!(0.0003), 10, 9, 0),
            ((1_000_000, 1_000_000), dec!(0.5), 10, 4, 5),
            ((3_498_723_457, 23_318_504), dec!(0.0003), 5_844_683, 38_877, 1_753),
            ((100, 100), dec!(0), 100, 50, 0),
        ];

        for ((balance_a, balance_b), fee, amount_in, expected_out, expected_fee) in cases {
            let pool = balancer_pool([("aaa", balance_a), ("bbb", balance_b)], fee);
            let quote = pool
                .calc_out_amt_given_in(&Coin::new("aaa", amount_in), "bbb", false)
                .unwrap();
            assert_eq!(quote.token_out, Coin::new("bbb", expected_out));
            assert_eq!(quote.fee, Coin::new("aaa", expected_fee));
        }
    }

    #[test]
    fn test_calc_out_amt_given_in_too_small() {
        let pool = balancer_pool([("aaa", 100), ("bbb", 100)], dec!(0.0003));
        let err = pool
            .calc_out_amt_given_in(&Coin::new("aaa", 1), "bbb", false)
            .unwrap_err();
        assert_eq!(err, AmmError::SwapOutputTooSmall { denom: "aaa".into() });
    }

    #[test]
    fn test_calc_out_amt_given_in_rejects_bad_input() {
        let pool = balancer_pool([("aaa", 100), ("bbb", 100)], dec!(0.0003));
        assert!(matches!(
            pool.calc_out_amt_given_in(&Coin::new("aaa", 10), "aaa", false),
            Err(AmmError::SameDenom { .. })
        ));
        assert!(matches!(
            pool.calc_out_amt_given_in(&Coin::new("aaa", 0), "bbb", false),
            Err(AmmError::InvalidTokenIn { .. })
        ));
        assert!(matches!(
            pool.calc_out_amt_given_in(&Coin::new("ccc", 10), "bbb", false),
            Err(AmmError::TokenDenomNotFound { .. })
        ));
    }

    #[test]
    fn test_no_fee_skips_fee() {
        let pool = balancer_pool([("aaa", 1_000_000), ("bbb", 1_000_000)], dec!(0.5));
        let quote = pool
            .calc_out_amt_given_in(&Coin::new("aaa", 10), "bbb", true)
            .unwrap();
        assert_eq!(quote.token_out.amount, 9);
        assert_eq!(quote.fee.amount, 0);
    }

    #[test]
    fn test_calc_in_amt_given_out_balancer() {
        let cases = [
            ((100, 100), dec!(0.0003), 9, 10),
            ((100_000_000, 100_000_000), dec!(0.0003), 9, 10),
            ((1_000_000, 1_000_000), dec!(0.5), 4, 9),
            ((3_498_723_457, 23_318_504), dec!(0.0003), 38_877, 5_844_626),
        ];

        for ((balance_a, balance_b), fee, amount_out, expected_in) in cases {
            let pool = balancer_pool([("aaa", balance_a), ("bbb", balance_b)], fee);
            let token_in = pool
                .calc_in_amt_given_out(&Coin::new("bbb", amount_out), "aaa")
                .unwrap();
            assert_eq!(token_in, Coin::new("aaa", expected_in));
        }
    }

    #[test]
    fn test_calc_in_amt_given_out_exceeds_liquidity() {
        let pool = balancer_pool([("aaa", 100), ("bbb", 100)], dec!(0));
        assert!(matches!(
            pool.calc_in_amt_given_out(&Coin::new("bbb", 100), "aaa"),
            Err(AmmError::InsufficientLiquidity { .. })
        ));
    }

    #[test]
    fn test_stableswap_out_given_in() {
        let pool = stableswap_pool(
            [("unusd", 1_510_778_598), ("uusdt", 7_712_056)],
            dec!(0.01),
            10,
        );
        let quote = pool
            .calc_out_amt_given_in(&Coin::new("unusd", 1_500_000_000), "uusdt", false)
            .unwrap();
        assert_eq!(quote.token_out, Coin::new("uusdt", 6_670_336));
        assert_eq!(quote.fee, Coin::new("unusd", 15_000_000));
    }

    #[test]
    fn test_stableswap_in_given_out() {
        let pool = stableswap_pool([("aaa", 100), ("bbb", 100)], dec!(0), 2000);
        let token_in = pool
            .calc_in_amt_given_out(&Coin::new("bbb", 10), "aaa")
            .unwrap();
        assert_eq!(token_in, Coin::new("aaa", 11));

        let pool = stableswap_pool([("aaa", 1_000_000), ("bbb", 1_000_000)], dec!(0.01), 100);
        let token_in = pool
            .calc_in_amt_given_out(&Coin::new("bbb", 5_000), "aaa")
            .unwrap();
        assert_eq!(token_in, Coin::new("aaa", 5_052));

        let quote = pool.calc_out_amt_given_in(&token_in, "bbb", false).unwrap();
        assert!(quote.token_out.amount >= 5_000);
    }

    #[test]
    fn test_apply_swap() {
        let mut pool = balancer_pool([("aaa", 100), ("bbb", 200)], dec!(0));
        pool.apply_swap(&Coin::new("aaa", 50), &Coin::new("bbb", 75))
            .unwrap();
        assert_eq!(pool.balance_of("aaa").unwrap(), 150);
        assert_eq!(pool.balance_of("bbb").unwrap(), 125);
    }

    #[test]
    fn test_apply_swap_rejections_leave_pool_untouched() {
        let mut pool = balancer_pool([("aaa", 100), ("bbb", 200)], dec!(0));
        let before = pool.clone();

        assert!(matches!(
            pool.apply_swap(&Coin::new("aaa", 50), &Coin::new("bbb", 201)),
            Err(AmmError::InsufficientLiquidity { .. })
        ));
        assert!(matches!(
            pool.apply_swap(&Coin::new("aaa", 0), &Coin::new("bbb", 1)),
            Err(AmmError::InvalidTokenIn { .. })
        ));
        assert!(matches!(
            pool.apply_swap(&Coin::new("aaa", 1), &Coin::new("bbb", 0)),
            Err(AmmError::InvalidTokenOut { .. })
        ));
        assert_eq!(pool, before);
    }

    #[test]
    fn test_spot_price() {
        let pool = balancer_pool([("aaa", 200), ("bbb", 100)], dec!(0));
        assert_eq!(pool.calc_spot_price("aaa", "bbb").unwrap(), dec!(2));
        assert_eq!(pool.calc_spot_price("bbb", "aaa").unwrap(), dec!(0.5));

        let pool = stableswap_pool([("aaa", 1_000_000), ("bbb", 1_000_000)], dec!(0), 100);
        assert_eq!(pool.calc_spot_price("aaa", "bbb").unwrap(), Decimal::ONE);
    }

    #[test]
    fn test_swaps_beyond_decimal_range() {
        let huge = 10u128.pow(30);
        let pool = balancer_pool([("aaa", huge), ("bbb", huge)], dec!(0.003));
        let token_in = Coin::new("aaa", huge / 1_000);

        let quote = pool.calc_out_amt_given_in(&token_in, "bbb", false).unwrap();
        assert!(quote.token_out.amount > 0 && quote.token_out.amount < huge / 1_000);
        assert_eq!(quote.fee, Coin::new("aaa", huge / 1_000 * 3 / 1_000));

        // Ratios carry 28 significant digits against 30-digit balances
        let needed = pool.calc_in_amt_given_out(&quote.token_out, "aaa").unwrap();
        assert!(needed.amount.abs_diff(token_in.amount) < 1_000_000);
        assert_eq!(pool.calc_spot_price("aaa", "bbb").unwrap(), Decimal::ONE);

        let pool = stableswap_pool([("aaa", huge), ("bbb", huge)], dec!(0.003), 100);
        let quote = pool.calc_out_amt_given_in(&token_in, "bbb", false).unwrap();
        assert!(quote.token_out.amount > huge / 1_000 * 99 / 100);
        assert_eq!(pool.calc_spot_price("aaa", "bbb").unwrap(), Decimal::ONE);
    }

    #[test]
    fn test_borked_pool_cannot_swap() {
        let pool = stableswap_pool([("aaa", 0), ("bbb", 100)], dec!(0), 10);
        assert!(matches!(
            pool.calc_out_amt_given_in(&Coin::new("bbb", 10), "aaa", false),
            Err(AmmError::BorkedPool { .. })
        ));
    }
}
