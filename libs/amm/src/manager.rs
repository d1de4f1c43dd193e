//! Pool manager: drives the engine against storage and custody
//!
//! Every transition is computed on a copy of the stored [`Pool`]. Once the
//! engine call has succeeded the sender's funds are checked against custody,
//! then the token movements run and the copy is written back. The movements
//! are journaled: if one of them or the final write fails, the ones already
//! applied are reversed, so a rejected message leaves both the store and
//! custody as they were.

use crate::error::AmmError;
use crate::lifecycle::{CreatePoolRequest, PoolCreationPolicy};
use crate::pool::{
    pool_account, share_display_denom, Coin, Coins, Pool, PoolType, POOL_SHARE_DISPLAY_EXPONENT,
};
use crate::pool_traits::{PoolStore, TokenCustody};
use crate::shares::ExitOutcome;
use crate::swap::SwapQuote;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

/// One token movement of a transition, kept so it can be reversed
#[derive(Debug, Clone)]
enum CustodyStep {
    Transfer { from: String, to: String, coins: Coins },
    Mint { account: String, coin: Coin },
    Burn { account: String, coin: Coin },
}

impl CustodyStep {
    fn transfer(from: &str, to: &str, coins: Coins) -> Self {
        Self::Transfer {
            from: from.to_string(),
            to: to.to_string(),
            coins,
        }
    }

    fn mint(account: &str, coin: Coin) -> Self {
        Self::Mint {
            account: account.to_string(),
            coin,
        }
    }

    fn burn(account: &str, coin: Coin) -> Self {
        Self::Burn {
            account: account.to_string(),
            coin,
        }
    }

    fn apply<C: TokenCustody>(&self, custody: &mut C) -> Result<()> {
        match self {
            Self::Transfer { from, to, coins } => custody
                .transfer(from, to, coins)
                .with_context(|| format!("transferring {coins} from {from} to {to}")),
            Self::Mint { account, coin } => custody
                .mint(account, coin)
                .with_context(|| format!("minting {coin} to {account}")),
            Self::Burn { account, coin } => custody
                .burn(account, coin)
                .with_context(|| format!("burning {coin} from {account}")),
        }
    }

    fn inverse(&self) -> Self {
        match self {
            Self::Transfer { from, to, coins } => Self::transfer(to, from, coins.clone()),
            Self::Mint { account, coin } => Self::burn(account, coin.clone()),
            Self::Burn { account, coin } => Self::mint(account, coin.clone()),
        }
    }
}

/// Result of a committed join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub pool: Pool,
    pub shares_out: Coin,
    /// Deposit left with the sender
    pub rem_coins: Coins,
}

pub struct PoolManager<S, C> {
    store: S,
    custody: C,
    policy: PoolCreationPolicy,
}

impl<S: PoolStore, C: TokenCustody> PoolManager<S, C> {
    pub fn new(store: S, custody: C, policy: PoolCreationPolicy) -> Self {
        Self {
            store,
            custody,
            policy,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn custody(&self) -> &C {
        &self.custody
    }

    pub fn policy(&self) -> &PoolCreationPolicy {
        &self.policy
    }

    /// Load a pool or fail with [`AmmError::PoolNotFound`]
    pub fn pool(&self, pool_id: u64) -> Result<Pool> {
        self.store
            .fetch_pool(pool_id)
            .with_context(|| format!("loading pool {pool_id}"))?
            .ok_or_else(|| AmmError::PoolNotFound { pool_id }.into())
    }

    /// Create a pool from `sender`'s deposit and mint the initial shares to
    /// them
    pub fn create_pool(&mut self, sender: &str, request: CreatePoolRequest) -> Result<u64> {
        request.validate()?;
        self.policy.check_assets(&request)?;

        let denoms = request.sorted_denoms();
        if let Some(pool_id) = self
            .store
            .pool_id_for_pair(denoms[0], denoms[1])
            .context("looking up pool by denom pair")?
        {
            return Err(AmmError::PoolWithSameAssetsExists { pool_id }.into());
        }

        let deposit = request.deposit()?;
        let pool_type = request.params.pool_type;
        self.ensure_funds(sender, &deposit.add(&self.policy.creation_fee)?)?;

        let pool_id = self.store.next_pool_id().context("allocating pool id")?;
        let pool = Pool::new(pool_id, request.params, request.assets)?;

        let mut steps = Vec::with_capacity(3);
        if !self.policy.creation_fee.is_empty() {
            steps.push(CustodyStep::transfer(
                sender,
                &self.policy.fee_collector,
                self.policy.creation_fee.clone(),
            ));
        }
        steps.push(CustodyStep::transfer(sender, &pool_account(pool_id), deposit.clone()));
        steps.push(CustodyStep::mint(sender, pool.total_shares.clone()));
        self.settle(pool_id, steps, pool)
            .context("committing new pool")?;

        info!(
            event = "pool_created",
            pool_id,
            creator = sender,
            pool_type = %pool_type,
            deposit = %deposit,
            display_denom = %share_display_denom(pool_id),
            display_exponent = POOL_SHARE_DISPLAY_EXPONENT,
            "Pool created"
        );
        Ok(pool_id)
    }

    /// Deposit `tokens_in`; with `use_all_coins` a balancer pool also swaps
    /// the leftover of an exact-ratio join in single-sided
    pub fn join_pool(
        &mut self,
        sender: &str,
        pool_id: u64,
        tokens_in: &Coins,
        use_all_coins: bool,
    ) -> Result<JoinOutcome> {
        let mut pool = self.pool(pool_id)?;

        if !use_all_coins && tokens_in.len() != pool.assets.len() {
            return Err(AmmError::IncompleteDeposit {
                got: tokens_in.len(),
                expected: pool.assets.len(),
            }
            .into());
        }

        let (num_shares, rem_coins) =
            if !use_all_coins || pool.pool_type() == PoolType::Stableswap {
                pool.add_tokens_to_pool(tokens_in)?
            } else {
                pool.add_all_tokens_to_pool(tokens_in)?
            };
        let consumed = tokens_in.checked_sub(&rem_coins)?;
        let shares_out = Coin::new(pool.share_denom(), num_shares);
        self.ensure_funds(sender, &consumed)?;

        let steps = vec![
            CustodyStep::transfer(sender, &pool_account(pool_id), consumed),
            CustodyStep::mint(sender, shares_out.clone()),
        ];
        self.settle(pool_id, steps, pool.clone())
            .context("committing join")?;

        info!(
            event = "pool_joined",
            pool_id,
            sender,
            tokens_in = %tokens_in,
            shares_out = %shares_out,
            rem_coins = %rem_coins,
            "Pool joined"
        );
        Ok(JoinOutcome {
            pool,
            shares_out,
            rem_coins,
        })
    }

    /// Burn `shares` and pay out the matching reserves, less the exit fee
    pub fn exit_pool(&mut self, sender: &str, pool_id: u64, shares: &Coin) -> Result<ExitOutcome> {
        let mut pool = self.pool(pool_id)?;
        Self::check_share_denom(&pool, shares)?;

        let outcome = pool.exit_pool(shares.amount)?;
        self.ensure_funds(sender, &Coins::new([shares.clone()])?)?;

        let steps = vec![
            CustodyStep::burn(sender, shares.clone()),
            CustodyStep::transfer(&pool_account(pool_id), sender, outcome.tokens_out.clone()),
        ];
        self.settle(pool_id, steps, pool)
            .context("committing exit")?;

        info!(
            event = "pool_exited",
            pool_id,
            sender,
            shares_in = %shares,
            tokens_out = %outcome.tokens_out,
            fees = %outcome.fees,
            "Pool exited"
        );
        Ok(outcome)
    }

    /// Swap the whole of `token_in` for `token_out_denom`; the fee stays in
    /// the pool
    pub fn swap_assets(
        &mut self,
        sender: &str,
        pool_id: u64,
        token_in: &Coin,
        token_out_denom: &str,
    ) -> Result<SwapQuote> {
        let mut pool = self.pool(pool_id)?;
        let quote = pool.calc_out_amt_given_in(token_in, token_out_denom, false)?;
        pool.apply_swap(token_in, &quote.token_out)?;

        let token_in_coins = Coins::new([token_in.clone()])?;
        self.ensure_funds(sender, &token_in_coins)?;

        let account = pool_account(pool_id);
        let steps = vec![
            CustodyStep::transfer(sender, &account, token_in_coins),
            CustodyStep::transfer(&account, sender, Coins::new([quote.token_out.clone()])?),
        ];
        self.settle(pool_id, steps, pool)
            .context("committing swap")?;

        info!(
            event = "assets_swapped",
            pool_id,
            sender,
            token_in = %token_in,
            token_out = %quote.token_out,
            fee = %quote.fee,
            "Assets swapped"
        );
        Ok(quote)
    }

    pub fn spot_price(&self, pool_id: u64, token_in_denom: &str, token_out_denom: &str) -> Result<Decimal> {
        let price = self
            .pool(pool_id)?
            .calc_spot_price(token_in_denom, token_out_denom)?;
        debug!(pool_id, token_in_denom, token_out_denom, %price, "spot price");
        Ok(price)
    }

    pub fn estimate_swap_exact_amount_in(
        &self,
        pool_id: u64,
        token_in: &Coin,
        token_out_denom: &str,
    ) -> Result<SwapQuote> {
        Ok(self
            .pool(pool_id)?
            .calc_out_amt_given_in(token_in, token_out_denom, false)?)
    }

    pub fn estimate_swap_exact_amount_out(
        &self,
        pool_id: u64,
        token_out: &Coin,
        token_in_denom: &str,
    ) -> Result<Coin> {
        Ok(self
            .pool(pool_id)?
            .calc_in_amt_given_out(token_out, token_in_denom)?)
    }

    pub fn estimate_exit(&self, pool_id: u64, shares: &Coin) -> Result<ExitOutcome> {
        let pool = self.pool(pool_id)?;
        Self::check_share_denom(&pool, shares)?;
        Ok(pool.tokens_out_from_pool_shares_in(shares.amount)?)
    }

    /// Fail with [`AmmError::InsufficientFunds`] unless `account` can move
    /// every coin in `required`
    fn ensure_funds(&self, account: &str, required: &Coins) -> Result<()> {
        for coin in required {
            let available = self
                .custody
                .spendable(account, &coin.denom)
                .with_context(|| format!("reading {} balance of {account}", coin.denom))?;
            if available < coin.amount {
                return Err(AmmError::InsufficientFunds {
                    denom: coin.denom.clone(),
                    required: coin.amount,
                    available,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Run `steps` in order, then persist `pool`; on any failure reverse the
    /// steps already applied and return the failure
    fn settle(&mut self, pool_id: u64, steps: Vec<CustodyStep>, pool: Pool) -> Result<()> {
        let mut applied = Vec::with_capacity(steps.len());
        for step in steps {
            if let Err(err) = step.apply(&mut self.custody) {
                self.unwind(pool_id, &applied);
                return Err(err);
            }
            applied.push(step);
        }

        if let Err(err) = self
            .store
            .set_pool(pool)
            .with_context(|| format!("persisting pool {pool_id}"))
        {
            self.unwind(pool_id, &applied);
            return Err(err);
        }
        Ok(())
    }

    fn unwind(&mut self, pool_id: u64, applied: &[CustodyStep]) {
        for step in applied.iter().rev() {
            if let Err(err) = step.inverse().apply(&mut self.custody) {
                error!(pool_id, ?step, error = %format!("{err:#}"), "failed to reverse custody step");
            }
        }
        warn!(pool_id, steps = applied.len(), "reversed custody steps of failed transition");
    }

    fn check_share_denom(pool: &Pool, shares: &Coin) -> Result<(), AmmError> {
        if shares.denom != pool.share_denom() {
            return Err(AmmError::InvalidShareDenom {
                expected: pool.share_denom().to_string(),
                got: shares.denom.clone(),
            });
        }
        Ok(())
    }
}
