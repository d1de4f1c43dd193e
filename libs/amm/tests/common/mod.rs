//! Common Test Utilities for the pool engine
//!
//! In-memory collaborators and fixtures shared by the integration suites.

#![allow(dead_code)]

use anyhow::{bail, ensure, Result};
use spot_amm::{
    Coin, Coins, CreatePoolRequest, Pool, PoolAsset, PoolCreationPolicy, PoolManager, PoolParams,
    PoolStore, TokenCustody,
};
use rust_decimal_macros::dec;
use std::collections::{BTreeMap, HashMap};

pub const ALICE: &str = "alice";
pub const BOB: &str = "bob";
pub const FEE_COLLECTOR: &str = "community-pool";

/// Pool records keyed by id, with the denom-pair index
#[derive(Debug, Default)]
pub struct InMemoryPoolStore {
    next_id: u64,
    pools: BTreeMap<u64, Pool>,
    pairs: HashMap<(String, String), u64>,
    reject_writes: bool,
}

impl InMemoryPoolStore {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Default::default()
        }
    }

    /// A store whose `set_pool` always fails
    pub fn rejecting_writes() -> Self {
        Self {
            reject_writes: true,
            ..Self::new()
        }
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    fn pair_key(denom_a: &str, denom_b: &str) -> (String, String) {
        if denom_a <= denom_b {
            (denom_a.to_string(), denom_b.to_string())
        } else {
            (denom_b.to_string(), denom_a.to_string())
        }
    }
}

impl PoolStore for InMemoryPoolStore {
    fn next_pool_id(&mut self) -> Result<u64> {
        let id = self.next_id;
        self.next_id += 1;
        Ok(id)
    }

    fn fetch_pool(&self, pool_id: u64) -> Result<Option<Pool>> {
        Ok(self.pools.get(&pool_id).cloned())
    }

    fn pool_id_for_pair(&self, denom_a: &str, denom_b: &str) -> Result<Option<u64>> {
        Ok(self.pairs.get(&Self::pair_key(denom_a, denom_b)).copied())
    }

    fn set_pool(&mut self, pool: Pool) -> Result<()> {
        ensure!(!self.reject_writes, "store is read-only");
        let key = Self::pair_key(&pool.assets[0].token.denom, &pool.assets[1].token.denom);
        self.pairs.insert(key, pool.id);
        self.pools.insert(pool.id, pool);
        Ok(())
    }
}

/// Account balances plus per-denom supply
#[derive(Debug, Default)]
pub struct InMemoryBank {
    balances: HashMap<(String, String), u128>,
    supply: HashMap<String, u128>,
    rejected_mint_denom: Option<String>,
}

impl InMemoryBank {
    /// Seed `(account, denom, amount)` holdings
    pub fn with_balances(holdings: &[(&str, &str, u128)]) -> Self {
        let mut bank = Self::default();
        for (account, denom, amount) in holdings {
            bank.credit(account, denom, *amount);
            *bank.supply.entry(denom.to_string()).or_default() += amount;
        }
        bank
    }

    /// Fail every mint of `denom`
    pub fn rejecting_mints_of(mut self, denom: &str) -> Self {
        self.rejected_mint_denom = Some(denom.to_string());
        self
    }

    pub fn balance(&self, account: &str, denom: &str) -> u128 {
        self.balances
            .get(&(account.to_string(), denom.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn supply(&self, denom: &str) -> u128 {
        self.supply.get(denom).copied().unwrap_or(0)
    }

    fn credit(&mut self, account: &str, denom: &str, amount: u128) {
        *self
            .balances
            .entry((account.to_string(), denom.to_string()))
            .or_default() += amount;
    }

    fn debit(&mut self, account: &str, denom: &str, amount: u128) -> Result<()> {
        let balance = self.balance(account, denom);
        if balance < amount {
            bail!("{account} has {balance}{denom}, needs {amount}{denom}");
        }
        self.balances
            .insert((account.to_string(), denom.to_string()), balance - amount);
        Ok(())
    }
}

impl TokenCustody for InMemoryBank {
    fn spendable(&self, account: &str, denom: &str) -> Result<u128> {
        Ok(self.balance(account, denom))
    }

    fn transfer(&mut self, from: &str, to: &str, coins: &Coins) -> Result<()> {
        for coin in coins {
            if self.balance(from, &coin.denom) < coin.amount {
                bail!("insufficient funds: {from} cannot send {coin}");
            }
        }
        for coin in coins {
            self.debit(from, &coin.denom, coin.amount)?;
            self.credit(to, &coin.denom, coin.amount);
        }
        Ok(())
    }

    fn mint(&mut self, recipient: &str, coin: &Coin) -> Result<()> {
        if self.rejected_mint_denom.as_deref() == Some(coin.denom.as_str()) {
            bail!("minting {} is disabled", coin.denom);
        }
        self.credit(recipient, &coin.denom, coin.amount);
        *self.supply.entry(coin.denom.clone()).or_default() += coin.amount;
        Ok(())
    }

    fn burn(&mut self, holder: &str, coin: &Coin) -> Result<()> {
        self.debit(holder, &coin.denom, coin.amount)?;
        *self.supply.entry(coin.denom.clone()).or_default() -= coin.amount;
        Ok(())
    }
}

pub type TestManager = PoolManager<InMemoryPoolStore, InMemoryBank>;

pub fn coins(pairs: &[(&str, u128)]) -> Coins {
    Coins::new(pairs.iter().map(|(denom, amount)| Coin::new(*denom, *amount))).unwrap()
}

pub fn policy() -> PoolCreationPolicy {
    PoolCreationPolicy::new(
        ["unibi", "unusd", "uusdc", "uusdt"],
        coins(&[("unibi", 1_000)]),
        FEE_COLLECTOR,
    )
}

pub fn funded_bank() -> InMemoryBank {
    InMemoryBank::with_balances(&[
        (ALICE, "unibi", 1_000_000_000),
        (ALICE, "unusd", 1_000_000_000),
        (ALICE, "uusdc", 1_000_000_000),
        (ALICE, "uusdt", 1_000_000_000),
        (BOB, "unibi", 1_000_000),
        (BOB, "uusdc", 1_000_000),
    ])
}

pub fn manager_with_funds() -> TestManager {
    PoolManager::new(InMemoryPoolStore::new(), funded_bank(), policy())
}

pub fn balancer_request(a: (&str, u128), b: (&str, u128)) -> CreatePoolRequest {
    CreatePoolRequest::new(
        PoolParams::balancer(dec!(0.003), dec!(0.003)),
        vec![PoolAsset::new(a.0, a.1, 1), PoolAsset::new(b.0, b.1, 1)],
    )
}

pub fn stableswap_request(a: (&str, u128), b: (&str, u128), amp: u64) -> CreatePoolRequest {
    CreatePoolRequest::new(
        PoolParams::stableswap(dec!(0.003), dec!(0.003), amp),
        vec![PoolAsset::new(a.0, a.1, 1), PoolAsset::new(b.0, b.1, 1)],
    )
}

/// A bare balancer pool value with equal weights, for engine-level tests
pub fn balancer_pool(balance_a: u128, balance_b: u128, total_shares: u128) -> Pool {
    let mut pool = Pool::new(
        1,
        PoolParams::balancer(dec!(0.003), dec!(0)),
        vec![
            PoolAsset::new("aaa", balance_a, 1),
            PoolAsset::new("bbb", balance_b, 1),
        ],
    )
    .unwrap();
    pool.total_shares.amount = total_shares;
    pool
}
