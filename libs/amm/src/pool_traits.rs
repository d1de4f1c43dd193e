//! Collaborator interfaces the pool manager is wired against
//!
//! The engine never persists pools or moves tokens itself. Hosts plug their
//! storage and bank into these traits; the crate ships no implementation.

use crate::fixed_point::Amount;
use crate::pool::{Coin, Coins, Pool};
use anyhow::Result;

/// Persistence for pool records
pub trait PoolStore {
    /// Allocate the next pool id
    fn next_pool_id(&mut self) -> Result<u64>;

    /// Load a pool; `None` when no pool has this id
    fn fetch_pool(&self, pool_id: u64) -> Result<Option<Pool>>;

    /// Id of the pool holding exactly this denom pair, in either order
    fn pool_id_for_pair(&self, denom_a: &str, denom_b: &str) -> Result<Option<u64>>;

    /// Write a pool, indexing it by its denom pair
    fn set_pool(&mut self, pool: Pool) -> Result<()>;
}

/// Token movements between accounts
pub trait TokenCustody {
    /// Balance of `denom` that `account` can move right now
    fn spendable(&self, account: &str, denom: &str) -> Result<Amount>;

    fn transfer(&mut self, from: &str, to: &str, coins: &Coins) -> Result<()>;

    /// Create `coin` and credit it to `recipient`
    fn mint(&mut self, recipient: &str, coin: &Coin) -> Result<()>;

    /// Debit `coin` from `holder` and destroy it
    fn burn(&mut self, holder: &str, coin: &Coin) -> Result<()>;
}

/// Predicate consulted before pool creation
pub trait AssetWhitelist {
    fn is_asset_allowed(&self, denom: &str) -> bool;
}
