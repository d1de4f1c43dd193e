//! Pool data model
//!
//! A [`Pool`] is the aggregate root handed to every engine operation. Its
//! assets are kept sorted by denom for the pool's whole life: every lookup is
//! a binary search over that order.

use crate::error::{AmmError, AmmResult};
use crate::fixed_point::Amount;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scale applied to user-supplied weights at pool creation
pub const GUARANTEED_WEIGHT_PRECISION: u128 = 1 << 30;

/// Shares minted for a freshly created (or re-seeded) pool: 100 display units
pub const INIT_POOL_SHARES_SUPPLY: Amount = 100 * 1_000_000_000_000_000_000;

pub const MIN_POOL_ASSETS: usize = 2;
pub const MAX_POOL_ASSETS: usize = 2;

/// Exclusive upper bound on a user-supplied (unscaled) weight
pub const MAX_USER_SPECIFIED_WEIGHT: u128 = 1 << 50;

/// Exponent between the share display denom and the share base denom
pub const POOL_SHARE_DISPLAY_EXPONENT: u32 = 18;

/// Base denom of the share token for `pool_id`
pub fn share_base_denom(pool_id: u64) -> String {
    format!("spot/pool/{pool_id}")
}

/// Display denom of the share token for `pool_id` (10^18 base units)
pub fn share_display_denom(pool_id: u64) -> String {
    format!("SPOT-POOL-{pool_id}")
}

/// Custody account holding the reserves of `pool_id`
pub fn pool_account(pool_id: u64) -> String {
    format!("spot-pool-{pool_id}")
}

/// A token amount of a single denom
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: Amount,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: Amount) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Canonical coin set: sorted by denom, unique denoms, no zero amounts
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Coin>", into = "Vec<Coin>")]
pub struct Coins(Vec<Coin>);

impl Coins {
    /// Build a canonical set; duplicate denoms are rejected, zero amounts dropped
    pub fn new(coins: impl IntoIterator<Item = Coin>) -> AmmResult<Self> {
        let mut coins: Vec<Coin> = coins.into_iter().filter(|c| !c.is_zero()).collect();
        coins.sort_by(|a, b| a.denom.cmp(&b.denom));

        if let Some(pair) = coins.windows(2).find(|w| w[0].denom == w[1].denom) {
            return Err(AmmError::DuplicateDenom {
                denom: pair[0].denom.clone(),
            });
        }

        Ok(Self(coins))
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Coin> {
        self.0.iter()
    }

    pub fn denoms(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|c| c.denom.as_str())
    }

    /// Amount of `denom`, zero when absent
    pub fn amount_of(&self, denom: &str) -> Amount {
        self.0
            .binary_search_by(|c| c.denom.as_str().cmp(denom))
            .map(|i| self.0[i].amount)
            .unwrap_or(0)
    }

    /// Element-wise `self + other`
    pub fn add(&self, other: &Coins) -> AmmResult<Coins> {
        let mut merged = self.0.clone();
        for coin in other.iter() {
            match merged.binary_search_by(|c| c.denom.cmp(&coin.denom)) {
                Ok(i) => {
                    merged[i].amount =
                        merged[i]
                            .amount
                            .checked_add(coin.amount)
                            .ok_or(AmmError::Overflow {
                                operation: "coin addition",
                            })?
                }
                Err(i) => merged.insert(i, coin.clone()),
            }
        }
        Ok(Coins(merged))
    }

    /// Element-wise `self - other`; every denom of `other` must be covered
    pub fn checked_sub(&self, other: &Coins) -> AmmResult<Coins> {
        for coin in other.iter() {
            if self.amount_of(&coin.denom) < coin.amount {
                return Err(AmmError::Overflow {
                    operation: "coin subtraction",
                });
            }
        }

        Coins::new(self.0.iter().map(|c| {
            Coin::new(c.denom.clone(), c.amount - other.amount_of(&c.denom))
        }))
    }
}

impl TryFrom<Vec<Coin>> for Coins {
    type Error = AmmError;

    fn try_from(coins: Vec<Coin>) -> Result<Self, Self::Error> {
        Coins::new(coins)
    }
}

impl From<Coins> for Vec<Coin> {
    fn from(coins: Coins) -> Self {
        coins.0
    }
}

impl<'a> IntoIterator for &'a Coins {
    type Item = &'a Coin;
    type IntoIter = std::slice::Iter<'a, Coin>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, coin) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{coin}")?;
        }
        Ok(())
    }
}

/// Invariant model of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoolType {
    /// Weighted constant product
    Balancer,
    /// Curve-style amplified invariant
    Stableswap,
}

impl PoolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolType::Balancer => "BALANCER",
            PoolType::Stableswap => "STABLESWAP",
        }
    }
}

impl fmt::Display for PoolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<i32> for PoolType {
    type Error = AmmError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(PoolType::Balancer),
            1 => Ok(PoolType::Stableswap),
            other => Err(AmmError::InvalidPoolType(other.to_string())),
        }
    }
}

impl FromStr for PoolType {
    type Err = AmmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BALANCER" => Ok(PoolType::Balancer),
            "STABLESWAP" => Ok(PoolType::Stableswap),
            _ => Err(AmmError::InvalidPoolType(s.to_string())),
        }
    }
}

/// Pool configuration fixed at creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolParams {
    pub swap_fee: Decimal,
    pub exit_fee: Decimal,
    pub pool_type: PoolType,
    /// Stableswap amplification `A`; ignored by balancer pools
    #[serde(default)]
    pub amplification: Option<u64>,
}

impl PoolParams {
    pub fn balancer(swap_fee: Decimal, exit_fee: Decimal) -> Self {
        Self {
            swap_fee,
            exit_fee,
            pool_type: PoolType::Balancer,
            amplification: None,
        }
    }

    pub fn stableswap(swap_fee: Decimal, exit_fee: Decimal, amplification: u64) -> Self {
        Self {
            swap_fee,
            exit_fee,
            pool_type: PoolType::Stableswap,
            amplification: Some(amplification),
        }
    }

    /// Fee ranges and amplification presence
    pub fn validate(&self) -> AmmResult<()> {
        if self.swap_fee < Decimal::ZERO || self.swap_fee > Decimal::ONE {
            return Err(AmmError::InvalidSwapFee(self.swap_fee));
        }
        if self.exit_fee < Decimal::ZERO || self.exit_fee > Decimal::ONE {
            return Err(AmmError::InvalidExitFee(self.exit_fee));
        }
        if self.pool_type == PoolType::Stableswap {
            match self.amplification {
                None => return Err(AmmError::AmplificationMissing),
                Some(0) => return Err(AmmError::AmplificationTooLow),
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// One side of a pool: its balance and (scaled) weight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolAsset {
    pub token: Coin,
    pub weight: u128,
}

impl PoolAsset {
    pub fn new(denom: impl Into<String>, amount: Amount, weight: u128) -> Self {
        Self {
            token: Coin::new(denom, amount),
            weight,
        }
    }

    /// Checks a user-supplied asset before its weight is scaled
    pub fn validate(&self) -> AmmResult<()> {
        if self.token.amount == 0 {
            return Err(AmmError::InvalidTokenAmount {
                denom: self.token.denom.clone(),
                amount: self.token.amount,
            });
        }
        if self.weight == 0 {
            return Err(AmmError::InvalidTokenWeight {
                denom: self.token.denom.clone(),
                weight: self.weight,
            });
        }
        if self.weight >= MAX_USER_SPECIFIED_WEIGHT {
            return Err(AmmError::WeightTooHigh {
                denom: self.token.denom.clone(),
                weight: self.weight,
            });
        }
        Ok(())
    }
}

pub(crate) fn sort_pool_assets_by_denom(assets: &mut [PoolAsset]) {
    assets.sort_by(|a, b| a.token.denom.cmp(&b.token.denom));
}

/// A liquidity pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: u64,
    pub params: PoolParams,
    /// Sorted by denom
    pub assets: Vec<PoolAsset>,
    pub total_weight: u128,
    pub total_shares: Coin,
}

impl Pool {
    pub fn pool_type(&self) -> PoolType {
        self.params.pool_type
    }

    pub fn share_denom(&self) -> &str {
        &self.total_shares.denom
    }

    /// Current balances as a coin set
    pub fn pool_balances(&self) -> Coins {
        Coins(
            self.assets
                .iter()
                .filter(|a| !a.token.is_zero())
                .map(|a| a.token.clone())
                .collect(),
        )
    }

    pub fn denoms(&self) -> impl Iterator<Item = &str> {
        self.assets.iter().map(|a| a.token.denom.as_str())
    }

    /// Binary search for `denom` over the sorted assets
    pub fn get_pool_asset_and_index(&self, denom: &str) -> AmmResult<(usize, &PoolAsset)> {
        self.assets
            .binary_search_by(|a| a.token.denom.as_str().cmp(denom))
            .map(|i| (i, &self.assets[i]))
            .map_err(|_| AmmError::TokenDenomNotFound {
                denom: denom.to_string(),
            })
    }

    pub fn balance_of(&self, denom: &str) -> AmmResult<Amount> {
        self.get_pool_asset_and_index(denom)
            .map(|(_, asset)| asset.token.amount)
    }

    /// True when every denom in `tokens` is a pool asset
    pub fn are_tokens_in_pool(&self, tokens: &Coins) -> bool {
        tokens
            .denoms()
            .all(|denom| self.get_pool_asset_and_index(denom).is_ok())
    }

    /// Fails with [`AmmError::TokenDenomNotFound`] on the first foreign denom
    pub(crate) fn ensure_tokens_in_pool(&self, tokens: &Coins) -> AmmResult<()> {
        for denom in tokens.denoms() {
            self.get_pool_asset_and_index(denom)?;
        }
        Ok(())
    }

    pub fn amplification(&self) -> AmmResult<u64> {
        match self.params.amplification {
            None => Err(AmmError::AmplificationMissing),
            Some(0) => Err(AmmError::AmplificationTooLow),
            Some(a) => Ok(a),
        }
    }

    /// Balances in asset order, zero amounts kept
    pub(crate) fn reserves(&self) -> Vec<Coin> {
        self.assets.iter().map(|a| a.token.clone()).collect()
    }

    pub(crate) fn add_to_balance(&mut self, denom: &str, amount: Amount) -> AmmResult<()> {
        let (index, _) = self.get_pool_asset_and_index(denom)?;
        let asset = &mut self.assets[index];
        asset.token.amount = asset
            .token
            .amount
            .checked_add(amount)
            .ok_or(AmmError::Overflow {
                operation: "pool balance increment",
            })?;
        Ok(())
    }

    pub(crate) fn subtract_from_balance(&mut self, denom: &str, amount: Amount) -> AmmResult<()> {
        let (index, _) = self.get_pool_asset_and_index(denom)?;
        let asset = &mut self.assets[index];
        asset.token.amount =
            asset
                .token
                .amount
                .checked_sub(amount)
                .ok_or_else(|| AmmError::InsufficientLiquidity {
                    denom: denom.to_string(),
                    requested: amount,
                    available: asset.token.amount,
                })?;
        Ok(())
    }
}
