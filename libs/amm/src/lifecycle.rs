//! Pool creation: request validation, construction and creation policy

use crate::error::{AmmError, AmmResult};
use crate::pool::{
    share_base_denom, sort_pool_assets_by_denom, Coin, Coins, Pool, PoolAsset, PoolParams,
    GUARANTEED_WEIGHT_PRECISION, INIT_POOL_SHARES_SUPPLY, MAX_POOL_ASSETS, MIN_POOL_ASSETS,
};
use crate::pool_traits::AssetWhitelist;
use serde::{Deserialize, Serialize};
use spot_config::PoolCreationSettings;
use std::collections::{BTreeSet, HashSet};

/// Everything a creator supplies for a new pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePoolRequest {
    pub params: PoolParams,
    /// Initial deposits with user-specified (unscaled) weights
    pub assets: Vec<PoolAsset>,
}

impl CreatePoolRequest {
    pub fn new(params: PoolParams, assets: Vec<PoolAsset>) -> Self {
        Self { params, assets }
    }

    /// Checks, in order: asset count, duplicate denoms, each asset's amount
    /// and weight, then pool type parameters and fee ranges
    pub fn validate(&self) -> AmmResult<()> {
        let count = self.assets.len();
        if count < MIN_POOL_ASSETS {
            return Err(AmmError::TooFewPoolAssets {
                count,
                min: MIN_POOL_ASSETS,
            });
        }
        if count > MAX_POOL_ASSETS {
            return Err(AmmError::TooManyPoolAssets {
                count,
                max: MAX_POOL_ASSETS,
            });
        }

        let mut seen = HashSet::with_capacity(count);
        for asset in &self.assets {
            if !seen.insert(asset.token.denom.as_str()) {
                return Err(AmmError::DuplicateDenom {
                    denom: asset.token.denom.clone(),
                });
            }
        }

        for asset in &self.assets {
            asset.validate()?;
        }

        self.params.validate()
    }

    /// Denoms of the requested assets in pool order
    pub fn sorted_denoms(&self) -> Vec<&str> {
        let mut denoms: Vec<&str> = self.assets.iter().map(|a| a.token.denom.as_str()).collect();
        denoms.sort_unstable();
        denoms
    }

    /// The initial deposit as a coin set
    pub fn deposit(&self) -> AmmResult<Coins> {
        Coins::new(self.assets.iter().map(|a| a.token.clone()))
    }
}

impl Pool {
    /// Build a fresh pool: weights scaled by [`GUARANTEED_WEIGHT_PRECISION`],
    /// assets sorted by denom, [`INIT_POOL_SHARES_SUPPLY`] shares outstanding
    pub fn new(id: u64, params: PoolParams, assets: Vec<PoolAsset>) -> AmmResult<Pool> {
        let request = CreatePoolRequest::new(params, assets);
        request.validate()?;

        let mut total_weight: u128 = 0;
        let mut scaled = Vec::with_capacity(request.assets.len());
        for mut asset in request.assets {
            asset.weight = asset
                .weight
                .checked_mul(GUARANTEED_WEIGHT_PRECISION)
                .ok_or(AmmError::Overflow {
                    operation: "weight scaling",
                })?;
            total_weight = total_weight
                .checked_add(asset.weight)
                .ok_or(AmmError::Overflow {
                    operation: "total weight",
                })?;
            scaled.push(asset);
        }
        sort_pool_assets_by_denom(&mut scaled);

        Ok(Pool {
            id,
            params: request.params,
            assets: scaled,
            total_weight,
            total_shares: Coin::new(share_base_denom(id), INIT_POOL_SHARES_SUPPLY),
        })
    }
}

/// Creation-time policy: which assets may be pooled and what creating a
/// pool costs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolCreationPolicy {
    pub whitelisted_assets: BTreeSet<String>,
    pub creation_fee: Coins,
    /// Account that receives the creation fee
    pub fee_collector: String,
}

impl PoolCreationPolicy {
    pub fn new(
        whitelisted_assets: impl IntoIterator<Item = impl Into<String>>,
        creation_fee: Coins,
        fee_collector: impl Into<String>,
    ) -> Self {
        Self {
            whitelisted_assets: whitelisted_assets.into_iter().map(Into::into).collect(),
            creation_fee,
            fee_collector: fee_collector.into(),
        }
    }

    /// Fails with [`AmmError::TokenNotAllowed`] on the first asset outside
    /// the whitelist
    pub fn check_assets(&self, request: &CreatePoolRequest) -> AmmResult<()> {
        for asset in &request.assets {
            if !self.is_asset_allowed(&asset.token.denom) {
                return Err(AmmError::TokenNotAllowed {
                    denom: asset.token.denom.clone(),
                });
            }
        }
        Ok(())
    }
}

impl AssetWhitelist for PoolCreationPolicy {
    fn is_asset_allowed(&self, denom: &str) -> bool {
        self.whitelisted_assets.contains(denom)
    }
}

impl TryFrom<&PoolCreationSettings> for PoolCreationPolicy {
    type Error = AmmError;

    fn try_from(settings: &PoolCreationSettings) -> Result<Self, Self::Error> {
        let creation_fee = Coins::new(
            settings
                .creation_fee
                .iter()
                .map(|fee| Coin::new(fee.denom.clone(), u128::from(fee.amount))),
        )?;
        Ok(Self::new(
            settings.whitelisted_assets.iter().cloned(),
            creation_fee,
            settings.fee_collector.clone(),
        ))
    }
}
