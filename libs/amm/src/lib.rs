//! # Spot AMM - Deterministic Liquidity Pool Engine
//!
//! ## Purpose
//!
//! Pool engine for two-asset automated market makers. Creates pools, prices
//! swaps in both directions, and accounts for proportional and single-asset
//! deposits and fee-bearing withdrawals. Two invariant models are supported:
//! the Balancer weighted constant product and the Curve-style stableswap
//! curve. All arithmetic is fixed-point decimal or wide integer, so every
//! node running the engine arrives at bit-identical results.
//!
//! ## Integration Points
//!
//! - **Input Sources**: pool records from a [`PoolStore`], user messages
//!   (create/join/exit/swap) routed through [`PoolManager`]
//! - **Output Destinations**: updated [`Pool`] values written back to the
//!   store, token movements issued to a [`TokenCustody`] backend
//! - **Policy**: whitelist and creation fee from [`PoolCreationPolicy`],
//!   usually built from `spot_config::PoolCreationSettings`
//! - **Precision**: `rust_decimal::Decimal` for ratios and fees, `u128` base
//!   amounts, `U256` for amount products and inside the stableswap solver
//!
//! ## Architecture Role
//!
//! ```text
//! fixed_point ─┬─> balancer ───┐
//!              └─> stableswap ─┼─> swap ───┐
//! pool ────────────────────────┴─> shares ─┼─> lifecycle ─> manager
//!                                          └───────────────────┘
//! ```
//!
//! The engine layers (`pool` through `lifecycle`) are pure functions over a
//! `Pool` value. Only [`PoolManager`] talks to collaborators. It commits a
//! transition only after the engine call succeeded and reverses the token
//! movements already made if a later step fails.

pub mod balancer;
pub mod error;
pub mod fixed_point;
pub mod lifecycle;
pub mod manager;
pub mod pool;
pub mod pool_traits;
pub mod shares;
pub mod stableswap;
pub mod swap;

pub use error::{AmmError, AmmResult, ErrorKind};
pub use fixed_point::Amount;
pub use lifecycle::{CreatePoolRequest, PoolCreationPolicy};
pub use manager::{JoinOutcome, PoolManager};
pub use pool::{
    pool_account, share_base_denom, share_display_denom, Coin, Coins, Pool, PoolAsset, PoolParams,
    PoolType, GUARANTEED_WEIGHT_PRECISION, INIT_POOL_SHARES_SUPPLY, MAX_POOL_ASSETS,
    MAX_USER_SPECIFIED_WEIGHT, MIN_POOL_ASSETS, POOL_SHARE_DISPLAY_EXPONENT,
};
pub use pool_traits::{AssetWhitelist, PoolStore, TokenCustody};
pub use shares::ExitOutcome;
pub use stableswap::MAX_SOLVER_ITERATIONS;
pub use swap::SwapQuote;

/// Common types for pool calculations
pub use rust_decimal::Decimal;
pub use rust_decimal_macros::dec;
