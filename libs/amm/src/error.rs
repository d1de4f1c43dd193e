//! Error types for pool engine operations
//!
//! Every engine failure is a typed [`AmmError`]. Callers that need to decide
//! between "reject the message" and "halt and escalate" use [`AmmError::kind`]
//! and [`AmmError::is_fatal`].

use rust_decimal::Decimal;
use thiserror::Error;

/// Result alias used across the engine
pub type AmmResult<T> = Result<T, AmmError>;

/// Coarse classification of engine errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller supplied invalid input; safe to reject and continue
    InputValidation,
    /// The input is well-formed but policy forbids the operation
    PolicyRejection,
    /// An arithmetic guard tripped; some variants indicate a defect
    ArithmeticGuard,
}

/// Errors produced by the pool engine
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AmmError {
    #[error("too few pool assets: got {count}, need {min}")]
    TooFewPoolAssets { count: usize, min: usize },

    #[error("too many pool assets: got {count}, max {max}")]
    TooManyPoolAssets { count: usize, max: usize },

    #[error("same pool asset already exists: {denom}")]
    DuplicateDenom { denom: String },

    #[error("invalid token amount {amount} for denom {denom}: must be positive")]
    InvalidTokenAmount { denom: String, amount: u128 },

    #[error("invalid token weight {weight} for denom {denom}: must be positive")]
    InvalidTokenWeight { denom: String, weight: u128 },

    #[error("a token's weight in the pool must be less than 2^50 (denom {denom}, weight {weight})")]
    WeightTooHigh { denom: String, weight: u128 },

    #[error("invalid pool type: {0}")]
    InvalidPoolType(String),

    #[error("amplification parameter is required for stableswap pools")]
    AmplificationMissing,

    #[error("amplification parameter must be positive")]
    AmplificationTooLow,

    #[error("invalid swap fee {0}: must be within [0, 1]")]
    InvalidSwapFee(Decimal),

    #[error("invalid exit fee {0}: must be within [0, 1]")]
    InvalidExitFee(Decimal),

    #[error("token denom {denom} not found in pool")]
    TokenDenomNotFound { denom: String },

    #[error("token in and token out denoms must differ: {denom}")]
    SameDenom { denom: String },

    #[error("invalid token in {denom}: amount must be positive")]
    InvalidTokenIn { denom: String },

    #[error("invalid token out {denom}: amount must be positive")]
    InvalidTokenOut { denom: String },

    #[error("no tokens supplied")]
    EmptyDeposit,

    #[error("too few assets to join this pool: got {got}, need {expected}")]
    IncompleteDeposit { got: usize, expected: usize },

    #[error("invalid number of pool shares {shares_in}: must be between 0 and {total_shares}")]
    InvalidShareAmount { shares_in: u128, total_shares: u128 },

    #[error("not enough pool shares to withdraw - please provide at least {min_shares} shares")]
    InsufficientSharesForWithdrawal { min_shares: u128 },

    #[error("tokenIn ({denom}) must be higher to perform a swap")]
    SwapOutputTooSmall { denom: String },

    #[error("insufficient liquidity for {denom}: requested {requested}, available {available}")]
    InsufficientLiquidity {
        denom: String,
        requested: u128,
        available: u128,
    },

    #[error("insufficient funds for {denom}: required {required}, available {available}")]
    InsufficientFunds {
        denom: String,
        required: u128,
        available: u128,
    },

    #[error("token {denom} is not whitelisted for pool creation")]
    TokenNotAllowed { denom: String },

    #[error("pool {pool_id} with the same assets already exists")]
    PoolWithSameAssetsExists { pool_id: u64 },

    #[error("could not find pool with id {pool_id}")]
    PoolNotFound { pool_id: u64 },

    #[error("invalid pool share denom: expected {expected}, got {got}")]
    InvalidShareDenom { expected: String, got: String },

    #[error("invariant D decreased after joining: D0={d0}, D1={d1}")]
    InvariantLowerAfterJoining { d0: u128, d1: u128 },

    #[error("pool is borked: asset {denom} has a zero balance, only withdrawals are possible")]
    BorkedPool { denom: String },

    #[error("division by zero in {operation}")]
    DivisionByZero { operation: &'static str },

    #[error("arithmetic overflow in {operation}")]
    Overflow { operation: &'static str },

    #[error("amount {value} does not fit the supported numeric range")]
    AmountOverflow { value: String },

    #[error("negative value {value} where a non-negative one is required")]
    NegativeValue { value: Decimal },
}

impl AmmError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        use AmmError::*;
        match self {
            TokenNotAllowed { .. }
            | PoolWithSameAssetsExists { .. }
            | PoolNotFound { .. }
            | InvalidShareDenom { .. } => ErrorKind::PolicyRejection,

            InvariantLowerAfterJoining { .. }
            | BorkedPool { .. }
            | SwapOutputTooSmall { .. }
            | DivisionByZero { .. }
            | Overflow { .. }
            | AmountOverflow { .. }
            | NegativeValue { .. } => ErrorKind::ArithmeticGuard,

            _ => ErrorKind::InputValidation,
        }
    }

    /// True for invariant violations that must be escalated rather than retried
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AmmError::InvariantLowerAfterJoining { .. } | AmmError::BorkedPool { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err = AmmError::TokenDenomNotFound {
            denom: "foo".into(),
        };
        assert_eq!(err.kind(), ErrorKind::InputValidation);
        assert!(!err.is_fatal());

        let err = AmmError::TokenNotAllowed {
            denom: "foo".into(),
        };
        assert_eq!(err.kind(), ErrorKind::PolicyRejection);

        let err = AmmError::InvariantLowerAfterJoining { d0: 10, d1: 9 };
        assert_eq!(err.kind(), ErrorKind::ArithmeticGuard);
        assert!(err.is_fatal());

        let err = AmmError::SwapOutputTooSmall {
            denom: "foo".into(),
        };
        assert_eq!(err.kind(), ErrorKind::ArithmeticGuard);
        assert!(!err.is_fatal());

        let err = AmmError::InsufficientFunds {
            denom: "foo".into(),
            required: 10,
            available: 9,
        };
        assert_eq!(err.kind(), ErrorKind::InputValidation);
        assert_eq!(
            err.to_string(),
            "insufficient funds for foo: required 10, available 9"
        );
    }

    #[test]
    fn test_error_messages() {
        let err = AmmError::InsufficientSharesForWithdrawal { min_shares: 42 };
        assert_eq!(
            err.to_string(),
            "not enough pool shares to withdraw - please provide at least 42 shares"
        );
    }
}
