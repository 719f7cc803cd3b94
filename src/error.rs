// ============================================================================
// Error Taxonomy - BlackBook Settlement Ledger
// ============================================================================
//
// Every engine operation is all-or-nothing: an error always means no state
// was changed. Errors are grouped by kind so callers (and the HTTP layer)
// can decide whether a retry with new parameters makes sense.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::market_resolve::{MarketId, Side};

/// Broad category of a [`MarketError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller mistake, rejected before any mutation
    Validation,
    /// Illegal lifecycle transition
    State,
    /// Caller is not allowed to perform the operation
    Authorization,
    /// Price or funds did not line up; retry with new parameters
    Economic,
    /// Redelivery of something already applied
    Consistency,
    /// Referenced entity does not exist
    NotFound,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::State => "state",
            ErrorKind::Authorization => "authorization",
            ErrorKind::Economic => "economic",
            ErrorKind::Consistency => "consistency",
            ErrorKind::NotFound => "not_found",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    // ----- validation -----
    #[error("Resolution time {resolution_time} is not after now ({now})")]
    InvalidSchedule { resolution_time: u64, now: u64 },

    #[error("Market question must not be empty")]
    InvalidQuestion,

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Account identity must not be empty")]
    InvalidAccount,

    #[error("Amount {amount} is too large to price")]
    AmountOutOfRange { amount: u128 },

    #[error("Malformed relay payload: {0}")]
    MalformedPayload(String),

    // ----- state -----
    #[error("Market {0} is already resolved")]
    MarketResolved(MarketId),

    #[error("Market {market_id} stopped trading at {resolution_time}")]
    MarketExpired { market_id: MarketId, resolution_time: u64 },

    #[error("Market {0} is not resolved yet")]
    MarketNotResolved(MarketId),

    #[error("Market {0} already has an outcome")]
    AlreadyResolved(MarketId),

    #[error("Position of {account} in market {market_id} was already claimed")]
    AlreadyClaimed { market_id: MarketId, account: String },

    #[error("Market {market_id} cannot be resolved before {resolution_time} (now {now})")]
    ResolutionTooEarly { market_id: MarketId, resolution_time: u64, now: u64 },

    #[error("{account} holds no position in market {market_id}")]
    NoPosition { market_id: MarketId, account: String },

    // ----- authorization -----
    #[error("{caller} is not the resolver of market {market_id}")]
    UnauthorizedResolver { market_id: MarketId, caller: String },

    #[error("Message did not arrive through a trusted channel: {0}")]
    UntrustedChannel(String),

    // ----- economic -----
    #[error("Insufficient funds: {account} needs {required}, has {available}")]
    InsufficientFunds { account: String, required: u128, available: u128 },

    #[error("Cost {cost} exceeds max_cost {max_cost} for {side} on market {market_id}")]
    SlippageExceeded { market_id: MarketId, side: Side, cost: u128, max_cost: u128 },

    #[error("Collateral ledger rejected the transfer: {0}")]
    LedgerUnavailable(String),

    // ----- consistency -----
    #[error("Message {nonce} from domain {source_domain} was already applied")]
    DuplicateMessage { source_domain: u32, nonce: u64 },

    // ----- not found -----
    #[error("Market not found: {0}")]
    UnknownMarket(MarketId),
}

impl MarketError {
    pub fn kind(&self) -> ErrorKind {
        use MarketError::*;
        match self {
            InvalidSchedule { .. }
            | InvalidQuestion
            | InvalidAmount
            | InvalidAccount
            | AmountOutOfRange { .. }
            | MalformedPayload(_) => ErrorKind::Validation,
            MarketResolved(_)
            | MarketExpired { .. }
            | MarketNotResolved(_)
            | AlreadyResolved(_)
            | AlreadyClaimed { .. }
            | ResolutionTooEarly { .. }
            | NoPosition { .. } => ErrorKind::State,
            UnauthorizedResolver { .. } | UntrustedChannel(_) => ErrorKind::Authorization,
            InsufficientFunds { .. } | SlippageExceeded { .. } | LedgerUnavailable(_) => {
                ErrorKind::Economic
            }
            DuplicateMessage { .. } => ErrorKind::Consistency,
            UnknownMarket(_) => ErrorKind::NotFound,
        }
    }

    /// Whether the caller may retry the same intent with updated parameters
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Economic
    }
}

pub type MarketResult<T> = Result<T, MarketError>;
