use rust_decimal::Decimal;

use crate::domain::{DomainError, EntryId, UserId, WithdrawalStatus};
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Unknown user {0}")]
    UnknownUser(UserId),
    #[error("Unknown withdrawal request {0}")]
    UnknownRequest(EntryId),
    #[error("Concurrent mutations exhausted the retry budget")]
    ConcurrencyExhausted,
    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },
    #[error("Invalid transition {from} -> {to}")]
    InvalidTransition {
        from: WithdrawalStatus,
        to: WithdrawalStatus,
    },
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<DomainError> for LedgerError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InsufficientFunds {
                available,
                requested,
            } => LedgerError::InsufficientFunds {
                available,
                requested,
            },
        }
    }
}

impl LedgerError {
    /// Transient errors are worth retrying by the caller; the idempotency
    /// guard makes settlement retries safe.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LedgerError::ConcurrencyExhausted | LedgerError::Store(StoreError::Unavailable(_))
        )
    }
}
