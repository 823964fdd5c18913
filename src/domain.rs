//! Core domain types: accounts, ledger entries, and the withdrawal state machine.

use chrono::{DateTime, Utc};
use derive_more::{Display, From, Into};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Newtype wrapper for user identifiers (opaque string assigned at registration).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into, Display)]
pub struct UserId(String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Newtype wrapper for ledger entry identifiers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into, Display,
)]
pub struct EntryId(Uuid);

impl EntryId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Newtype wrapper for the partner-assigned transaction identifier.
/// Unique across all ledger entries when present; the idempotency key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into, Display)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TransactionId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },
}

/// A user's balance record. Invariant: balance = total_earnings - total_withdrawals,
/// and balance is never negative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    balance: Decimal,
    total_earnings: Decimal,
    total_withdrawals: Decimal,
}

impl Account {
    pub fn new(balance: Decimal, total_earnings: Decimal, total_withdrawals: Decimal) -> Self {
        Self {
            balance,
            total_earnings,
            total_withdrawals,
        }
    }
    pub fn balance(&self) -> Decimal {
        self.balance
    }
    pub fn total_earnings(&self) -> Decimal {
        self.total_earnings
    }
    pub fn total_withdrawals(&self) -> Decimal {
        self.total_withdrawals
    }
    /// Credit funds (settlement). Increases balance and lifetime earnings.
    pub fn credit(&mut self, amount: Decimal) {
        self.balance += amount;
        self.total_earnings += amount;
    }
    /// Debit funds (approved withdrawal). Fails if balance < amount.
    pub fn try_debit(&mut self, amount: Decimal) -> Result<(), DomainError> {
        if self.balance < amount {
            return Err(DomainError::InsufficientFunds {
                available: self.balance,
                requested: amount,
            });
        }
        self.balance -= amount;
        self.total_withdrawals += amount;
        Ok(())
    }
}

/// An `Account` as persisted by the store, tagged with the version used for
/// compare-and-set. Every committed mutation bumps the version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    pub user_id: UserId,
    pub account: Account,
    pub version: u64,
}

/// What a ledger entry records: a credit, a debit, or a compensating credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Earning,
    Withdrawal,
    Reversal,
}

/// Status of a ledger entry. Earning and reversal entries are `Completed` from
/// birth; withdrawal entries walk this state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    #[display("pending")]
    Pending,
    #[display("processing")]
    Processing,
    #[display("completed")]
    Completed,
    #[display("rejected")]
    Rejected,
}

impl WithdrawalStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }

    /// The closed transition table. Anything not listed here is rejected.
    pub fn can_transition_to(self, next: Self) -> bool {
        use WithdrawalStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Completed)
                | (Pending, Rejected)
                | (Processing, Completed)
                | (Processing, Rejected)
        )
    }
}

/// Free-form context carried by a ledger entry for audit and display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_status: Option<String>,
}

/// Append-only record of a single credit or debit. Immutable once created,
/// except for `status` transitions on withdrawal-kind entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub user_id: UserId,
    pub external_transaction_id: Option<TransactionId>,
    pub kind: EntryKind,
    pub amount: Decimal,
    pub currency: String,
    pub status: WithdrawalStatus,
    pub metadata: EntryMetadata,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// A completed earning entry, created alongside the credit it records.
    pub fn earning(
        user_id: UserId,
        amount: Decimal,
        currency: String,
        external_transaction_id: Option<TransactionId>,
        metadata: EntryMetadata,
    ) -> Self {
        Self {
            id: EntryId::generate(),
            user_id,
            external_transaction_id,
            kind: EntryKind::Earning,
            amount,
            currency,
            status: WithdrawalStatus::Completed,
            metadata,
            created_at: Utc::now(),
        }
    }

    /// A pending withdrawal entry: an intent to debit, not a debit.
    pub fn withdrawal(
        user_id: UserId,
        amount: Decimal,
        currency: String,
        metadata: EntryMetadata,
    ) -> Self {
        Self {
            id: EntryId::generate(),
            user_id,
            external_transaction_id: None,
            kind: EntryKind::Withdrawal,
            amount,
            currency,
            status: WithdrawalStatus::Pending,
            metadata,
            created_at: Utc::now(),
        }
    }
}

/// Ephemeral input to settlement. Not persisted as its own entity; its
/// transaction id ends up on the resulting ledger entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionEvent {
    pub user_id: UserId,
    pub amount: Decimal,
    pub offer_id: String,
    pub currency: String,
    pub transaction_id: Option<TransactionId>,
    pub source_ip: Option<String>,
    pub partner_status: Option<String>,
}

/// One row of the withdrawal audit trail: who moved which request where.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub entry_id: EntryId,
    pub actor: String,
    pub previous_status: WithdrawalStatus,
    pub new_status: WithdrawalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
