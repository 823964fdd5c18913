//! Storage facade for the ledger.
//!
//! All shared mutable state lives behind [`AccountStore`]; the ledger services
//! themselves hold nothing mutable. The production deployment backs this with
//! a managed relational store; [`InMemoryStore`] is the reference
//! implementation and the test backend.

use async_trait::async_trait;

use crate::domain::{
    Account, AccountRecord, AuditRecord, EntryId, LedgerEntry, TransactionId, UserId,
    WithdrawalStatus,
};

mod memory;

pub use memory::InMemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The account changed since it was read; the caller should re-read and retry.
    #[error("Account version conflict")]
    VersionConflict,
    /// An entry with this external transaction id already exists. This is the
    /// idempotency guard firing, not a hard failure.
    #[error("Duplicate external transaction id {0}")]
    DuplicateTransaction(TransactionId),
    /// The entry moved to another status since it was read (e.g. two
    /// operators racing on the same request). Carries the current status.
    #[error("Entry status changed concurrently, now {0}")]
    StatusConflict(WithdrawalStatus),
    #[error("No account for user {0}")]
    AccountMissing(UserId),
    #[error("No ledger entry {0}")]
    EntryMissing(EntryId),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Store contract used by settlement and the withdrawal lifecycle.
///
/// Implementations are responsible for making the two balance-affecting
/// commits atomic:
/// - `commit_credit` must apply the account write and the entry insert as one
///   transaction, reject the write when the stored version differs from
///   `expected_version`, and enforce uniqueness of
///   `external_transaction_id` inside that same transaction.
/// - `commit_debit` must apply the account write and the entry status change
///   as one transaction, under the same version check.
///
/// Nothing else may write an account record.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Create a zeroed account for a user, or return the existing one.
    /// Called from the registration hook, never from settlement.
    async fn create_account(&self, user_id: UserId) -> Result<AccountRecord, StoreError>;

    /// Read an account record, with its current version.
    async fn account(&self, user_id: &UserId) -> Result<Option<AccountRecord>, StoreError>;

    /// Atomically replace the account (if unchanged since `expected_version`)
    /// and insert the earning entry recording the credit.
    async fn commit_credit(
        &self,
        expected_version: u64,
        account: Account,
        entry: LedgerEntry,
    ) -> Result<(), StoreError>;

    /// Atomically replace the account (if unchanged since `expected_version`)
    /// and move the referenced withdrawal entry to `status`.
    async fn commit_debit(
        &self,
        user_id: &UserId,
        expected_version: u64,
        account: Account,
        entry_id: &EntryId,
        status: WithdrawalStatus,
    ) -> Result<LedgerEntry, StoreError>;

    /// Insert an entry with no balance effect (pending withdrawal intents).
    async fn insert_entry(&self, entry: LedgerEntry) -> Result<(), StoreError>;

    async fn entry(&self, id: &EntryId) -> Result<Option<LedgerEntry>, StoreError>;

    /// Idempotency lookup: the entry already recorded for a partner
    /// transaction id, if any.
    async fn entry_by_external_id(
        &self,
        id: &TransactionId,
    ) -> Result<Option<LedgerEntry>, StoreError>;

    /// A user's entries, newest first.
    async fn entries_for_user(&self, user_id: &UserId) -> Result<Vec<LedgerEntry>, StoreError>;

    /// All withdrawal-kind entries, newest first (operator view).
    async fn withdrawal_requests(&self) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Update the status of a withdrawal entry with no balance effect
    /// (processing, rejection). `rejection_reason` is merged into metadata.
    async fn update_entry_status(
        &self,
        id: &EntryId,
        status: WithdrawalStatus,
        rejection_reason: Option<String>,
    ) -> Result<LedgerEntry, StoreError>;

    /// Append one audit row. Append-only; rows are never updated.
    async fn append_audit(&self, record: AuditRecord) -> Result<(), StoreError>;

    async fn audit_for_entry(&self, id: &EntryId) -> Result<Vec<AuditRecord>, StoreError>;
}
