//! In-memory transactional store.
//!
//! One mutex over the whole state makes each commit atomic, which is exactly
//! the guarantee the trait demands; the version check and the uniqueness
//! constraint both run under that lock. Suitable for tests and single-node
//! deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    Account, AccountRecord, AuditRecord, EntryId, EntryKind, LedgerEntry, TransactionId, UserId,
    WithdrawalStatus,
};
use crate::store::{AccountStore, StoreError};

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<UserId, AccountRecord>,
    entries: HashMap<EntryId, LedgerEntry>,
    /// Insertion order, oldest first. Listings iterate this in reverse.
    entry_order: Vec<EntryId>,
    by_external_id: HashMap<TransactionId, EntryId>,
    audit: Vec<AuditRecord>,
}

impl State {
    fn insert_entry(&mut self, entry: LedgerEntry) -> Result<(), StoreError> {
        if let Some(external_id) = &entry.external_transaction_id {
            if self.by_external_id.contains_key(external_id) {
                return Err(StoreError::DuplicateTransaction(external_id.clone()));
            }
            self.by_external_id.insert(external_id.clone(), entry.id);
        }
        self.entry_order.push(entry.id);
        self.entries.insert(entry.id, entry);
        Ok(())
    }

    fn checked_account_mut(
        &mut self,
        user_id: &UserId,
        expected_version: u64,
    ) -> Result<&mut AccountRecord, StoreError> {
        let record = self
            .accounts
            .get_mut(user_id)
            .ok_or_else(|| StoreError::AccountMissing(user_id.clone()))?;
        if record.version != expected_version {
            return Err(StoreError::VersionConflict);
        }
        Ok(record)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn create_account(&self, user_id: UserId) -> Result<AccountRecord, StoreError> {
        let mut state = self.state.lock().await;
        let record = state
            .accounts
            .entry(user_id.clone())
            .or_insert_with(|| AccountRecord {
                user_id,
                account: Account::default(),
                version: 0,
            });
        Ok(record.clone())
    }

    async fn account(&self, user_id: &UserId) -> Result<Option<AccountRecord>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.accounts.get(user_id).cloned())
    }

    async fn commit_credit(
        &self,
        expected_version: u64,
        account: Account,
        entry: LedgerEntry,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        // Check both preconditions before mutating anything, so a failed
        // commit leaves no trace.
        let user_id = entry.user_id.clone();
        let record = state
            .accounts
            .get(&user_id)
            .ok_or_else(|| StoreError::AccountMissing(user_id.clone()))?;
        if record.version != expected_version {
            return Err(StoreError::VersionConflict);
        }
        if let Some(external_id) = &entry.external_transaction_id {
            if state.by_external_id.contains_key(external_id) {
                return Err(StoreError::DuplicateTransaction(external_id.clone()));
            }
        }
        state.insert_entry(entry)?;
        let record = state
            .accounts
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::AccountMissing(user_id.clone()))?;
        record.account = account;
        record.version += 1;
        Ok(())
    }

    async fn commit_debit(
        &self,
        user_id: &UserId,
        expected_version: u64,
        account: Account,
        entry_id: &EntryId,
        status: WithdrawalStatus,
    ) -> Result<LedgerEntry, StoreError> {
        let mut state = self.state.lock().await;
        let current = state
            .entries
            .get(entry_id)
            .ok_or(StoreError::EntryMissing(*entry_id))?
            .status;
        if !current.can_transition_to(status) {
            return Err(StoreError::StatusConflict(current));
        }
        {
            let record = state.checked_account_mut(user_id, expected_version)?;
            record.account = account;
            record.version += 1;
        }
        let entry = state
            .entries
            .get_mut(entry_id)
            .ok_or(StoreError::EntryMissing(*entry_id))?;
        entry.status = status;
        Ok(entry.clone())
    }

    async fn insert_entry(&self, entry: LedgerEntry) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.insert_entry(entry)
    }

    async fn entry(&self, id: &EntryId) -> Result<Option<LedgerEntry>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.entries.get(id).cloned())
    }

    async fn entry_by_external_id(
        &self,
        id: &TransactionId,
    ) -> Result<Option<LedgerEntry>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .by_external_id
            .get(id)
            .and_then(|entry_id| state.entries.get(entry_id))
            .cloned())
    }

    async fn entries_for_user(&self, user_id: &UserId) -> Result<Vec<LedgerEntry>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .entry_order
            .iter()
            .rev()
            .filter_map(|id| state.entries.get(id))
            .filter(|entry| &entry.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn withdrawal_requests(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .entry_order
            .iter()
            .rev()
            .filter_map(|id| state.entries.get(id))
            .filter(|entry| entry.kind == EntryKind::Withdrawal)
            .cloned()
            .collect())
    }

    async fn update_entry_status(
        &self,
        id: &EntryId,
        status: WithdrawalStatus,
        rejection_reason: Option<String>,
    ) -> Result<LedgerEntry, StoreError> {
        let mut state = self.state.lock().await;
        let entry = state
            .entries
            .get_mut(id)
            .ok_or(StoreError::EntryMissing(*id))?;
        if !entry.status.can_transition_to(status) {
            return Err(StoreError::StatusConflict(entry.status));
        }
        entry.status = status;
        if let Some(reason) = rejection_reason {
            entry.metadata.rejection_reason = Some(reason);
        }
        Ok(entry.clone())
    }

    async fn append_audit(&self, record: AuditRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.audit.push(record);
        Ok(())
    }

    async fn audit_for_entry(&self, id: &EntryId) -> Result<Vec<AuditRecord>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .audit
            .iter()
            .filter(|record| &record.entry_id == id)
            .cloned()
            .collect())
    }
}
