//! Withdrawal lifecycle: request, operator decision, debit on approval.
//!
//! A pending request is an intent, not a debit. The balance check at request
//! time is advisory; the authoritative check happens at approval, against the
//! balance read at approval time, and the debit commits with the same
//! optimistic concurrency as settlement. This is the only path that decreases
//! a balance.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::domain::{
    AuditRecord, EntryId, EntryKind, EntryMetadata, LedgerEntry, UserId, WithdrawalStatus,
};
use crate::feed::{FeedEvent, LedgerFeed};
use crate::ledger::errors::LedgerError;
use crate::ledger::settlement::DEFAULT_MAX_COMMIT_ATTEMPTS;
use crate::notify::{Notification, NotificationKind, Notifier};
use crate::store::{AccountStore, StoreError};

pub struct WithdrawalManager {
    store: Arc<dyn AccountStore>,
    feed: LedgerFeed,
    notifier: Arc<dyn Notifier>,
    max_commit_attempts: u32,
}

impl WithdrawalManager {
    pub fn new(store: Arc<dyn AccountStore>, feed: LedgerFeed, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            feed,
            notifier,
            max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
        }
    }

    pub fn with_max_commit_attempts(mut self, attempts: u32) -> Self {
        self.max_commit_attempts = attempts.max(1);
        self
    }

    /// Create a pending withdrawal request. No balance mutation happens here.
    pub async fn create_request(
        &self,
        user_id: UserId,
        amount: Decimal,
        method: String,
        destination: String,
    ) -> Result<LedgerEntry, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(amount.to_string()));
        }
        let record = self
            .store
            .account(&user_id)
            .await?
            .ok_or_else(|| LedgerError::UnknownUser(user_id.clone()))?;

        // Advisory: the balance may change before approval, which re-checks.
        let available = record.account.balance();
        if amount > available {
            return Err(LedgerError::InsufficientFunds {
                available,
                requested: amount,
            });
        }

        let metadata = EntryMetadata {
            payment_method: Some(method),
            destination: Some(destination),
            ..EntryMetadata::default()
        };
        let entry = LedgerEntry::withdrawal(user_id, amount, "USD".to_owned(), metadata);
        self.store.insert_entry(entry.clone()).await?;

        info!(user = %entry.user_id, amount = %amount, request = %entry.id, "Withdrawal requested");
        self.feed.publish(FeedEvent::EntryRecorded {
            entry: entry.clone(),
        });
        self.notify_best_effort(
            &entry.user_id,
            Notification {
                kind: NotificationKind::Info,
                title: "Withdrawal request submitted".to_owned(),
                body: format!(
                    "Your withdrawal request for ${:.2} USD was submitted and is pending review.",
                    amount
                ),
            },
        )
        .await;
        Ok(entry)
    }

    /// Move a request through the state machine. Approval debits the account.
    pub async fn update_status(
        &self,
        request_id: EntryId,
        new_status: WithdrawalStatus,
        actor: &str,
        notes: Option<String>,
    ) -> Result<LedgerEntry, LedgerError> {
        let entry = self
            .store
            .entry(&request_id)
            .await?
            .filter(|entry| entry.kind == EntryKind::Withdrawal)
            .ok_or(LedgerError::UnknownRequest(request_id))?;

        let previous = entry.status;
        if !previous.can_transition_to(new_status) {
            return Err(LedgerError::InvalidTransition {
                from: previous,
                to: new_status,
            });
        }

        let updated = match new_status {
            WithdrawalStatus::Completed => self.approve(&entry).await?,
            WithdrawalStatus::Rejected => {
                let reason = notes
                    .as_deref()
                    .filter(|reason| !reason.trim().is_empty())
                    .ok_or_else(|| {
                        LedgerError::InvalidPayload("rejection requires a reason".into())
                    })?;
                let updated = self
                    .store
                    .update_entry_status(
                        &request_id,
                        WithdrawalStatus::Rejected,
                        Some(reason.to_owned()),
                    )
                    .await
                    .map_err(map_status_conflict(new_status))?;
                self.notify_best_effort(
                    &updated.user_id,
                    Notification {
                        kind: NotificationKind::Error,
                        title: "Withdrawal rejected".to_owned(),
                        body: format!(
                            "Your withdrawal request for ${:.2} USD was rejected. Reason: {reason}",
                            updated.amount
                        ),
                    },
                )
                .await;
                updated
            }
            WithdrawalStatus::Processing => self
                .store
                .update_entry_status(&request_id, WithdrawalStatus::Processing, None)
                .await
                .map_err(map_status_conflict(new_status))?,
            // The transition table never admits a move back to pending.
            WithdrawalStatus::Pending => unreachable!("rejected by the transition table"),
        };

        info!(
            request = %request_id,
            actor,
            from = %previous,
            to = %new_status,
            "Withdrawal status changed"
        );
        self.store
            .append_audit(AuditRecord {
                entry_id: request_id,
                actor: actor.to_owned(),
                previous_status: previous,
                new_status,
                notes,
                recorded_at: chrono::Utc::now(),
            })
            .await?;
        self.feed.publish(FeedEvent::StatusChanged {
            entry_id: request_id,
            user_id: updated.user_id.clone(),
            amount: updated.amount,
            previous_status: previous,
            new_status,
        });
        Ok(updated)
    }

    /// A user's own requests, newest first.
    pub async fn requests_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        let entries = self.store.entries_for_user(user_id).await?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.kind == EntryKind::Withdrawal)
            .collect())
    }

    /// Every request, newest first (operator view).
    pub async fn all_requests(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self.store.withdrawal_requests().await?)
    }

    /// The authoritative debit. Re-reads the balance at approval time and
    /// aborts (leaving the request in its prior state) if funds are short.
    async fn approve(&self, entry: &LedgerEntry) -> Result<LedgerEntry, LedgerError> {
        for attempt in 0..self.max_commit_attempts {
            let record = self
                .store
                .account(&entry.user_id)
                .await?
                .ok_or_else(|| LedgerError::UnknownUser(entry.user_id.clone()))?;

            let mut account = record.account.clone();
            account.try_debit(entry.amount)?;

            match self
                .store
                .commit_debit(
                    &entry.user_id,
                    record.version,
                    account.clone(),
                    &entry.id,
                    WithdrawalStatus::Completed,
                )
                .await
            {
                Ok(updated) => {
                    info!(
                        user = %entry.user_id,
                        amount = %entry.amount,
                        balance = %account.balance(),
                        "Withdrawal approved and debited"
                    );
                    self.notify_best_effort(
                        &entry.user_id,
                        Notification {
                            kind: NotificationKind::Success,
                            title: "Withdrawal approved".to_owned(),
                            body: format!(
                                "Your withdrawal request for ${:.2} USD was approved and processed.",
                                entry.amount
                            ),
                        },
                    )
                    .await;
                    return Ok(updated);
                }
                Err(StoreError::VersionConflict) => {
                    debug!(
                        user = %entry.user_id,
                        attempt,
                        "Concurrent account mutation, retrying approval commit"
                    );
                }
                Err(StoreError::StatusConflict(current)) => {
                    // Another operator got there first.
                    return Err(LedgerError::InvalidTransition {
                        from: current,
                        to: WithdrawalStatus::Completed,
                    });
                }
                Err(StoreError::AccountMissing(user_id)) => {
                    return Err(LedgerError::UnknownUser(user_id));
                }
                Err(err) => return Err(err.into()),
            }
        }

        warn!(request = %entry.id, "Approval retry budget exhausted");
        Err(LedgerError::ConcurrencyExhausted)
    }

    async fn notify_best_effort(&self, user_id: &UserId, notification: Notification) {
        if let Err(err) = self.notifier.notify(user_id, notification).await {
            warn!(user = %user_id, "Failed to deliver withdrawal notification: {err}");
        }
    }
}

fn map_status_conflict(requested: WithdrawalStatus) -> impl FnOnce(StoreError) -> LedgerError {
    move |err| match err {
        StoreError::StatusConflict(current) => LedgerError::InvalidTransition {
            from: current,
            to: requested,
        },
        other => other.into(),
    }
}
