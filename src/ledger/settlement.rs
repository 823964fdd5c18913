//! Conversion settlement: the only path that increases a balance.
//!
//! A partner postback arrives at least once; the uniqueness constraint on the
//! external transaction id turns repeated deliveries into idempotent replays.
//! The account write is optimistic: read, compute, commit against the version
//! that was read, retry on conflict.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::commission::{self, Tier};
use crate::domain::{
    ConversionEvent, EntryMetadata, LedgerEntry, TransactionId, UserId,
};
use crate::feed::{FeedEvent, LedgerFeed};
use crate::ledger::errors::LedgerError;
use crate::notify::{Notification, NotificationKind, Notifier};
use crate::store::{AccountStore, StoreError};

pub const DEFAULT_MAX_COMMIT_ATTEMPTS: u32 = 5;

/// Outcome of a settlement. A replayed delivery is a success, not an error;
/// partner systems retry until they see one.
#[derive(Debug, Clone, PartialEq)]
pub enum Settled {
    Credited {
        entry: LedgerEntry,
        new_balance: Decimal,
    },
    AlreadySettled {
        entry: LedgerEntry,
    },
}

pub struct SettlementService {
    store: Arc<dyn AccountStore>,
    feed: LedgerFeed,
    notifier: Arc<dyn Notifier>,
    max_commit_attempts: u32,
}

impl SettlementService {
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

    /// Credit a confirmed conversion to the user's account.
    pub async fn settle(&self, event: ConversionEvent) -> Result<Settled, LedgerError> {
        if event.user_id.as_str().is_empty() {
            return Err(LedgerError::InvalidPayload("missing user id".into()));
        }
        if event.offer_id.is_empty() {
            return Err(LedgerError::InvalidPayload("missing offer id".into()));
        }
        if event.amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(event.amount.to_string()));
        }

        // Accounts are created at registration; a postback for an unknown user
        // is a partner misconfiguration, not a signup.
        let mut record = self
            .store
            .account(&event.user_id)
            .await?
            .ok_or_else(|| LedgerError::UnknownUser(event.user_id.clone()))?;

        // Fast path for replays. The authoritative claim is the uniqueness
        // constraint checked inside commit_credit; this read just avoids
        // burning a commit attempt on the common retry case.
        if let Some(transaction_id) = &event.transaction_id {
            if let Some(entry) = self.store.entry_by_external_id(transaction_id).await? {
                debug!(transaction = %transaction_id, "Settlement replay, already credited");
                return Ok(Settled::AlreadySettled { entry });
            }
        }

        let metadata = EntryMetadata {
            offer_id: Some(event.offer_id.clone()),
            source_ip: event.source_ip.clone(),
            partner_status: event.partner_status.clone(),
            ..EntryMetadata::default()
        };

        for attempt in 0..self.max_commit_attempts {
            let mut account = record.account.clone();
            account.credit(event.amount);
            let entry = LedgerEntry::earning(
                event.user_id.clone(),
                event.amount,
                event.currency.clone(),
                event.transaction_id.clone(),
                metadata.clone(),
            );

            match self
                .store
                .commit_credit(record.version, account.clone(), entry.clone())
                .await
            {
                Ok(()) => {
                    let new_balance = account.balance();
                    info!(
                        user = %event.user_id,
                        amount = %event.amount,
                        balance = %new_balance,
                        "Conversion settled"
                    );
                    self.publish_credit(&entry, new_balance).await;
                    return Ok(Settled::Credited { entry, new_balance });
                }
                Err(StoreError::VersionConflict) => {
                    debug!(
                        user = %event.user_id,
                        attempt,
                        "Concurrent account mutation, retrying settlement commit"
                    );
                    record = self
                        .store
                        .account(&event.user_id)
                        .await?
                        .ok_or_else(|| LedgerError::UnknownUser(event.user_id.clone()))?;
                }
                Err(StoreError::DuplicateTransaction(transaction_id)) => {
                    // A concurrent delivery of the same postback won the race.
                    let entry = self
                        .store
                        .entry_by_external_id(&transaction_id)
                        .await?
                        .ok_or(StoreError::DuplicateTransaction(transaction_id))?;
                    return Ok(Settled::AlreadySettled { entry });
                }
                Err(StoreError::AccountMissing(user_id)) => {
                    return Err(LedgerError::UnknownUser(user_id));
                }
                Err(err) => return Err(err.into()),
            }
        }

        warn!(user = %event.user_id, "Settlement retry budget exhausted");
        Err(LedgerError::ConcurrencyExhausted)
    }

    /// Affiliate-sale crediting: compute the tiered commission and settle it,
    /// with the sale id as the idempotency key.
    pub async fn settle_affiliate_sale(
        &self,
        user_id: UserId,
        sale_price: Decimal,
        tier: Tier,
        sale_id: TransactionId,
    ) -> Result<Settled, LedgerError> {
        let amount = commission::payout(sale_price, tier);
        self.settle(ConversionEvent {
            user_id,
            amount,
            offer_id: format!("sale:{sale_id}"),
            currency: "USD".to_owned(),
            transaction_id: Some(sale_id),
            source_ip: None,
            partner_status: None,
        })
        .await
    }

    async fn publish_credit(&self, entry: &LedgerEntry, new_balance: Decimal) {
        self.feed.publish(FeedEvent::EntryRecorded {
            entry: entry.clone(),
        });
        let notification = Notification {
            kind: NotificationKind::Success,
            title: "Offer completed!".to_owned(),
            body: format!(
                "You earned ${:.2} {} for completing an offer. Your new balance is ${:.2} {}.",
                entry.amount, entry.currency, new_balance, entry.currency
            ),
        };
        if let Err(err) = self.notifier.notify(&entry.user_id, notification).await {
            // Side effect only; the credit is already committed.
            warn!(user = %entry.user_id, "Failed to deliver settlement notification: {err}");
        }
    }
}
