//! Real-time ledger feed.
//!
//! Every entry insert and every withdrawal status change is published here so
//! the operator dashboard and user dashboards can observe the ledger live.
//! Publishing is fire-and-forget: a feed with no subscribers, or a subscriber
//! that lags behind, never affects a ledger operation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::{Stream, StreamExt, wrappers::BroadcastStream};

use crate::domain::{EntryId, LedgerEntry, UserId, WithdrawalStatus};

const FEED_CAPACITY: usize = 256;

/// A single observable ledger event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    /// A new ledger entry was recorded (earning credit or withdrawal intent).
    EntryRecorded { entry: LedgerEntry },
    /// A withdrawal request moved to a new status.
    StatusChanged {
        entry_id: EntryId,
        user_id: UserId,
        amount: Decimal,
        previous_status: WithdrawalStatus,
        new_status: WithdrawalStatus,
    },
}

impl FeedEvent {
    pub fn user_id(&self) -> &UserId {
        match self {
            FeedEvent::EntryRecorded { entry } => &entry.user_id,
            FeedEvent::StatusChanged { user_id, .. } => user_id,
        }
    }
}

/// Broadcast channel over ledger events.
#[derive(Debug, Clone)]
pub struct LedgerFeed {
    sender: broadcast::Sender<FeedEvent>,
}

impl Default for LedgerFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        Self { sender }
    }

    /// Publish an event. Returns the number of subscribers it reached.
    pub fn publish(&self, event: FeedEvent) -> usize {
        // send only fails when there are no receivers, which is fine here.
        self.sender.send(event).unwrap_or(0)
    }

    /// Operator view: every event.
    pub fn subscribe_all(&self) -> broadcast::Receiver<FeedEvent> {
        self.sender.subscribe()
    }

    /// User view: only that user's events. Lagged messages are dropped.
    pub fn subscribe_user(&self, user_id: UserId) -> impl Stream<Item = FeedEvent> + Send {
        BroadcastStream::new(self.sender.subscribe())
            .filter_map(|event| event.ok())
            .filter(move |event| event.user_id() == &user_id)
    }
}
