use std::sync::Arc;

use rust_decimal::Decimal;

use earnings_ledger::domain::{Account, ConversionEvent, UserId};
use earnings_ledger::feed::LedgerFeed;
use earnings_ledger::ledger::{LedgerError, Settled, SettlementService, WithdrawalManager};
use earnings_ledger::notify::RecordingNotifier;
use earnings_ledger::store::{AccountStore, InMemoryStore};

/// A fully wired ledger over the in-memory store, with a recording notifier
/// so tests can observe side effects.
pub struct TestLedger {
    pub store: Arc<InMemoryStore>,
    pub settlement: SettlementService,
    pub withdrawals: WithdrawalManager,
    pub notifier: Arc<RecordingNotifier>,
    pub feed: LedgerFeed,
}

pub fn ledger() -> TestLedger {
    let store = Arc::new(InMemoryStore::new());
    let feed = LedgerFeed::new();
    let notifier = Arc::new(RecordingNotifier::new());
    let settlement =
        SettlementService::new(store.clone(), feed.clone(), notifier.clone());
    let withdrawals =
        WithdrawalManager::new(store.clone(), feed.clone(), notifier.clone());
    TestLedger {
        store,
        settlement,
        withdrawals,
        notifier,
        feed,
    }
}

impl TestLedger {
    /// Register a user with a zeroed account.
    pub async fn register(&self, user: &str) -> UserId {
        let user_id: UserId = user.into();
        self.store
            .create_account(user_id.clone())
            .await
            .expect("create account");
        user_id
    }

    pub async fn settle(
        &self,
        user: &str,
        amount: &str,
        offer: &str,
        transaction_id: Option<&str>,
    ) -> Result<Settled, LedgerError> {
        self.settlement
            .settle(ConversionEvent {
                user_id: user.into(),
                amount: amount.parse().expect("test amount parses"),
                offer_id: offer.to_owned(),
                currency: "USD".to_owned(),
                transaction_id: transaction_id.map(Into::into),
                source_ip: None,
                partner_status: None,
            })
            .await
    }

    pub async fn account_of(&self, user: &str) -> Account {
        self.store
            .account(&user.into())
            .await
            .expect("store read")
            .expect("account exists")
            .account
    }
}

/// Expected account state: balance, lifetime earnings, lifetime withdrawals.
#[allow(dead_code)]
pub fn account(balance: Decimal, earnings: Decimal, withdrawals: Decimal) -> Account {
    Account::new(balance, earnings, withdrawals)
}
