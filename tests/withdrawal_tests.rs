mod common;

use common::{account, ledger};
use earnings_ledger::domain::{EntryKind, WithdrawalStatus};
use earnings_ledger::ledger::LedgerError;
use earnings_ledger::store::AccountStore;
use rust_decimal::dec;

/// Scenario: balance 5.00, request 10.00 — rejected up front, and no intent
/// entry is left behind.
#[tokio::test]
async fn request_exceeding_balance_is_rejected_without_entry() {
    let ledger = ledger();
    let user = ledger.register("user-1").await;
    ledger.settle("user-1", "5.00", "42", None).await.unwrap();

    let err = ledger
        .withdrawals
        .create_request(user.clone(), dec!(10.00), "paypal".into(), "a@b.c".into())
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
    let entries = ledger.store.entries_for_user(&user).await.unwrap();
    assert_eq!(entries.len(), 1, "only the earning entry exists");
    assert_eq!(entries[0].kind, EntryKind::Earning);
}

#[tokio::test]
async fn request_rejects_non_positive_amounts() {
    let ledger = ledger();
    let user = ledger.register("user-1").await;

    for amount in [dec!(0), dec!(-1.00)] {
        let err = ledger
            .withdrawals
            .create_request(user.clone(), amount, "paypal".into(), "a@b.c".into())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(_)), "{amount}");
    }
}

/// Scenario: balance 10.00, request 10.00 — a pending intent is recorded and
/// the balance is untouched; approval then debits it in full.
#[tokio::test]
async fn pending_request_holds_nothing_and_approval_debits() {
    let ledger = ledger();
    let user = ledger.register("user-1").await;
    ledger.settle("user-1", "10.00", "42", None).await.unwrap();

    let request = ledger
        .withdrawals
        .create_request(user, dec!(10.00), "paypal".into(), "a@b.c".into())
        .await
        .unwrap();
    assert_eq!(request.status, WithdrawalStatus::Pending);
    assert_eq!(
        ledger.account_of("user-1").await,
        account(dec!(10.00), dec!(10.00), dec!(0))
    );

    let updated = ledger
        .withdrawals
        .update_status(request.id, WithdrawalStatus::Completed, "op-7", None)
        .await
        .unwrap();

    assert_eq!(updated.status, WithdrawalStatus::Completed);
    assert_eq!(
        ledger.account_of("user-1").await,
        account(dec!(0.00), dec!(10.00), dec!(10.00))
    );
}

/// Rejection needs a reason; the reason lands in entry metadata for the user
/// to see, and the balance is untouched.
#[tokio::test]
async fn rejection_records_reason_and_keeps_balance() {
    let ledger = ledger();
    let user = ledger.register("user-1").await;
    ledger.settle("user-1", "20.00", "42", None).await.unwrap();
    let request = ledger
        .withdrawals
        .create_request(user, dec!(15.00), "paypal".into(), "a@b.c".into())
        .await
        .unwrap();

    let missing_reason = ledger
        .withdrawals
        .update_status(request.id, WithdrawalStatus::Rejected, "op-7", None)
        .await
        .unwrap_err();
    assert!(matches!(missing_reason, LedgerError::InvalidPayload(_)));

    let updated = ledger
        .withdrawals
        .update_status(
            request.id,
            WithdrawalStatus::Rejected,
            "op-7",
            Some("unverified payout account".into()),
        )
        .await
        .unwrap();

    assert_eq!(updated.status, WithdrawalStatus::Rejected);
    assert_eq!(
        updated.metadata.rejection_reason.as_deref(),
        Some("unverified payout account")
    );
    assert_eq!(
        ledger.account_of("user-1").await,
        account(dec!(20.00), dec!(20.00), dec!(0))
    );
}

/// Every accepted transition leaves an audit row: who, previous status, new
/// status, notes.
#[tokio::test]
async fn transitions_append_audit_trail() {
    let ledger = ledger();
    let user = ledger.register("user-1").await;
    ledger.settle("user-1", "30.00", "42", None).await.unwrap();
    let request = ledger
        .withdrawals
        .create_request(user, dec!(30.00), "paypal".into(), "a@b.c".into())
        .await
        .unwrap();

    ledger
        .withdrawals
        .update_status(request.id, WithdrawalStatus::Processing, "op-1", None)
        .await
        .unwrap();
    ledger
        .withdrawals
        .update_status(
            request.id,
            WithdrawalStatus::Completed,
            "op-2",
            Some("payout batch 12".into()),
        )
        .await
        .unwrap();

    let audit = ledger.store.audit_for_entry(&request.id).await.unwrap();
    assert_eq!(audit.len(), 2);
    assert_eq!(audit[0].actor, "op-1");
    assert_eq!(audit[0].previous_status, WithdrawalStatus::Pending);
    assert_eq!(audit[0].new_status, WithdrawalStatus::Processing);
    assert_eq!(audit[1].actor, "op-2");
    assert_eq!(audit[1].new_status, WithdrawalStatus::Completed);
    assert_eq!(audit[1].notes.as_deref(), Some("payout batch 12"));
}

/// An unknown request id (or an earning entry's id) is not a withdrawal
/// request.
#[tokio::test]
async fn update_status_rejects_non_withdrawal_entries() {
    let ledger = ledger();
    let user = ledger.register("user-1").await;
    ledger
        .settle("user-1", "5.00", "42", Some("tx-1"))
        .await
        .unwrap();
    let earning = &ledger.store.entries_for_user(&user).await.unwrap()[0];

    let err = ledger
        .withdrawals
        .update_status(earning.id, WithdrawalStatus::Completed, "op-1", None)
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::UnknownRequest(_)));
}

/// Users see their own requests newest first.
#[tokio::test]
async fn requests_for_user_lists_newest_first() {
    let ledger = ledger();
    let user = ledger.register("user-1").await;
    ledger.settle("user-1", "50.00", "42", None).await.unwrap();

    let first = ledger
        .withdrawals
        .create_request(user.clone(), dec!(10.00), "paypal".into(), "a@b.c".into())
        .await
        .unwrap();
    let second = ledger
        .withdrawals
        .create_request(user.clone(), dec!(20.00), "paypal".into(), "a@b.c".into())
        .await
        .unwrap();

    let requests = ledger.withdrawals.requests_for_user(&user).await.unwrap();
    assert_eq!(
        requests.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![second.id, first.id]
    );
}
