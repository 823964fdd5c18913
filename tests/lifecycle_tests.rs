mod common;

use common::{account, ledger};
use earnings_ledger::domain::WithdrawalStatus;
use earnings_ledger::ledger::LedgerError;
use rust_decimal::dec;

use WithdrawalStatus::{Completed, Pending, Processing, Rejected};

/// The transition table, exhaustively: everything outside
/// {pending->processing, pending->completed, pending->rejected,
/// processing->completed, processing->rejected} is rejected.
#[test]
fn transition_table_is_closed() {
    let all = [Pending, Processing, Completed, Rejected];
    let permitted = [
        (Pending, Processing),
        (Pending, Completed),
        (Pending, Rejected),
        (Processing, Completed),
        (Processing, Rejected),
    ];

    for from in all {
        for to in all {
            assert_eq!(
                from.can_transition_to(to),
                permitted.contains(&(from, to)),
                "{from} -> {to}"
            );
        }
    }
}

#[test]
fn terminal_states_are_terminal() {
    assert!(!Pending.is_terminal());
    assert!(!Processing.is_terminal());
    assert!(Completed.is_terminal());
    assert!(Rejected.is_terminal());
}

/// An illegal transition surfaces as `InvalidTransition` and leaves the
/// request exactly where it was.
#[tokio::test]
async fn invalid_transition_leaves_state_unchanged() {
    let ledger = ledger();
    let user = ledger.register("user-1").await;
    ledger.settle("user-1", "25.00", "42", None).await.unwrap();
    let request = ledger
        .withdrawals
        .create_request(user, dec!(25.00), "paypal".into(), "a@b.c".into())
        .await
        .unwrap();
    ledger
        .withdrawals
        .update_status(request.id, Completed, "op-1", None)
        .await
        .unwrap();

    // Terminal: no way back to pending, processing, or a re-rejection.
    for to in [Pending, Processing, Rejected] {
        let err = ledger
            .withdrawals
            .update_status(request.id, to, "op-1", Some("reason".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransition { .. }), "{to}");
    }

    let entries = ledger.withdrawals.all_requests().await.unwrap();
    assert_eq!(entries[0].status, Completed);
    // The debit happened exactly once.
    assert_eq!(
        ledger.account_of("user-1").await,
        account(dec!(0.00), dec!(25.00), dec!(25.00))
    );
}

/// Scenario: request 10.00 against balance 10.00, then a settlement lands
/// +5.00 before approval. Approval re-checks against the fresh balance and
/// succeeds: 15.00 - 10.00 = 5.00.
#[tokio::test]
async fn approval_revalidates_against_fresh_balance() {
    let ledger = ledger();
    let user = ledger.register("user-1").await;
    ledger.settle("user-1", "10.00", "42", None).await.unwrap();
    let request = ledger
        .withdrawals
        .create_request(user, dec!(10.00), "paypal".into(), "a@b.c".into())
        .await
        .unwrap();

    ledger
        .settle("user-1", "5.00", "43", None)
        .await
        .unwrap();

    ledger
        .withdrawals
        .update_status(request.id, Completed, "op-1", None)
        .await
        .unwrap();

    assert_eq!(
        ledger.account_of("user-1").await,
        account(dec!(5.00), dec!(15.00), dec!(10.00))
    );
}

/// The mirror case: the balance dropped between request and approval (an
/// earlier approval spent it). The approval aborts, the request stays in its
/// prior state, and nothing is debited for it.
#[tokio::test]
async fn approval_aborts_when_balance_dropped() {
    let ledger = ledger();
    let user = ledger.register("user-1").await;
    ledger.settle("user-1", "10.00", "42", None).await.unwrap();
    let first = ledger
        .withdrawals
        .create_request(user.clone(), dec!(8.00), "paypal".into(), "a@b.c".into())
        .await
        .unwrap();
    let second = ledger
        .withdrawals
        .create_request(user, dec!(6.00), "paypal".into(), "a@b.c".into())
        .await
        .unwrap();

    ledger
        .withdrawals
        .update_status(first.id, Completed, "op-1", None)
        .await
        .unwrap();

    let err = ledger
        .withdrawals
        .update_status(second.id, Completed, "op-1", None)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientFunds { .. }));

    // Second request is still pending and may be approved later.
    let requests = ledger.withdrawals.all_requests().await.unwrap();
    let second_now = requests.iter().find(|r| r.id == second.id).unwrap();
    assert_eq!(second_now.status, Pending);
    assert_eq!(
        ledger.account_of("user-1").await,
        account(dec!(2.00), dec!(10.00), dec!(8.00))
    );
}
