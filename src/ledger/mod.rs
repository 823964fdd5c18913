//! The ledger core: conversion settlement and the withdrawal lifecycle.
//!
//! These two services are the only writers of account balances. Both go
//! through [`crate::store::AccountStore`] with optimistic concurrency, append
//! a ledger entry in the same store transaction as the balance mutation, and
//! publish side effects (feed, notifications) only after the commit.

pub mod errors;
pub mod settlement;
pub mod withdrawal;

pub use errors::LedgerError;
pub use settlement::{Settled, SettlementService};
pub use withdrawal::WithdrawalManager;
