//! Earnings ledger core for an affiliate/microtask platform.
//!
//! Credits balances when a partner confirms a conversion, debits them when an
//! operator approves a withdrawal, and guarantees that repeated partner
//! deliveries credit exactly once, that balances never go negative, and that
//! every balance change has a matching ledger entry.

pub mod commission;
pub mod config;
pub mod domain;
pub mod feed;
pub mod ledger;
pub mod notify;
pub mod server;
pub mod store;
