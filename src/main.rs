use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use earnings_ledger::config::Config;
use earnings_ledger::feed::LedgerFeed;
use earnings_ledger::ledger::{SettlementService, WithdrawalManager};
use earnings_ledger::notify::{LogNotifier, Notifier};
use earnings_ledger::server::{self, AppState};
use earnings_ledger::store::{AccountStore, InMemoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Arguments::parse();
    if let Some(log_level) = args.log_level {
        tracing_subscriber::fmt().with_max_level(log_level).init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
    }

    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    let store: Arc<dyn AccountStore> = Arc::new(InMemoryStore::new());
    let feed = LedgerFeed::new();
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
    let settlement = SettlementService::new(store.clone(), feed.clone(), notifier.clone())
        .with_max_commit_attempts(config.ledger.max_commit_attempts);
    let withdrawals = WithdrawalManager::new(store, feed, notifier)
        .with_max_commit_attempts(config.ledger.max_commit_attempts);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let state = AppState {
        settlement: Arc::new(settlement),
        withdrawals: Arc::new(withdrawals),
        config: Arc::new(config),
    };
    server::serve(addr, state).await
}

#[derive(Parser)]
struct Arguments {
    /// Path to a JSON config file; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    log_level: Option<tracing::Level>,
}
