//! `globalshutdown serve` - run the relay

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use globalshutdown_relay::{OriginHasher, Relay};

use crate::config::{BackendKind, Config};

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on (overrides server.bind)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Take client addresses from X-Forwarded-For
    #[arg(long)]
    pub trust_forwarded_for: bool,

    /// Persist signals in a DuckDB file
    #[arg(long)]
    pub db: Option<PathBuf>,
}

pub fn run(args: ServeArgs, config: &Config) -> Result<()> {
    globalshutdown_core::install_signal_handlers()
        .context("Failed to install signal handlers")?;

    let policy = config.policy.to_policy()?;

    let mut store_config = config.store.clone();
    if let Some(db) = args.db {
        store_config.backend = BackendKind::DuckDb;
        store_config.path = Some(db);
    }
    let store = store_config
        .to_backend()
        .open()
        .context("Failed to open signal store")?;

    let hasher = match &config.server.origin_salt {
        Some(salt) => OriginHasher::from_salt(salt),
        None => {
            if store_config.backend == BackendKind::DuckDb && store_config.path.is_some() {
                log::warn!(
                    "No server.origin_salt set: rate limits won't count signals stored \
                     before this restart"
                );
            }
            OriginHasher::random()
        }
    };

    let mut options = config.server.http_options();
    options.trust_forwarded_for |= args.trust_forwarded_for;
    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());

    log::info!(
        "Policy: rate limit {:?}, expiry {:?}, capacity {:?}",
        policy.rate_limit.map(|r| r.max_per_origin),
        policy.expiry.map(|e| e.ttl),
        policy.capacity.map(|c| c.max_entries),
    );
    let relay = Arc::new(Relay::new(store, hasher, policy));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")?;

    runtime.block_on(async move {
        let listener = TcpListener::bind(&bind)
            .await
            .with_context(|| format!("Failed to bind {bind}"))?;

        let token = CancellationToken::new();
        let bridge = tokio::spawn({
            let token = token.clone();
            async move {
                globalshutdown_core::wait_for_shutdown().await;
                log::info!("Shutdown requested, draining connections");
                token.cancel();
            }
        });

        let result = globalshutdown_relay::serve(listener, relay, options, token).await;
        bridge.abort();
        result.context("Relay server failed")
    })
}
