//! `globalshutdown agent` - poll the relay from this machine

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use globalshutdown_agent::{
    CommandAction, DryRunAction, Poller, RelayClient, ShutdownAction, identity_file,
};
use globalshutdown_core::Identity;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct AgentArgs {
    /// Relay base URL (overrides agent.server_url)
    #[arg(short, long)]
    pub server_url: Option<String>,

    /// Identity file (overrides agent.id_file)
    #[arg(long)]
    pub id_file: Option<PathBuf>,

    /// Seconds between polls (overrides agent.poll_interval_secs)
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// Log instead of shutting down
    #[arg(long)]
    pub dry_run: bool,

    /// Poll once and exit
    #[arg(long)]
    pub once: bool,
}

pub fn run(args: AgentArgs, config: &Config) -> Result<()> {
    globalshutdown_core::install_signal_handlers()
        .context("Failed to install signal handlers")?;

    let mut agent = config.agent.clone();
    if let Some(url) = args.server_url {
        agent.server_url = url;
    }
    if let Some(path) = args.id_file {
        agent.id_file = path;
    }
    if let Some(secs) = args.interval {
        agent.poll_interval_secs = secs;
    }
    agent.dry_run |= args.dry_run;

    let identity = identity_file::load_or_create(&agent.id_file)?;
    let interval = agent.poll_interval()?;
    let client = RelayClient::new(&agent.server_url);
    log::info!("Agent for {} polling {}", identity.short(), client.base_url());

    if agent.dry_run {
        drive(client, DryRunAction, identity, interval, args.once);
    } else {
        let action = CommandAction::from_argv(&agent.shutdown_argv())
            .context("Invalid agent.shutdown_command")?;
        drive(client, action, identity, interval, args.once);
    }
    Ok(())
}

fn drive<A: ShutdownAction>(
    client: RelayClient,
    action: A,
    identity: Identity,
    interval: Duration,
    once: bool,
) {
    let poller = Poller::new(client, action, identity, interval);
    if once {
        let outcome = poller.poll_once();
        log::info!("Poll result: {outcome:?}");
    } else {
        poller.run();
        log::info!("Agent stopped");
    }
}
