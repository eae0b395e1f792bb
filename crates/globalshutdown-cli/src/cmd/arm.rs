//! `globalshutdown arm` - trigger a shutdown for a machine

use anyhow::{Context, Result, bail};
use clap::Args;

use globalshutdown_agent::RelayClient;
use globalshutdown_core::Identity;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct ArmArgs {
    /// Identity of the machine to shut down (as printed by `globalshutdown id`)
    pub id: String,

    /// Relay base URL (overrides agent.server_url)
    #[arg(short, long)]
    pub server_url: Option<String>,
}

pub fn run(args: ArmArgs, config: &Config) -> Result<()> {
    let identity = Identity::parse(args.id.trim())
        .with_context(|| format!("Not a valid identity: {:?}", args.id))?;
    let url = args
        .server_url
        .unwrap_or_else(|| config.agent.server_url.clone());
    let client = RelayClient::new(&url);

    match client.arm(&identity) {
        Ok(()) => {
            eprintln!(
                "Shutdown armed for {identity}; it fires on the machine's next poll."
            );
            Ok(())
        }
        Err(e) if e.status() == Some(429) => {
            bail!("Relay refused: too many shutdowns armed from this address, try again later")
        }
        Err(e) => Err(e).with_context(|| format!("Failed to arm shutdown via {url}")),
    }
}
