//! `globalshutdown id` - print this machine's identity

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use globalshutdown_agent::identity_file;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct IdArgs {
    /// Identity file (overrides agent.id_file)
    #[arg(long)]
    pub id_file: Option<PathBuf>,
}

pub fn run(args: IdArgs, config: &Config) -> Result<()> {
    let path = args.id_file.unwrap_or_else(|| config.agent.id_file.clone());
    let identity = identity_file::load_or_create(&path)?;
    // stdout so it can be piped; everything else goes to stderr
    println!("{identity}");
    Ok(())
}
