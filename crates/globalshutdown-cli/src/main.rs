//! globalshutdown - Remote shutdown relay and agent
//!
//! `serve` runs the relay, `agent` polls it from the machine to be shut down,
//! `arm` triggers a shutdown for a machine identity.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "globalshutdown")]
#[command(about = "Remote shutdown relay and agent")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file path (default: ./globalshutdown.toml or ~/.config/globalshutdown/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the relay server
    Serve(cmd::serve::ServeArgs),
    /// Poll the relay and shut this machine down when signalled
    Agent(cmd::agent::AgentArgs),
    /// Arm a shutdown for a machine identity
    Arm(cmd::arm::ArmArgs),
    /// Print this machine's identity (creating it if needed)
    Id(cmd::id::IdArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    globalshutdown_core::init_logging(cli.quiet, cli.debug);

    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Serve(args) => cmd::serve::run(args, &config),
        Command::Agent(args) => cmd::agent::run(args, &config),
        Command::Arm(args) => cmd::arm::run(args, &config),
        Command::Id(args) => cmd::id::run(args, &config),
        Command::Config => {
            cmd::show_config(&config);
            Ok(())
        }
    }
}
