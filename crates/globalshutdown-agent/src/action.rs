//! What the agent does when a signal arrives

use std::process::Command;

use anyhow::{Context, Result, bail};

/// The destructive step. Runs at most once per delivered signal.
pub trait ShutdownAction {
    fn execute(&self) -> Result<()>;
}

/// Platform default shutdown command line.
pub fn default_command() -> Vec<String> {
    if cfg!(windows) {
        vec![
            r"C:\Windows\System32\shutdown.exe".to_string(),
            "/s".to_string(),
            "/f".to_string(),
            "/t".to_string(),
            "0".to_string(),
        ]
    } else {
        vec!["shutdown".to_string(), "-h".to_string(), "now".to_string()]
    }
}

/// Run an external program.
#[derive(Debug, Clone)]
pub struct CommandAction {
    program: String,
    args: Vec<String>,
}

impl CommandAction {
    /// `argv[0]` is the program, the rest its arguments.
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let Some((program, args)) = argv.split_first() else {
            bail!("shutdown command is empty");
        };
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl ShutdownAction for CommandAction {
    fn execute(&self) -> Result<()> {
        log::warn!("Running shutdown command: {} {}", self.program, self.args.join(" "));
        let status = Command::new(&self.program)
            .args(&self.args)
            .status()
            .with_context(|| format!("Failed to run {}", self.program))?;
        if !status.success() {
            bail!("{} exited with {status}", self.program);
        }
        Ok(())
    }
}

/// Log instead of shutting down.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunAction;

impl ShutdownAction for DryRunAction {
    fn execute(&self) -> Result<()> {
        log::warn!("Shutdown signal received (dry run, not shutting down)");
        Ok(())
    }
}
