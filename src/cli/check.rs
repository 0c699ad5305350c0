use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::Path;

use crate::config::Config;
use crate::policy::Policy;

#[derive(Args)]
pub struct CheckArgs {
    #[command(subcommand)]
    pub command: CheckCommands,
}

#[derive(Subcommand)]
pub enum CheckCommands {
    /// Would this path be allowed?
    Path {
        /// Path to evaluate
        path: String,
    },

    /// Would this command line be allowed?
    Command {
        /// Command line to evaluate (only the first token is checked)
        command: String,
    },
}

/// Dry-run the policy from the command line. Exits non-zero on deny so the
/// result is scriptable.
pub fn run(args: CheckArgs, config_path: Option<&str>) -> Result<()> {
    let config = Config::load(config_path)?;
    let policy = Policy::from_config(&config.policy);

    let allowed = match args.command {
        CheckCommands::Path { path } => {
            let allowed = policy.is_path_allowed(Path::new(&path));
            println!("path {}: {}", path, verdict(allowed));
            allowed
        }
        CheckCommands::Command { command } => {
            let allowed = policy.is_command_allowed(&command);
            println!("command {:?}: {}", command, verdict(allowed));
            allowed
        }
    };

    if !allowed {
        std::process::exit(1);
    }
    Ok(())
}

fn verdict(allowed: bool) -> &'static str {
    if allowed { "allowed" } else { "denied" }
}
