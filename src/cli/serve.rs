use anyhow::Result;
use clap::Args;

use crate::config::Config;
use crate::server::Server;

#[derive(Args)]
pub struct ServeArgs {
    /// Override the configured bind address
    #[arg(long)]
    pub bind: Option<String>,

    /// Override the configured port
    #[arg(long)]
    pub port: Option<u16>,
}

pub async fn run(args: ServeArgs, config_path: Option<&str>) -> Result<()> {
    let mut config = Config::load(config_path)?;

    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!(
        allowed_paths = config.policy.allowed_paths.len(),
        allowed_commands = config.policy.allowed_commands.len(),
        "loaded policy"
    );

    let server = Server::new(&config)?;
    server.run().await
}
