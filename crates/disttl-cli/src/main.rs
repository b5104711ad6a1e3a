use std::sync::Arc;

use anyhow::{Result, anyhow};
use clap::Parser;

use disttl::InvalidationTransport;
use disttl_cli::cli::{Cli, Commands};
use disttl_cli::commands;
use disttl_cli::config::loader::load_config;
use disttl_cli::init_tracing_with_level;
use disttl_cli::output::print_error;
use disttl_redis::RedisTransport;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref()).map_err(|e| anyhow!(e))?;
    if let Some(scope) = &cli.scope {
        config.cache.scope = scope.clone();
    }
    if let Some(url) = &cli.redis_url {
        config.redis.url = url.clone();
    }

    init_tracing_with_level(&config.logging.level);

    let transport: Arc<dyn InvalidationTransport> =
        Arc::new(RedisTransport::connect(&config.redis).await?);

    match &cli.command {
        Commands::Signal(args) => commands::signal(&config, transport, args).await?,
        Commands::Watch(args) => commands::watch(&config, transport, args).await?,
        Commands::Demo(args) => commands::demo(&config, transport, args).await?,
    }

    Ok(())
}
