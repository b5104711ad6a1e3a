use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "disttl")]
#[command(about = "disttl CLI: publish and observe distributed cache invalidation signals")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to ./disttl.toml when present)
    #[arg(short, long, global = true, env = "DISTTL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Signal scope (overrides cache.scope)
    #[arg(short, long, global = true)]
    pub scope: Option<String>,

    /// Redis URL (overrides redis.url)
    #[arg(long, global = true, env = "DISTTL_REDIS_URL")]
    pub redis_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Publish an invalidation signal for one or more tags
    Signal(SignalArgs),
    /// Print every signal published on the scope
    Watch(WatchArgs),
    /// Run a cache node that applies signals and reports its size
    Demo(DemoArgs),
}

#[derive(clap::Args)]
pub struct SignalArgs {
    /// Tags to invalidate
    #[arg(required = true)]
    pub tags: Vec<String>,
}

#[derive(clap::Args)]
pub struct WatchArgs {
    /// Exit after this many signals
    #[arg(short = 'n', long)]
    pub count: Option<usize>,
}

#[derive(clap::Args)]
pub struct DemoArgs {
    /// Seconds between cache size reports
    #[arg(long, default_value_t = 30)]
    pub report_interval_secs: u64,
}
