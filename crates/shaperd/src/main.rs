//! Traffic shaper control-plane daemon
//!
//! Binds the HTTP control surface and wires it to the shaping engine.
//! Shaping state lives in process memory only; a restart starts over
//! disabled.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn, Level};

use shaper_api::AppState;
use shaper_core::{ProcessRunner, Shaper, ShapingLimits, SysClassNet};
use shaper_netinfo::resources;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8000)]
    port: u16,

    /// Maximum configurable packet delay in milliseconds
    #[arg(long, env = "MAX_DELAY_MS", default_value_t = 10_000)]
    max_delay_ms: u32,

    /// Minimum configurable bandwidth limit in Mbps
    #[arg(long, env = "MIN_BANDWIDTH_MBPS", default_value_t = 0.1)]
    min_bandwidth_mbps: f64,

    /// Bandwidth in Mbps treated as "unlimited"
    #[arg(long, env = "MAX_BANDWIDTH_MBPS", default_value_t = 1000.0)]
    max_bandwidth_mbps: f64,

    /// Skip the root-privilege startup warning
    #[arg(long, env = "SKIP_ROOT_CHECK")]
    skip_root_check: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let runner: Arc<ProcessRunner> = Arc::new(ProcessRunner::new());

    // traffic control needs CAP_NET_ADMIN; warn early rather than failing
    // on the first apply
    if !cli.skip_root_check && !resources::has_root_privileges() {
        warn!("not running as root; traffic control operations will fail");
    }
    if !resources::tc_available(runner.as_ref()).await {
        error!("'tc' command not found; install the iproute2 package");
    }

    let limits = ShapingLimits {
        max_delay_ms: cli.max_delay_ms,
        min_bandwidth_mbps: cli.min_bandwidth_mbps,
        max_bandwidth_mbps: cli.max_bandwidth_mbps,
    };
    let shaper = Arc::new(Shaper::new(runner.clone(), Arc::new(SysClassNet), limits));
    let app = shaper_api::router(AppState::new(shaper, runner));

    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on {addr}");
    axum::serve(listener, app)
        .await
        .context("server terminated")?;

    Ok(())
}
