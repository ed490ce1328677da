use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use schedsim::{Config, Simulation, api};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(version, about = "Adaptive scheduler and memory simulator")]
struct Args {
    /// Path to a TOML config file (defaults to $SCHEDSIM_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to serve the HTTP API on
    #[arg(long)]
    listen: Option<String>,

    /// Seed the simulation for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Start ticking immediately
    #[arg(long)]
    autostart: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(listen) = args.listen {
        config.server.listen_addr = listen;
    }
    if args.seed.is_some() {
        config.simulation.seed = args.seed;
    }
    config.simulation.autostart |= args.autostart;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    let sim = Arc::new(Simulation::new(&config.simulation));
    if config.simulation.autostart {
        sim.start();
    }

    let listener = tokio::net::TcpListener::bind(&config.server.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.server.listen_addr))?;
    info!("[api] listening on {}", config.server.listen_addr);

    let shutdown_sim = Arc::clone(&sim);
    axum::serve(listener, api::router(sim))
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
            shutdown_sim.stop();
        })
        .await
        .context("serving HTTP API")?;

    Ok(())
}
