pub mod routes;
pub mod state;

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

#[derive(Debug, Parser)]
#[command(version, rename_all = "kebab")]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = plateful_config::load(&args.config)?;
	init_tracing(&config)?;
	let http_addr: SocketAddr = config.service.http_bind.parse()?;
	let state = AppState::new(config)?;

	spawn_eviction(&state);

	let app = routes::router(state);
	let listener = TcpListener::bind(http_addr).await?;

	tracing::info!(%http_addr, "HTTP server listening.");
	axum::serve(listener, app).await?;
	Ok(())
}

fn init_tracing(config: &plateful_config::Config) -> color_eyre::Result<()> {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
	tracing_subscriber::fmt().with_env_filter(filter).init();
	Ok(())
}

/// Periodic sweep that drops conversations idle past the configured TTL.
fn spawn_eviction(state: &AppState) {
	let service = state.service.clone();
	let ttl = Duration::from_secs(service.cfg.agent.idle_ttl_secs);
	let period = ttl.min(Duration::from_secs(60));

	tokio::spawn(async move {
		let mut ticker = tokio::time::interval(period);

		loop {
			ticker.tick().await;

			let evicted = service.conversations.evict_idle(ttl);

			if evicted > 0 {
				tracing::debug!(evicted, "Dropped idle conversations.");
			}
		}
	});
}
