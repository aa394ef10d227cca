mod cli;

use axum::Router;
use backend::AppState;
use backend::rate_limit::RateLimiter;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
    let cli = cli::Cli::parse();

    let database = cli.database_config();
    let db = database.connect().await?;
    tracing::info!(backend = database.kind(), capabilities = ?db.capabilities(), "Storage ready");

    let limiter = Arc::new(RateLimiter::new(cli.rate_limit_config()));
    if let Some(period) = cli.sweep_interval() {
        let limiter = limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let evicted = limiter.evict_idle();
                if evicted > 0 {
                    tracing::debug!(evicted, "Evicted idle rate limit clients");
                }
            }
        });
    }

    let router = backend::init(Router::new(), AppState::new(db, limiter));
    let addr = SocketAddr::new(cli.host, cli.port);
    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;
    Ok(())
}
