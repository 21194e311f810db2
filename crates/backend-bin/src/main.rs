// ============================
// crates/backend-bin/src/main.rs
// ============================
//! Tokio / Axum entry-point for the Pinboard backend.
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use backend_lib::{
    config::{load_settings, Settings},
    create_router,
    storage::FlatFileUserStore,
    AppState,
};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "pinboard-backend", about = "Pinboard HTTP backend")]
struct Args {
    /// TOML configuration file; `PINBOARD_*` variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides `server.host` and `server.port`
    #[arg(short, long)]
    bind: Option<String>,
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log.level.clone()));
    let registry = tracing_subscriber::registry().with(filter);
    if settings.log.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // without a signal handler, run until killed
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let path = args.config.unwrap_or_else(|| PathBuf::from("config.toml"));
    let settings = load_settings(Some(path.as_path())).context("loading configuration")?;
    init_tracing(&settings);

    let addr: SocketAddr = match &args.bind {
        Some(bind) => bind.parse::<SocketAddr>().context("parsing --bind")?,
        None => settings.bind_addr()?,
    };

    let users = Arc::new(FlatFileUserStore::new(&settings.server.data_dir)?);
    let sweep_every = Duration::from_secs(settings.session.cleanup_interval_secs.max(1));
    let state = AppState::new(users, settings)?;
    let sweeper = state.sessions.spawn_cleanup(sweep_every);

    let app = create_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    Ok(())
}
