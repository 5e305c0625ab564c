//! steward-daemon - DAO operations steward
//!
//! Long-running daemon that keeps a DAO's work-tracking board, its
//! on-chain treasury, and its off-chain governance system consistent.
//! Issue lifecycle webhooks drive treasury payouts and governance
//! proposals; a periodic reconciliation pass writes concluded vote
//! results back onto the board.
//!
//! Startup is fail-closed: the webhook secret, board token, and the
//! initial configuration snapshot must all resolve before the server
//! binds. After startup, configuration refresh failures degrade to the
//! last good snapshot instead of taking the daemon down.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use secrecy::SecretString;
use steward_core::AppContext;
use steward_core::config::ConfigHandle;
use steward_daemon::config_source::HttpConfigSource;
use steward_daemon::github::GithubBoard;
use steward_daemon::loops::{spawn_config_refresh, spawn_reconcile_loop};
use steward_daemon::server::{ServerState, router};
use steward_daemon::settings::{DaemonSettings, secret_from_env};
use steward_daemon::snapshot_hub::SnapshotHub;
use steward_daemon::treasury_rpc::JsonRpcTreasury;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Parser)]
#[command(name = "steward-daemon", about = "DAO operations steward", version)]
struct Args {
    /// Path to the daemon settings file.
    #[arg(long, default_value = "steward.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let settings = DaemonSettings::from_file(&args.config)
        .with_context(|| format!("loading settings from {}", args.config.display()))?;

    let webhook_secret = Arc::new(secret_from_env(&settings.webhook.secret_env)?);
    let board_token: SecretString = secret_from_env(&settings.board.token_env)?;

    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(15))
        .timeout(Duration::from_secs(60))
        .build()
        .context("building HTTP client")?;

    let config_source = HttpConfigSource::new(http.clone(), &settings.config_source);
    let initial = config_source
        .load()
        .await
        .context("loading initial DAO configuration")?;
    info!(
        org = %initial.board.org,
        project = initial.board.project_number,
        space = %initial.space,
        "initial DAO configuration loaded"
    );
    let config = Arc::new(ConfigHandle::new(initial));

    let board = Arc::new(GithubBoard::new(
        http.clone(),
        settings.board.graphql_url.clone(),
        settings.board.rest_url.clone(),
        board_token,
    ));
    let treasury = Arc::new(JsonRpcTreasury::new(
        http.clone(),
        settings.treasury.rpc_url.clone(),
        settings.treasury.from_address.clone(),
        Arc::clone(&config),
    ));
    let governance = Arc::new(SnapshotHub::new(
        http.clone(),
        settings.governance.hub_url.clone(),
        settings.governance.ipfs_gateway_url.clone(),
        settings.governance.author_address.clone(),
        Arc::clone(&config),
    ));

    let ctx = AppContext::new(Arc::clone(&config), board, treasury, governance);

    let refresh_task = spawn_config_refresh(
        config_source,
        Arc::clone(&config),
        settings.config_source.refresh_secs,
    );
    let reconcile_task = spawn_reconcile_loop(ctx.clone(), settings.reconcile.interval_secs);

    let app = router(ServerState {
        ctx,
        webhook_secret,
    });
    let listener = tokio::net::TcpListener::bind(&settings.server.listen)
        .await
        .with_context(|| format!("binding {}", settings.server.listen))?;
    info!(listen = %settings.server.listen, "steward daemon listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    refresh_task.abort();
    reconcile_task.abort();
    info!("steward daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    // Ctrl-C or SIGTERM, whichever arrives first.
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(_) => {
                let _ = ctrl_c.await;
                return;
            },
        };
        tokio::select! {
            _ = ctrl_c => {},
            _ = term.recv() => {},
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
