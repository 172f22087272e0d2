use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use herald_core::HeraldConfig;
use tokio::sync::watch;
use tracing::{info, warn};

mod app;
mod http;

#[derive(Debug, Parser)]
#[command(name = "herald", version, about = "Scheduled social publishing service")]
struct Cli {
    /// Path to herald.toml (default: ~/.herald/herald.toml).
    #[arg(long, global = true, env = "HERALD_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API (default).
    Serve,
    /// Publish everything due right now, print the report, and exit.
    Sweep,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "herald=info,herald_scheduler=info,herald_publish=info,\
                     herald_integrations=info,tower_http=info"
                        .into()
                }),
        )
        .init();

    let cli = Cli::parse();
    let config = HeraldConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        HeraldConfig::default()
    });

    // initialize SQLite database, one file shared by all subsystems
    let db_path = config.database.path.clone();
    ensure_parent_dir(&db_path);
    info!(path = %db_path, "opening SQLite database");
    {
        let db = rusqlite::Connection::open(&db_path)?;
        db.execute_batch("PRAGMA journal_mode=WAL;")?;
    }
    let open = || -> rusqlite::Result<rusqlite::Connection> {
        let conn = rusqlite::Connection::open(&db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    };

    let state = Arc::new(app::AppState::build(config, open)?);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state).await,
        Command::Sweep => {
            let report = state.scheduler.process_due(Utc::now()).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

async fn serve(state: Arc<app::AppState>) -> anyhow::Result<()> {
    let addr: SocketAddr =
        format!("{}:{}", state.config.server.bind, state.config.server.port).parse()?;
    let router = app::build_router(state.clone());

    // built-in trigger, for deployments without an external cron
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    if let Some(secs) = state.config.scheduler.sweep_interval_secs {
        let state = Arc::clone(&state);
        let every = Duration::from_secs(secs.max(1));
        tokio::spawn(async move { run_sweeps(state, every, shutdown_rx).await });
        info!(interval_secs = secs, "in-process sweep trigger enabled");
    }

    info!("Herald listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    // stop the sweep loop
    let _ = shutdown_tx.send(true);
    Ok(())
}

async fn run_sweeps(
    state: Arc<app::AppState>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = state.scheduler.process_due(Utc::now()).await {
                    warn!(error = %e, "scheduled sweep failed");
                }
            }
            _ = shutdown.changed() => {
                info!("sweep loop shutting down");
                break;
            }
        }
    }
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
