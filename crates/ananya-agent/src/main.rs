//! # ananya-agent
//!
//! Ananya bot binary: wires the store, model, chat engine, broadcast
//! dispatcher, Telegram poller, and admin server, then runs until Ctrl-C.

#![deny(unsafe_code)]

mod provider_factory;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ananya_core::logging::{LogFormat, init_subscriber};
use ananya_runtime::{AdminService, BroadcastConfig, BroadcastDispatcher, ChatEngine, DeliveryLedger, EngineConfig};
use ananya_server::platform::telegram::{Poller, TelegramClient, TelegramTransport};
use ananya_server::shutdown::DEFAULT_DRAIN_TIMEOUT;
use ananya_server::{AdminServer, ShutdownCoordinator};
use ananya_settings::{AnanyaSettings, init_settings, load_settings_from_path, settings_dir, settings_path};
use ananya_store::SqliteStore;
use ananya_store::sqlite::ConnectionConfig;
use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// How long running broadcasts get to record their cancelled recipients.
const BROADCAST_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Ananya Telegram bot.
#[derive(Parser, Debug)]
#[command(name = "ananya", about = "Ananya Telegram chat bot")]
struct Cli {
    /// Path to `settings.json` (defaults to `~/.ananya/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Admin server port (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the `SQLite` database (overrides settings).
    #[arg(long)]
    db: Option<PathBuf>,

    /// Log level filter, e.g. `info` or `ananya_runtime=debug` (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Fold command-line overrides into `settings`.
    fn apply(&self, settings: &mut AnanyaSettings) {
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        if let Some(db) = &self.db {
            settings.storage.db_path = Some(db.to_string_lossy().into_owned());
        }
    }
}

fn db_path(settings: &AnanyaSettings) -> PathBuf {
    settings
        .storage
        .db_path
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .map_or_else(|| settings_dir().join("ananya.db"), PathBuf::from)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let path = args.settings.clone().unwrap_or_else(settings_path);
    let mut settings = load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    args.apply(&mut settings);
    init_settings(settings.clone());

    let format = if settings.logging.json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    init_subscriber(&settings.logging.level, format);
    let metrics = ananya_server::metrics::install_recorder();

    // Store
    let db_path = db_path(&settings);
    let store = Arc::new(SqliteStore::open(&db_path, &ConnectionConfig::default()).context("Failed to open database")?);

    // Backends
    let model = provider_factory::language_model(&settings)?;
    let transcriber = provider_factory::transcriber(&settings)?;
    let telegram = Arc::new(TelegramClient::from_settings(&settings.telegram).context("Failed to build Telegram client")?);
    let transport = Arc::new(TelegramTransport::new(telegram.clone()));

    // Engine
    let mut engine = ChatEngine::new(store.clone(), model, transport.clone(), EngineConfig::from(&settings));
    if let Some(stt) = transcriber {
        engine = engine.with_transcriber(stt, Duration::from_millis(settings.transcription.timeout_ms));
    }
    let personalities = engine
        .resolver()
        .verify_catalog()
        .await
        .context("Personality catalog is unusable")?;
    info!(personalities, "personality catalog verified");
    let engine = Arc::new(engine);

    // Broadcasts
    let ledger = Arc::new(DeliveryLedger::with_archive(store.clone()));
    let restored = ledger.preload().await;
    let dispatcher = Arc::new(BroadcastDispatcher::new(
        transport,
        BroadcastConfig::from(&settings.broadcast),
        ledger,
    ));
    let admin = Arc::new(
        AdminService::new(store.clone(), dispatcher.clone())
            .with_archive(store)
            .with_engine(Arc::clone(&engine)),
    );
    info!(restored, "broadcast ledger loaded");

    // Tasks
    let shutdown = ShutdownCoordinator::new();
    let server = AdminServer::new(&settings.server, admin).with_metrics(metrics);
    let addr = server.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let token = shutdown.token();
    shutdown.spawn("admin-server", async move {
        if let Err(e) = server.serve(listener, token).await {
            error!(error = %e, "admin server failed");
        }
    });
    let poller = Poller::new(telegram, engine, settings.telegram.poll_timeout_secs);
    shutdown.spawn("telegram-poller", poller.run(shutdown.token()));

    info!(%addr, "Ananya is running");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    info!("Shutting down...");
    shutdown.shutdown(DEFAULT_DRAIN_TIMEOUT).await;
    drain_broadcasts(&dispatcher).await;
    info!("Shutdown complete");
    Ok(())
}

/// Cancel running broadcasts and wait for them to archive.
async fn drain_broadcasts(dispatcher: &BroadcastDispatcher) {
    let jobs: Vec<_> = dispatcher
        .running()
        .into_iter()
        .filter_map(|snapshot| dispatcher.job(&snapshot.id))
        .collect();
    if jobs.is_empty() {
        return;
    }
    info!(jobs = jobs.len(), "cancelling running broadcasts");
    for job in &jobs {
        job.cancel();
    }
    let wait_all = async {
        for job in &jobs {
            job.wait().await;
        }
    };
    if tokio::time::timeout(BROADCAST_DRAIN_TIMEOUT, wait_all).await.is_err() {
        warn!("broadcasts did not finish before exit");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_are_empty() {
        let cli = Cli::parse_from(["ananya"]);
        assert!(cli.settings.is_none());
        assert!(cli.port.is_none());
        assert!(cli.db.is_none());
        assert!(cli.log_level.is_none());
    }

    #[test]
    fn cli_overrides_settings() {
        let cli = Cli::parse_from([
            "ananya",
            "--port",
            "9100",
            "--db",
            "/tmp/ananya-test.db",
            "--log-level",
            "debug",
            "--settings",
            "/etc/ananya/settings.json",
        ]);
        assert_eq!(cli.settings, Some(PathBuf::from("/etc/ananya/settings.json")));

        let mut settings = AnanyaSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(db_path(&settings), PathBuf::from("/tmp/ananya-test.db"));
    }

    #[test]
    fn cli_rejects_bad_port() {
        assert!(Cli::try_parse_from(["ananya", "--port", "99999"]).is_err());
    }

    #[test]
    fn default_db_lives_in_settings_dir() {
        let settings = AnanyaSettings::default();
        let path = db_path(&settings);
        assert!(path.ends_with("ananya.db"));
    }

    #[test]
    fn settings_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"port": 9300}, "broadcast": {"workers": 4}}"#).unwrap();
        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.broadcast.workers, 4);
        let config = BroadcastConfig::from(&settings.broadcast);
        assert_eq!(config.workers, 4);
    }
}
