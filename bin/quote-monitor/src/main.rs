use analytics::TokenAnalyzer;
use anyhow::Result;
use clap::Parser;
use common::{ExchangeId, PriceLedger};
use config::MonitorConfig;
use detector::ArbitrageAnalyzer;
use quote_ingestor::{
    load_archive, ArchiveWriter, OrderBookProvider, ReplayProvider, StreamState,
    StreamSupervisor, SupervisorSettings,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Command line arguments for quote-monitor.
#[derive(Parser, Debug)]
struct Args {
    /// Path to the monitor configuration YAML
    #[arg(long, default_value = "config/monitor.yml")]
    config: String,
    /// Recorded quote archive to replay as the data source. Defaults to the
    /// configured archive file.
    #[arg(long)]
    replay: Option<String>,
    /// Replay pacing relative to the recorded timestamps (1.0 = real time,
    /// 0 = as fast as possible)
    #[arg(long, default_value_t = 1.0)]
    replay_speed: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    // Load and validate configuration
    let cfg = MonitorConfig::load(&args.config)?;
    cfg.validate()?;

    let ledger = Arc::new(PriceLedger::new());

    // When replaying a separate recording, the configured archive still
    // seeds the ledger so the arbitrage backfill covers prior sessions.
    // When the archive itself is the source, seeding would double-count.
    let replay_path = args
        .replay
        .clone()
        .unwrap_or_else(|| cfg.exchanges.archive_file.clone());
    if replay_path != cfg.exchanges.archive_file {
        let seeded = load_archive(&cfg.exchanges.archive_file);
        if !seeded.is_empty() {
            info!(count = seeded.len(), "Seeded ledger from quote archive");
            ledger.extend(seeded);
        }
    }

    let provider: Arc<dyn OrderBookProvider> =
        Arc::new(ReplayProvider::from_archive(&replay_path, args.replay_speed)?);
    info!(path = %replay_path, speed = args.replay_speed, "Replaying recorded quotes");

    let exchanges: Vec<ExchangeId> = cfg
        .exchanges
        .list
        .iter()
        .map(|name| ExchangeId::from(name.as_str()))
        .collect();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Stream supervision: one task per (exchange, symbol) pair
    let supervisor = Arc::new(StreamSupervisor::new(
        provider,
        ledger.clone(),
        ArchiveWriter::new(cfg.exchanges.archive_file.clone()),
        SupervisorSettings {
            reconnect_interval: Duration::from_secs(cfg.exchanges.reconnect_interval_secs),
            max_reconnect_attempts: cfg.exchanges.max_reconnect_attempts,
        },
    ));
    let stream_handles = supervisor.spawn_all(
        &exchanges,
        &cfg.symbols.spot,
        &cfg.symbols.future,
        shutdown_rx.clone(),
    );

    // Analysis tasks over the shared ledger
    let arbitrage = ArbitrageAnalyzer::new(
        ledger.clone(),
        cfg.symbols.future.clone(),
        cfg.arbitrage.clone(),
    );
    let arbitrage_handle = tokio::spawn(arbitrage.run(shutdown_rx.clone()));

    let tokens = TokenAnalyzer::new(ledger.clone(), cfg.tokens.clone());
    let tokens_handle = tokio::spawn(tokens.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    // Graceful shutdown
    shutdown_tx.send(true).ok();
    supervisor.close_all(&exchanges).await;

    for handle in stream_handles {
        match handle.await {
            Ok(StreamState::Failed) => warn!("A stream pair stopped after exhausting retries"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Stream task panicked"),
        }
    }
    arbitrage_handle.await.expect("arbitrage task panicked");
    tokens_handle.await.expect("token analyzer task panicked");

    info!("Quote monitor stopped");
    Ok(())
}
