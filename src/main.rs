//! Intraday Signal Engine - Main Entry Point
//!
//! Advisory signal generation only: every trade decision stays with the
//! operator, who confirms fills on stdin.

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use intraday_signal_engine::advisory::{self, AdvisoryCache, HttpAdvisorySource};
use intraday_signal_engine::config::Config;
use intraday_signal_engine::engine::ScanEngine;
use intraday_signal_engine::feed::{self, ReferenceClient, TickFeed};
use intraday_signal_engine::market::MarketDataStore;
use intraday_signal_engine::notify::LogNotifier;
use intraday_signal_engine::persistence::{self, PersistenceManager};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

const DEFAULT_DB: &str = "data/signals.db";

/// Intraday Signal Engine CLI
#[derive(Parser)]
#[command(name = "intraday-signal-engine")]
#[command(version, about = "Real-time intraday equity signal scanner")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the persisted session audit trail
    Status {
        /// Path to SQLite database
        #[arg(short, long, default_value = DEFAULT_DB)]
        db: String,

        /// Show recent signals, not just the totals
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load .env before config so env overrides are visible
    dotenvy::dotenv().ok();

    init_logging()?;

    if let Some(Commands::Status { db, verbose }) = cli.command {
        return show_status(&db, verbose);
    }

    info!("╔════════════════════════════════════════════════════════════╗");
    info!(
        "║       Intraday Signal Engine v{} - Advisory Mode        ║",
        env!("CARGO_PKG_VERSION")
    );
    info!("╚════════════════════════════════════════════════════════════╝");

    let config = Config::load()?;
    config.validate()?;
    log_config(&config);

    std::fs::create_dir_all("data")?;
    let manager = PersistenceManager::new(DEFAULT_DB)?;

    let store = Arc::new(MarketDataStore::new(config.session.candle_width_minutes));
    let advisory_cache = Arc::new(AdvisoryCache::new());

    // Sink task: owns the database connection and the notifier.
    let (sink_tx, sink_rx) = mpsc::unbounded_channel();
    tokio::spawn(persistence::run_sink(
        sink_rx,
        manager,
        Box::new(LogNotifier),
    ));

    // Advisory refresh task, independent of the scan cadence.
    if config.advisory.enabled && !config.advisory.url.is_empty() {
        tokio::spawn(advisory::run_refresh(
            advisory_cache.clone(),
            Box::new(HttpAdvisorySource::new(config.advisory.url.clone())),
            config.advisory.refresh_secs,
        ));
        info!("📰 Advisory overlay enabled: {}", config.advisory.url);
    } else {
        info!("📰 Advisory overlay disabled");
    }

    // Previous-session reference data. A failed fetch degrades the gap
    // strategy (unseeded symbols are skipped) but does not stop the engine.
    let reference = ReferenceClient::new(config.feed.reference_url.clone());
    match reference.seed(&store, &config.universe.symbols).await {
        Ok(seeded) => info!("📚 [INIT] {} historical references seeded", seeded),
        Err(e) => warn!("⚠️  [INIT] Reference data fetch failed: {e:#}"),
    }

    // Shutdown signal
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Shutdown signal received");
        shutdown_clone.store(true, Ordering::SeqCst);
    });

    // Feed producer task.
    tokio::spawn(feed::run_feed(
        TickFeed::new(config.feed.ws_url.clone()),
        store.clone(),
        config.universe.symbols.clone(),
        config.session.utc_offset_minutes as i64,
        shutdown.clone(),
    ));

    // Operator confirmations arrive as signal ids on stdin.
    let (confirm_tx, mut confirm_rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let id = line.trim();
            if !id.is_empty() && confirm_tx.send(id.to_string()).is_err() {
                return;
            }
        }
    });

    let mut engine = ScanEngine::new(&config, store, advisory_cache, sink_tx);

    info!("🚀 Starting scan loop...");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut interval = tokio::time::interval(Duration::from_secs(1));
    while !shutdown.load(Ordering::SeqCst) {
        interval.tick().await;

        while let Ok(id) = confirm_rx.try_recv() {
            match engine.confirm(&id, Utc::now()) {
                Ok(()) => info!("✅ Position confirmed: {id}"),
                Err(e) => warn!("⚠️  Confirmation rejected: {e}"),
            }
        }

        if let Err(e) = engine.run_cycle(Utc::now()) {
            error!("❌ Scan cycle failed: {e:#}");
        }
    }

    info!("👋 Intraday Signal Engine shutdown complete");
    Ok(())
}

/// Initialize comprehensive logging with file output.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "signal-engine.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(_guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("intraday_signal_engine=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(true)
        .init();

    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config) {
    info!("📋 Configuration:");
    info!("   Universe: {} symbols", config.universe.symbols.len());
    info!(
        "   Session: {} - {} (square-off {})",
        config.session.open, config.session.close, config.session.square_off
    );
    info!(
        "   Gap band: {}% - {}%",
        config.gap.min_gap_pct * rust_decimal::Decimal::from(100u8),
        config.gap.max_gap_pct * rust_decimal::Decimal::from(100u8)
    );
    info!("   Capital: {}", config.sizing.total_capital);
    info!("   Max positions: {}", config.sizing.max_positions);
    info!("   Top-N per cycle: {}", config.scoring.max_signals);
}

/// Print the persisted audit trail for the `status` subcommand.
fn show_status(db: &str, verbose: bool) -> Result<()> {
    let manager = PersistenceManager::new(db)?;
    let report = manager.status_report()?;

    info!("📊 Session status ({db})");
    info!("   Signals delivered:  {}", report.signals);
    info!("   Suppressions:       {}", report.suppressions);
    info!("   Open positions:     {}", report.open_positions);
    info!("   Closed positions:   {}", report.closed_positions);
    info!("   Realized P&L:       {}", report.realized_pnl);

    if verbose {
        info!("   Recent signals:");
        for row in manager.recent_signals(10)? {
            info!(
                "   {} | {} [{}] entry {} score {} strength {}/5",
                row.generated_at.format("%H:%M:%S"),
                row.symbol,
                row.strategy,
                row.entry,
                row.score,
                row.strength
            );
        }
    }
    Ok(())
}
