//! SQLite persistence for the signal audit trail.
//!
//! Everything the pipeline emits is written down:
//! - Final signals and every suppression with its stage and reason
//! - Position lifecycle (open, close, realized P&L)
//! - Target alerts
//!
//! Writes happen on a dedicated sink task fed by a channel, so the scan
//! cycle never blocks on disk and a write failure never kills a cycle.

use crate::exit::{ClosedPosition, OpenPosition};
use crate::notify::Notifier;
use crate::signal::{FinalSignal, SuppressedSignal};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info};

/// Everything the engine hands to the sink task.
#[derive(Debug, Clone)]
pub enum SinkEvent {
    Signal(FinalSignal),
    Suppressed(SuppressedSignal),
    PositionOpened(OpenPosition),
    PositionClosed(ClosedPosition),
    TargetAlert {
        symbol: String,
        price: Decimal,
        target: Decimal,
    },
}

/// One row of the signals table, for the status report.
#[derive(Debug, Clone)]
pub struct SignalRow {
    pub signal_id: String,
    pub symbol: String,
    pub strategy: String,
    pub entry: Decimal,
    pub score: Decimal,
    pub strength: u8,
    pub generated_at: DateTime<Utc>,
}

/// Aggregate counts for the status report.
#[derive(Debug, Clone, Default)]
pub struct StatusReport {
    pub signals: u64,
    pub suppressions: u64,
    pub open_positions: u64,
    pub closed_positions: u64,
    pub realized_pnl: Decimal,
}

/// SQLite-based persistence manager.
pub struct PersistenceManager {
    conn: Connection,
}

impl PersistenceManager {
    /// Create a new persistence manager, initializing the database if needed.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;

        let manager = Self { conn };
        manager.init_schema()?;

        info!("Persistence manager initialized at {:?}", db_path.as_ref());
        Ok(manager)
    }

    /// In-memory database for tests.
    pub fn in_memory() -> Result<Self> {
        let manager = Self {
            conn: Connection::open_in_memory()?,
        };
        manager.init_schema()?;
        Ok(manager)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            -- Delivered signals
            CREATE TABLE IF NOT EXISTS signals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                signal_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                strategy TEXT NOT NULL,
                direction TEXT NOT NULL,
                entry TEXT NOT NULL,
                stop TEXT NOT NULL,
                target1 TEXT NOT NULL,
                target2 TEXT NOT NULL,
                score TEXT NOT NULL,
                rank INTEGER NOT NULL,
                strength INTEGER NOT NULL,
                quantity INTEGER NOT NULL,
                capital_required TEXT NOT NULL,
                rationale TEXT NOT NULL,
                generated_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_signals_generated ON signals(generated_at);
            CREATE INDEX IF NOT EXISTS idx_signals_symbol ON signals(symbol);

            -- Candidates dropped by a pipeline stage
            CREATE TABLE IF NOT EXISTS suppressions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                symbol TEXT NOT NULL,
                strategy TEXT NOT NULL,
                stage TEXT NOT NULL,
                reason TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_suppressions_timestamp ON suppressions(timestamp);

            -- Position lifecycle
            CREATE TABLE IF NOT EXISTS positions (
                position_id TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                direction TEXT NOT NULL,
                entry TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                opened_at TEXT NOT NULL,
                exit_price TEXT,
                exit_reason TEXT,
                closed_at TEXT,
                pnl TEXT,
                pnl_pct TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_positions_opened ON positions(opened_at);

            -- First-target touches
            CREATE TABLE IF NOT EXISTS target_alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                symbol TEXT NOT NULL,
                price TEXT NOT NULL,
                target TEXT NOT NULL
            );
            "#,
        )?;

        debug!("Database schema initialized");
        Ok(())
    }

    pub fn record_signal(&self, signal: &FinalSignal) -> Result<()> {
        let candidate = &signal.ranked.candidate;
        self.conn.execute(
            r#"
            INSERT INTO signals (signal_id, symbol, strategy, direction, entry, stop,
                                 target1, target2, score, rank, strength, quantity,
                                 capital_required, rationale, generated_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
            params![
                signal.id(),
                candidate.symbol,
                candidate.strategy,
                candidate.direction.to_string(),
                candidate.entry.to_string(),
                candidate.stop.to_string(),
                candidate.target1.to_string(),
                candidate.target2.to_string(),
                signal.ranked.score.to_string(),
                signal.ranked.rank as u64,
                signal.ranked.strength,
                signal.quantity,
                signal.capital_required.to_string(),
                candidate.rationale,
                candidate.generated_at.to_rfc3339(),
                signal.expires_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn record_suppression(&self, suppressed: &SuppressedSignal) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO suppressions (timestamp, symbol, strategy, stage, reason)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                Utc::now().to_rfc3339(),
                suppressed.candidate.symbol,
                suppressed.candidate.strategy,
                suppressed.stage,
                suppressed.reason,
            ],
        )?;
        Ok(())
    }

    pub fn record_position_opened(&self, position: &OpenPosition) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO positions (position_id, symbol, direction, entry, quantity, opened_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(position_id) DO NOTHING
            "#,
            params![
                position.id,
                position.symbol,
                position.direction.to_string(),
                position.entry.to_string(),
                position.quantity,
                position.opened_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn record_position_closed(&self, closed: &ClosedPosition) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE positions
            SET exit_price = ?2, exit_reason = ?3, closed_at = ?4, pnl = ?5, pnl_pct = ?6
            WHERE position_id = ?1
            "#,
            params![
                closed.id,
                closed.exit_price.to_string(),
                closed.reason.to_string(),
                closed.closed_at.to_rfc3339(),
                closed.pnl.to_string(),
                closed.pnl_pct.to_string(),
            ],
        )?;
        Ok(())
    }

    pub fn record_target_alert(&self, symbol: &str, price: Decimal, target: Decimal) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO target_alerts (timestamp, symbol, price, target)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                Utc::now().to_rfc3339(),
                symbol,
                price.to_string(),
                target.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Aggregate view for the status subcommand.
    pub fn status_report(&self) -> Result<StatusReport> {
        let signals: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM signals", [], |row| row.get(0))?;
        let suppressions: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM suppressions", [], |row| row.get(0))?;
        let open_positions: u64 = self.conn.query_row(
            "SELECT COUNT(*) FROM positions WHERE closed_at IS NULL",
            [],
            |row| row.get(0),
        )?;
        // P&L is stored as decimal text; sum in Rust rather than as REAL.
        let mut stmt = self
            .conn
            .prepare("SELECT pnl FROM positions WHERE closed_at IS NOT NULL")?;
        let pnls: Vec<Decimal> = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .filter_map(|r| r.ok())
            .filter_map(|s| Decimal::from_str(&s).ok())
            .collect();

        Ok(StatusReport {
            signals,
            suppressions,
            open_positions,
            closed_positions: pnls.len() as u64,
            realized_pnl: pnls.iter().sum(),
        })
    }

    /// Most recent delivered signals, newest first.
    pub fn recent_signals(&self, limit: usize) -> Result<Vec<SignalRow>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT signal_id, symbol, strategy, entry, score, strength, generated_at
            FROM signals ORDER BY generated_at DESC LIMIT ?1
            "#,
        )?;
        let rows = stmt
            .query_map([limit as u64], |row| {
                Ok(SignalRow {
                    signal_id: row.get(0)?,
                    symbol: row.get(1)?,
                    strategy: row.get(2)?,
                    entry: Decimal::from_str(&row.get::<_, String>(3)?).unwrap_or_default(),
                    score: Decimal::from_str(&row.get::<_, String>(4)?).unwrap_or_default(),
                    strength: row.get(5)?,
                    generated_at: DateTime::parse_from_rfc3339(&row.get::<_, String>(6)?)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }
}

/// Sink task: drains pipeline and exit events into the database and pushes
/// operator-facing notifications. A failed write is logged and dropped; the
/// stream keeps flowing.
pub async fn run_sink(
    mut rx: UnboundedReceiver<SinkEvent>,
    manager: PersistenceManager,
    notifier: Box<dyn Notifier>,
) {
    while let Some(event) = rx.recv().await {
        let result = match &event {
            SinkEvent::Signal(signal) => {
                let candidate = &signal.ranked.candidate;
                notifier.deliver(&format!(
                    "SIGNAL {} {} [{}/5] entry {} stop {} t1 {} t2 {} qty {} ({})",
                    candidate.symbol,
                    candidate.direction,
                    signal.ranked.strength,
                    candidate.entry,
                    candidate.stop,
                    candidate.target1,
                    candidate.target2,
                    signal.quantity,
                    candidate.rationale,
                ));
                manager.record_signal(signal)
            }
            SinkEvent::Suppressed(suppressed) => manager.record_suppression(suppressed),
            SinkEvent::PositionOpened(position) => manager.record_position_opened(position),
            SinkEvent::PositionClosed(closed) => {
                notifier.deliver(&format!(
                    "EXIT {} {} at {} ({}) pnl {}",
                    closed.symbol, closed.quantity, closed.exit_price, closed.reason, closed.pnl,
                ));
                manager.record_position_closed(closed)
            }
            SinkEvent::TargetAlert { symbol, price, target } => {
                notifier.deliver(&format!(
                    "TARGET 1 {symbol} touched {target} (last {price}); consider booking partial",
                ));
                manager.record_target_alert(symbol, *price, *target)
            }
        };
        if let Err(e) = result {
            error!("Failed to persist sink event: {e:#}");
        }
    }
    debug!("Sink channel closed; task exiting");
}
