//! Configuration management for the intraday signal engine.
//!
//! Loads settings from environment variables and an optional config file.
//! Validation runs once at startup and fails fast on inconsistent values
//! (scoring weights that do not sum to one, unordered session times).

use anyhow::{Context, Result};
use chrono::NaiveTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Instrument universe to scan
    #[serde(default)]
    pub universe: UniverseConfig,
    /// Session phase boundaries (exchange-local wall clock)
    #[serde(default)]
    pub session: SessionConfig,
    /// Gap-breakout strategy parameters
    #[serde(default)]
    pub gap: GapConfig,
    /// Opening-range breakout strategy parameters
    #[serde(default)]
    pub range_breakout: RangeBreakoutConfig,
    /// VWAP mean-reversion strategy parameters
    #[serde(default)]
    pub vwap_reversion: VwapReversionConfig,
    /// Factor normalization and composite scoring
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// Capital and position sizing
    #[serde(default)]
    pub sizing: SizingConfig,
    /// Trailing-stop and exit thresholds
    #[serde(default)]
    pub exits: ExitConfig,
    /// Tick feed and reference data endpoints
    #[serde(default)]
    pub feed: FeedConfig,
    /// Advisory overlay cache
    #[serde(default)]
    pub advisory: AdvisoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseConfig {
    /// Symbols to track; the feed subscribes to exactly this set
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Market open
    #[serde(default = "default_open")]
    pub open: NaiveTime,
    /// Opening ranges freeze at this time
    #[serde(default = "default_range_lock")]
    pub opening_range_lock: NaiveTime,
    /// Opening drive ends / mid session begins
    #[serde(default = "default_midsession_start")]
    pub midsession_start: NaiveTime,
    /// Late session begins (no new mid-session entries after this)
    #[serde(default = "default_late_start")]
    pub late_start: NaiveTime,
    /// All open positions force-closed at this time
    #[serde(default = "default_square_off")]
    pub square_off: NaiveTime,
    /// Market close
    #[serde(default = "default_close")]
    pub close: NaiveTime,
    /// Exchange-local offset from UTC in minutes (IST = +330)
    #[serde(default = "default_utc_offset")]
    pub utc_offset_minutes: i32,
    /// Fixed candle bucket width in minutes
    #[serde(default = "default_candle_width")]
    pub candle_width_minutes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapConfig {
    /// Lower inclusive bound of the open-to-previous-close gap band
    #[serde(default = "default_min_gap_pct")]
    pub min_gap_pct: Decimal,
    /// Upper inclusive bound of the gap band
    #[serde(default = "default_max_gap_pct")]
    pub max_gap_pct: Decimal,
    /// Cumulative volume is evaluated against the average at this time
    #[serde(default = "default_volume_cutoff")]
    pub volume_cutoff: NaiveTime,
    /// Required fraction of average daily volume by the volume cutoff
    #[serde(default = "default_min_volume_ratio")]
    pub min_volume_ratio: Decimal,
    /// Validated symbols expire without a signal at this time
    #[serde(default = "default_signal_cutoff")]
    pub signal_cutoff: NaiveTime,
    /// Stop is capped so risk from entry never exceeds this fraction
    #[serde(default = "default_max_risk_pct")]
    pub max_risk_pct: Decimal,
    /// First profit target above entry
    #[serde(default = "default_gap_target1")]
    pub target1_pct: Decimal,
    /// Second profit target above entry
    #[serde(default = "default_gap_target2")]
    pub target2_pct: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeBreakoutConfig {
    /// Current candle volume must exceed the average candle volume by this ratio
    #[serde(default = "default_min_candle_volume_ratio")]
    pub min_candle_volume_ratio: Decimal,
    /// Stop (range low) is capped so risk from entry never exceeds this fraction
    #[serde(default = "default_max_risk_pct")]
    pub max_risk_pct: Decimal,
    #[serde(default = "default_orb_target1")]
    pub target1_pct: Decimal,
    #[serde(default = "default_orb_target2")]
    pub target2_pct: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VwapReversionConfig {
    /// Minimum stretch below VWAP to consider a reversion entry
    #[serde(default = "default_min_vwap_deviation")]
    pub min_deviation_pct: Decimal,
    /// Stop distance below entry
    #[serde(default = "default_vwap_stop_pct")]
    pub stop_pct: Decimal,
    #[serde(default = "default_vwap_target1")]
    pub target1_pct: Decimal,
    #[serde(default = "default_vwap_target2")]
    pub target2_pct: Decimal,
}

/// Normalization band for one raw factor: `min` maps to 0, `max` to 1,
/// values outside clamp.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FactorBand {
    pub min: Decimal,
    pub max: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Bounded top-N selection per cycle
    #[serde(default = "default_max_signals")]
    pub max_signals: usize,
    /// Normalization band per factor name
    #[serde(default = "default_bands")]
    pub bands: HashMap<String, FactorBand>,
    /// Convex combination weights per strategy; each group must sum to 1
    #[serde(default = "default_weights")]
    pub weights: HashMap<String, HashMap<String, Decimal>>,
    /// Cross-strategy dedup priority, highest first
    #[serde(default = "default_strategy_priority")]
    pub strategy_priority: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizingConfig {
    /// Total capital available for the session
    #[serde(default = "default_total_capital")]
    pub total_capital: Decimal,
    /// Open-position budget; per-trade capital = total / max
    #[serde(default = "default_max_positions")]
    pub max_positions: usize,
    /// Delivered signals expire this many minutes after generation
    #[serde(default = "default_validity_minutes")]
    pub signal_validity_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitConfig {
    /// Move stop to entry once price is this far above entry
    #[serde(default = "default_breakeven_trigger")]
    pub breakeven_trigger_pct: Decimal,
    /// Begin trailing once price is this far above entry
    #[serde(default = "default_trail_trigger")]
    pub trail_trigger_pct: Decimal,
    /// Trail at price minus this fraction
    #[serde(default = "default_trail_distance")]
    pub trail_distance_pct: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Vendor websocket endpoint for the tick stream
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// REST endpoint for previous-session reference data
    #[serde(default = "default_reference_url")]
    pub reference_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisoryConfig {
    /// Disable to run the pipeline without the advisory overlay
    #[serde(default = "default_advisory_enabled")]
    pub enabled: bool,
    /// REST endpoint returning per-symbol stances
    #[serde(default)]
    pub url: String,
    /// Refresh cadence, independent of the scan cycle
    #[serde(default = "default_advisory_refresh")]
    pub refresh_secs: u64,
}

// Default value functions

fn default_symbols() -> Vec<String> {
    ["RELIANCE", "TCS", "HDFCBANK", "INFY", "ICICIBANK", "SBIN", "TATAMOTORS", "AXISBANK"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_open() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 15, 0).unwrap()
}

fn default_range_lock() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 30, 0).unwrap()
}

fn default_midsession_start() -> NaiveTime {
    NaiveTime::from_hms_opt(11, 0, 0).unwrap()
}

fn default_late_start() -> NaiveTime {
    NaiveTime::from_hms_opt(14, 0, 0).unwrap()
}

fn default_square_off() -> NaiveTime {
    NaiveTime::from_hms_opt(15, 10, 0).unwrap()
}

fn default_close() -> NaiveTime {
    NaiveTime::from_hms_opt(15, 30, 0).unwrap()
}

fn default_utc_offset() -> i32 {
    330 // IST
}

fn default_candle_width() -> u32 {
    15
}

fn default_min_gap_pct() -> Decimal {
    Decimal::new(3, 2) // 0.03 = 3%
}

fn default_max_gap_pct() -> Decimal {
    Decimal::new(10, 2) // 0.10
}

fn default_volume_cutoff() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 30, 0).unwrap() // 15 minutes into the session
}

fn default_min_volume_ratio() -> Decimal {
    Decimal::new(50, 2) // 0.50 of average daily volume
}

fn default_signal_cutoff() -> NaiveTime {
    NaiveTime::from_hms_opt(10, 30, 0).unwrap()
}

fn default_max_risk_pct() -> Decimal {
    Decimal::new(2, 2) // 0.02
}

fn default_gap_target1() -> Decimal {
    Decimal::new(5, 2) // 0.05
}

fn default_gap_target2() -> Decimal {
    Decimal::new(7, 2) // 0.07
}

fn default_min_candle_volume_ratio() -> Decimal {
    Decimal::new(12, 1) // 1.2x average candle volume
}

fn default_orb_target1() -> Decimal {
    Decimal::new(3, 2) // 0.03
}

fn default_orb_target2() -> Decimal {
    Decimal::new(5, 2) // 0.05
}

fn default_min_vwap_deviation() -> Decimal {
    Decimal::new(15, 3) // 0.015
}

fn default_vwap_stop_pct() -> Decimal {
    Decimal::new(1, 2) // 0.01
}

fn default_vwap_target1() -> Decimal {
    Decimal::new(15, 3) // 0.015
}

fn default_vwap_target2() -> Decimal {
    Decimal::new(25, 3) // 0.025
}

fn default_max_signals() -> usize {
    5
}

fn default_bands() -> HashMap<String, FactorBand> {
    let mut bands = HashMap::new();
    bands.insert(
        "gap_pct".to_string(),
        FactorBand { min: Decimal::new(3, 2), max: Decimal::new(10, 2) },
    );
    bands.insert(
        "volume_ratio".to_string(),
        FactorBand { min: Decimal::new(5, 1), max: Decimal::new(3, 0) },
    );
    bands.insert(
        "breakout_pct".to_string(),
        FactorBand { min: Decimal::ZERO, max: Decimal::new(2, 2) },
    );
    bands.insert(
        "candle_volume_ratio".to_string(),
        FactorBand { min: Decimal::ONE, max: Decimal::new(4, 0) },
    );
    bands.insert(
        "vwap_deviation_pct".to_string(),
        FactorBand { min: Decimal::new(15, 3), max: Decimal::new(5, 2) },
    );
    bands.insert(
        "day_position".to_string(),
        FactorBand { min: Decimal::ZERO, max: Decimal::ONE },
    );
    bands
}

fn default_weights() -> HashMap<String, HashMap<String, Decimal>> {
    let mut weights = HashMap::new();

    let mut gap = HashMap::new();
    gap.insert("gap_pct".to_string(), Decimal::new(6, 1)); // 0.6
    gap.insert("volume_ratio".to_string(), Decimal::new(4, 1)); // 0.4
    weights.insert("gap_breakout".to_string(), gap);

    let mut orb = HashMap::new();
    orb.insert("breakout_pct".to_string(), Decimal::new(5, 1));
    orb.insert("candle_volume_ratio".to_string(), Decimal::new(5, 1));
    weights.insert("range_breakout".to_string(), orb);

    let mut vwap = HashMap::new();
    vwap.insert("vwap_deviation_pct".to_string(), Decimal::new(7, 1));
    vwap.insert("day_position".to_string(), Decimal::new(3, 1));
    weights.insert("vwap_reversion".to_string(), vwap);

    weights
}

fn default_strategy_priority() -> Vec<String> {
    vec![
        "gap_breakout".to_string(),
        "range_breakout".to_string(),
        "vwap_reversion".to_string(),
    ]
}

fn default_total_capital() -> Decimal {
    Decimal::new(1_000_000, 0)
}

fn default_max_positions() -> usize {
    5
}

fn default_validity_minutes() -> i64 {
    15
}

fn default_breakeven_trigger() -> Decimal {
    Decimal::new(2, 2) // 0.02
}

fn default_trail_trigger() -> Decimal {
    Decimal::new(4, 2) // 0.04
}

fn default_trail_distance() -> Decimal {
    Decimal::new(2, 2) // 0.02
}

fn default_ws_url() -> String {
    "wss://feed.example.com/ticks".to_string()
}

fn default_reference_url() -> String {
    "https://feed.example.com/api".to_string()
}

fn default_advisory_enabled() -> bool {
    true
}

fn default_advisory_refresh() -> u64 {
    300
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("SIG"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values. Called once at startup; any violation
    /// aborts before the scan loop starts.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.universe.symbols.is_empty(), "universe.symbols must not be empty");

        anyhow::ensure!(
            self.sizing.total_capital > Decimal::ZERO,
            "sizing.total_capital must be positive"
        );
        anyhow::ensure!(self.sizing.max_positions >= 1, "sizing.max_positions must be >= 1");

        anyhow::ensure!(
            self.gap.min_gap_pct < self.gap.max_gap_pct,
            "gap band must satisfy min_gap_pct < max_gap_pct"
        );
        anyhow::ensure!(
            self.gap.target1_pct < self.gap.target2_pct,
            "gap targets must satisfy target1_pct < target2_pct"
        );
        anyhow::ensure!(
            self.exits.breakeven_trigger_pct < self.exits.trail_trigger_pct,
            "breakeven_trigger_pct must be below trail_trigger_pct"
        );
        anyhow::ensure!(
            self.exits.trail_distance_pct > Decimal::ZERO,
            "trail_distance_pct must be positive"
        );

        let s = &self.session;
        anyhow::ensure!(
            s.open < s.opening_range_lock
                && s.opening_range_lock <= s.midsession_start
                && s.midsession_start < s.late_start
                && s.late_start < s.square_off
                && s.square_off < s.close,
            "session times must be strictly ordered: open < range_lock <= midsession < late < square_off < close"
        );
        anyhow::ensure!(
            self.gap.volume_cutoff > s.open && self.gap.signal_cutoff > self.gap.volume_cutoff,
            "gap cutoffs must satisfy open < volume_cutoff < signal_cutoff"
        );
        anyhow::ensure!(s.candle_width_minutes > 0, "candle_width_minutes must be positive");

        anyhow::ensure!(
            !self.scoring.strategy_priority.is_empty(),
            "scoring.strategy_priority must not be empty"
        );

        for (strategy, group) in &self.scoring.weights {
            let sum: Decimal = group.values().copied().sum();
            anyhow::ensure!(
                sum == Decimal::ONE,
                "scoring weights for '{}' must sum to 1, got {}",
                strategy,
                sum
            );
            for factor in group.keys() {
                let band = self.scoring.bands.get(factor).with_context(|| {
                    format!("factor '{}' weighted for '{}' has no normalization band", factor, strategy)
                })?;
                anyhow::ensure!(
                    band.min < band.max,
                    "band for factor '{}' must satisfy min < max",
                    factor
                );
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            universe: UniverseConfig::default(),
            session: SessionConfig::default(),
            gap: GapConfig::default(),
            range_breakout: RangeBreakoutConfig::default(),
            vwap_reversion: VwapReversionConfig::default(),
            scoring: ScoringConfig::default(),
            sizing: SizingConfig::default(),
            exits: ExitConfig::default(),
            feed: FeedConfig::default(),
            advisory: AdvisoryConfig::default(),
        }
    }
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self { symbols: default_symbols() }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            open: default_open(),
            opening_range_lock: default_range_lock(),
            midsession_start: default_midsession_start(),
            late_start: default_late_start(),
            square_off: default_square_off(),
            close: default_close(),
            utc_offset_minutes: default_utc_offset(),
            candle_width_minutes: default_candle_width(),
        }
    }
}

impl Default for GapConfig {
    fn default() -> Self {
        Self {
            min_gap_pct: default_min_gap_pct(),
            max_gap_pct: default_max_gap_pct(),
            volume_cutoff: default_volume_cutoff(),
            min_volume_ratio: default_min_volume_ratio(),
            signal_cutoff: default_signal_cutoff(),
            max_risk_pct: default_max_risk_pct(),
            target1_pct: default_gap_target1(),
            target2_pct: default_gap_target2(),
        }
    }
}

impl Default for RangeBreakoutConfig {
    fn default() -> Self {
        Self {
            min_candle_volume_ratio: default_min_candle_volume_ratio(),
            max_risk_pct: default_max_risk_pct(),
            target1_pct: default_orb_target1(),
            target2_pct: default_orb_target2(),
        }
    }
}

impl Default for VwapReversionConfig {
    fn default() -> Self {
        Self {
            min_deviation_pct: default_min_vwap_deviation(),
            stop_pct: default_vwap_stop_pct(),
            target1_pct: default_vwap_target1(),
            target2_pct: default_vwap_target2(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            max_signals: default_max_signals(),
            bands: default_bands(),
            weights: default_weights(),
            strategy_priority: default_strategy_priority(),
        }
    }
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            total_capital: default_total_capital(),
            max_positions: default_max_positions(),
            signal_validity_minutes: default_validity_minutes(),
        }
    }
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            breakeven_trigger_pct: default_breakeven_trigger(),
            trail_trigger_pct: default_trail_trigger(),
            trail_distance_pct: default_trail_distance(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            reference_url: default_reference_url(),
        }
    }
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            enabled: default_advisory_enabled(),
            url: String::new(),
            refresh_secs: default_advisory_refresh(),
        }
    }
}
