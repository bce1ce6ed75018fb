//! # Confluence Engine Configuration
//!
//! Every tunable of the engine lives here: cycle cadence, batch size, SAR
//! parameters, readiness thresholds and windows, simulated position sizing,
//! trade store location and market-data source. Defaults reproduce the
//! production behaviour; files and `CONFLUENCE_` environment variables
//! override individual fields through [`EngineConfig::load`].

use crate::catalog::default_catalog;
use crate::types::InstrumentSpec;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment prefix for overrides (`CONFLUENCE_SCHEDULER__BATCH_SIZE=20`)
pub const ENV_PREFIX: &str = "CONFLUENCE";

/// Complete configuration for the confluence engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scheduler: SchedulerConfig,
    pub readiness: ReadinessConfig,
    pub sar: SarParams,
    pub account: AccountConfig,
    pub position: PositionConfig,
    pub store: StoreConfig,
    pub market_data: MarketDataConfig,
    pub logging: LoggingConfig,
    /// Replaces the built-in catalog when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<Vec<InstrumentSpec>>,
}

/// Refresh cycle parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Period between cycle ticks
    pub cycle_interval_ms: u64,
    /// Instruments fetched concurrently per batch
    pub batch_size: usize,
    /// Candles requested per timeframe
    pub candle_count: usize,
    /// Upper bound on a single candle fetch
    pub fetch_timeout_ms: u64,
    /// Delay before the one-off diagnostic cycle
    pub self_test_delay_ms: u64,
    /// Instrument used by the diagnostic cycle (first catalog entry when unset)
    pub self_test_instrument: Option<String>,
}

/// Confidence clamping and ready/cooldown hysteresis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Lowest confidence an instrument can drift to
    pub floor: f64,
    /// Highest confidence an instrument can drift to
    pub ceiling: f64,
    /// Confidence at or above which an instrument is ready
    pub ready_threshold: f64,
    /// Exact confidence value forming the ranked tier
    pub top_tier: f64,
    /// How long an instrument stays ready after promotion
    pub hold_secs: u64,
    /// Rolling window of the per-instrument price history
    pub retention_secs: u64,
    /// Period of the confidence drift loop
    pub drift_interval_ms: u64,
    /// Maximum absolute change of one random-walk step
    pub drift_step: f64,
}

/// Parabolic SAR parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SarParams {
    pub af_start: f64,
    pub af_step: f64,
    pub af_max: f64,
    /// Fewer candles than this yields no reading
    pub min_candles: usize,
}

/// Account polling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    pub balance_interval_ms: u64,
}

/// Simulated position sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionConfig {
    /// Stake per position in account currency
    pub amount: f64,
    pub duration_secs: u64,
    /// Fraction of the stake paid out on a win
    pub payout_ratio: f64,
}

/// Trade store location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON-lines file for the durable tier; memory only when unset
    pub path: Option<String>,
    /// Number of trades included in status reports
    pub recent_limit: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketDataMode {
    Simulated,
    Http,
}

/// Market-data collaborator selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketDataConfig {
    pub mode: MarketDataMode,
    /// Base URL of the candle service (http mode)
    pub endpoint: String,
    pub account_id: u64,
    pub is_demo: bool,
    pub starting_balance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cycle_interval_ms: 5_000,
            batch_size: 10,
            candle_count: 50,
            fetch_timeout_ms: 4_000,
            self_test_delay_ms: 2_000,
            self_test_instrument: None,
        }
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            floor: 15.0,
            ceiling: 92.0,
            ready_threshold: 88.0,
            top_tier: 92.0,
            hold_secs: 300, // 5 minutes
            retention_secs: 3_600, // 60 minutes
            drift_interval_ms: 5_000,
            drift_step: 1.5,
        }
    }
}

impl Default for SarParams {
    fn default() -> Self {
        Self {
            af_start: 0.02,
            af_step: 0.02,
            af_max: 0.2,
            min_candles: 2,
        }
    }
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            balance_interval_ms: 10_000,
        }
    }
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            amount: 1.0,
            duration_secs: 60,
            payout_ratio: 0.92,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: Some("./data/trades.jsonl".to_string()),
            recent_limit: 20,
        }
    }
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            mode: MarketDataMode::Simulated,
            endpoint: "http://127.0.0.1:5001".to_string(),
            account_id: 0,
            is_demo: true,
            starting_balance: 5.30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            filter: "confluence_strategy=info,confluence_dashboard=info,warn".to_string(),
        }
    }
}

impl SchedulerConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn self_test_delay(&self) -> Duration {
        Duration::from_millis(self.self_test_delay_ms)
    }
}

impl ReadinessConfig {
    pub fn hold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.hold_secs as i64)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.retention_secs as i64)
    }

    pub fn drift_interval(&self) -> Duration {
        Duration::from_millis(self.drift_interval_ms)
    }

    pub fn clamp(&self, confidence: f64) -> f64 {
        confidence.clamp(self.floor, self.ceiling)
    }

    pub fn is_top_tier(&self, confidence: f64) -> bool {
        (confidence - self.top_tier).abs() < f64::EPSILON
    }
}

impl AccountConfig {
    pub fn balance_interval(&self) -> Duration {
        Duration::from_millis(self.balance_interval_ms)
    }
}

impl EngineConfig {
    /// Load defaults, then `path` if given, then `CONFLUENCE_` environment overrides
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config: Self = confluence_config::load_layered(path, ENV_PREFIX)
            .context("Failed to load engine configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// The catalog to monitor
    pub fn instruments(&self) -> Vec<InstrumentSpec> {
        self.catalog.clone().unwrap_or_else(default_catalog)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.scheduler.batch_size == 0 {
            anyhow::bail!("scheduler.batch_size must be positive");
        }

        if self.scheduler.cycle_interval_ms == 0 {
            anyhow::bail!("scheduler.cycle_interval_ms must be positive");
        }

        if self.scheduler.fetch_timeout_ms == 0 {
            anyhow::bail!("scheduler.fetch_timeout_ms must be positive");
        }

        let readiness = &self.readiness;
        if readiness.floor < 0.0
            || readiness.ceiling > 100.0
            || readiness.floor > readiness.ceiling
        {
            anyhow::bail!("readiness floor/ceiling must satisfy 0 <= floor <= ceiling <= 100");
        }

        if readiness.ready_threshold > readiness.top_tier {
            anyhow::bail!("readiness.ready_threshold must not exceed readiness.top_tier");
        }

        if readiness.top_tier > readiness.ceiling {
            anyhow::bail!("readiness.top_tier must be reachable (<= ceiling)");
        }

        let drift_range = readiness.ceiling - readiness.floor;
        if !readiness.drift_step.is_finite()
            || readiness.drift_step < 0.0
            || readiness.drift_step > drift_range
        {
            anyhow::bail!("readiness.drift_step must be finite and within 0..=(ceiling - floor)");
        }

        let sar = &self.sar;
        if sar.af_start <= 0.0 || sar.af_step <= 0.0 || sar.af_max < sar.af_start {
            anyhow::bail!("sar parameters must satisfy 0 < af_start <= af_max and af_step > 0");
        }

        if self.position.amount <= 0.0 {
            anyhow::bail!("position.amount must be positive");
        }

        if self.instruments().is_empty() {
            anyhow::bail!("catalog must contain at least one instrument");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_validation() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.instruments().len(), 80);
    }

    #[test]
    fn test_config_serialization() {
        let config = EngineConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let deserialized: EngineConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config.scheduler.batch_size, deserialized.scheduler.batch_size);
        assert_eq!(config.sar, deserialized.sar);
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("confluence.toml");
        fs::write(
            &path,
            r#"
[scheduler]
batch_size = 5

[readiness]
hold_secs = 120

[[catalog]]
id = "EUR/USD OTC"
category = "forex"
confidence = 92.0
"#,
        )
        .unwrap();

        let config = EngineConfig::load(Some(&path)).unwrap();
        assert_eq!(config.scheduler.batch_size, 5);
        assert_eq!(config.scheduler.candle_count, 50);
        assert_eq!(config.readiness.hold_secs, 120);
        assert_eq!(config.instruments().len(), 1);
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let mut config = EngineConfig::default();
        config.readiness.ready_threshold = 95.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.scheduler.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_drift_step_must_be_finite_and_bounded() {
        for step in [f64::NAN, f64::INFINITY, -1.0, 1e9] {
            let mut config = EngineConfig::default();
            config.readiness.drift_step = step;
            assert!(config.validate().is_err(), "drift_step {step} accepted");
        }

        let mut config = EngineConfig::default();
        config.readiness.drift_step = 0.0;
        assert!(config.validate().is_ok());
        config.readiness.drift_step = 77.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_top_tier_is_exact() {
        let readiness = ReadinessConfig::default();
        assert!(readiness.is_top_tier(92.0));
        assert!(!readiness.is_top_tier(91.9));
        assert_eq!(readiness.clamp(97.0), 92.0);
        assert_eq!(readiness.clamp(3.0), 15.0);
    }
}
