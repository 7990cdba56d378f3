//! Configuration for the coordinator and trading agents

use crate::error::ConfigError;
use crate::{
    COORDINATOR_ID, DETECTOR_INTERVAL_MS, MAX_CLOCK_LEAD, PEER_TIMEOUT_MS, SNAPSHOT_TRADES,
    TRADE_RETENTION,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Coordinator node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Identity the coordinator reports under
    pub node_id: String,
    /// Failure detector poll period in milliseconds
    pub detector_interval_ms: u64,
    /// Heartbeat silence (ms) after which a peer is reported failed
    pub peer_timeout_ms: u64,
    /// Trades returned in a snapshot
    pub snapshot_trades: usize,
    /// Trades kept in memory; oldest are evicted first
    pub trade_retention: usize,
    /// How far ahead of the local clock an inbound timestamp may be
    pub max_clock_lead: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            node_id: COORDINATOR_ID.to_string(),
            detector_interval_ms: DETECTOR_INTERVAL_MS,
            peer_timeout_ms: PEER_TIMEOUT_MS,
            snapshot_trades: SNAPSHOT_TRADES,
            trade_retention: TRADE_RETENTION,
            max_clock_lead: MAX_CLOCK_LEAD,
        }
    }
}

impl CoordinatorConfig {
    /// Get detector interval as Duration
    pub fn detector_interval(&self) -> Duration {
        Duration::from_millis(self.detector_interval_ms)
    }

    /// Get peer timeout as Duration
    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_id.is_empty() {
            return Err(ConfigError::Invalid("coordinator node_id is empty".into()));
        }
        if self.detector_interval_ms == 0 {
            return Err(ConfigError::Invalid("detector_interval_ms must be > 0".into()));
        }
        if self.peer_timeout_ms == 0 {
            return Err(ConfigError::Invalid("peer_timeout_ms must be > 0".into()));
        }
        if self.max_clock_lead == 0 {
            return Err(ConfigError::Invalid("max_clock_lead must be > 0".into()));
        }
        if self.snapshot_trades == 0 {
            return Err(ConfigError::Invalid("snapshot_trades must be > 0".into()));
        }
        if self.trade_retention < self.snapshot_trades {
            return Err(ConfigError::Invalid(format!(
                "trade_retention ({}) must be at least snapshot_trades ({})",
                self.trade_retention, self.snapshot_trades
            )));
        }
        Ok(())
    }
}

/// Trading agent configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Lower bound of the pause between sends (ms)
    pub min_interval_ms: u64,
    /// Upper bound (exclusive) of the pause between sends (ms)
    pub max_interval_ms: u64,
    /// Probability that a send is an order rather than a heartbeat
    pub order_probability: f64,
    /// Symbols orders are drawn from
    pub symbols: Vec<String>,
    pub max_quantity: u32,
    pub min_price: f64,
    pub max_price: f64,
    /// Failure simulation stops the agent once it has sent more messages
    /// than a threshold drawn from this inclusive range
    pub failure_after_min: u32,
    pub failure_after_max: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 1_000,
            max_interval_ms: 3_000,
            order_probability: 0.7,
            symbols: vec!["AAPL".into(), "GOOG".into(), "TSLA".into()],
            max_quantity: 100,
            min_price: 10.0,
            max_price: 200.0,
            failure_after_min: 5,
            failure_after_max: 9,
        }
    }
}

impl AgentConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_interval_ms <= self.min_interval_ms {
            return Err(ConfigError::Invalid(
                "max_interval_ms must be greater than min_interval_ms".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.order_probability) {
            return Err(ConfigError::Invalid(format!(
                "order_probability {} is outside [0, 1]",
                self.order_probability
            )));
        }
        if self.symbols.is_empty() || self.symbols.iter().any(|s| s.is_empty()) {
            return Err(ConfigError::Invalid("symbols must be non-empty".into()));
        }
        if self.max_quantity == 0 {
            return Err(ConfigError::Invalid("max_quantity must be > 0".into()));
        }
        if !(self.min_price > 0.0 && self.max_price > self.min_price) {
            return Err(ConfigError::Invalid(
                "price range must be positive and non-empty".into(),
            ));
        }
        if self.failure_after_max < self.failure_after_min {
            return Err(ConfigError::Invalid(
                "failure_after_max must be >= failure_after_min".into(),
            ));
        }
        Ok(())
    }
}

/// Full configuration file: `[coordinator]` and `[agent]` tables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub coordinator: CoordinatorConfig,
    pub agent: AgentConfig,
}

impl MarketConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: MarketConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.coordinator.validate()?;
        self.agent.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = MarketConfig::default();
        config.validate().unwrap();
        assert_eq!(config.coordinator.detector_interval(), Duration::from_secs(2));
        assert_eq!(config.coordinator.peer_timeout(), Duration::from_secs(10));
        assert_eq!(config.coordinator.snapshot_trades, 50);
        assert_eq!(config.coordinator.max_clock_lead, MAX_CLOCK_LEAD);
        assert_eq!(config.agent.min_interval(), Duration::from_secs(1));
        assert_eq!(config.agent.max_interval(), Duration::from_secs(3));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = MarketConfig::from_toml_str(
            r#"
            [coordinator]
            peer_timeout_ms = 4000

            [agent]
            symbols = ["MSFT"]
            "#,
        )
        .unwrap();

        assert_eq!(config.coordinator.peer_timeout_ms, 4000);
        assert_eq!(config.coordinator.detector_interval_ms, DETECTOR_INTERVAL_MS);
        assert_eq!(config.agent.symbols, vec!["MSFT".to_string()]);
        assert_eq!(config.agent.order_probability, 0.7);
    }

    #[test]
    fn test_rejects_retention_below_snapshot() {
        let err = MarketConfig::from_toml_str(
            r#"
            [coordinator]
            snapshot_trades = 50
            trade_retention = 10
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_zero_periods() {
        for config in [
            CoordinatorConfig {
                detector_interval_ms: 0,
                ..Default::default()
            },
            CoordinatorConfig {
                peer_timeout_ms: 0,
                ..Default::default()
            },
            CoordinatorConfig {
                max_clock_lead: 0,
                ..Default::default()
            },
        ] {
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        }
    }

    #[test]
    fn test_rejects_bad_probability() {
        let config = AgentConfig {
            order_probability: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let rendered = MarketConfig::default().to_toml().unwrap();
        file.write_all(rendered.as_bytes()).unwrap();

        let loaded = MarketConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded, MarketConfig::default());
    }

    #[test]
    fn test_missing_file() {
        let err = MarketConfig::from_file("/nonexistent/market.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
