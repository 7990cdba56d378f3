//! Node Configuration

use anyhow::{Context, Result};
use market_core::MarketConfig;
use std::path::Path;

/// Load the venue configuration, falling back to defaults without a file
pub fn load(path: Option<&Path>) -> Result<MarketConfig> {
    let config = match path {
        Some(path) => MarketConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => MarketConfig::default(),
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let config = load(None).unwrap();
        assert_eq!(config, MarketConfig::default());
        assert_eq!(config.coordinator.node_id, "market-node-01");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[agent]\nsymbols = [\"MSFT\"]\n\n[coordinator]\npeer_timeout_ms = 4000").unwrap();

        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.agent.symbols, vec!["MSFT".to_string()]);
        assert_eq!(config.coordinator.peer_timeout_ms, 4000);
        assert_eq!(config.coordinator.snapshot_trades, 50);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[agent]\nmin_interval_ms = 5000\nmax_interval_ms = 10").unwrap();
        assert!(load(Some(file.path())).is_err());

        let missing = file.path().with_extension("missing");
        assert!(load(Some(&missing)).is_err());
    }
}
