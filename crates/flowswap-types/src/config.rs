//! Configuration types for the engine and individual markets.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{FlowswapError, Result, constants};

/// Engine-wide sizing and limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Buckets in the expiry schedule ring.
    pub schedule_capacity: usize,
    /// Buckets in the price history ring.
    pub history_capacity: usize,
    /// Ceiling on buckets processed by one catch-up call.
    pub max_buckets_per_call: u64,
    /// Smallest accepted deposit, in asset base units.
    pub min_deposit: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schedule_capacity: constants::DEFAULT_SCHEDULE_CAPACITY,
            history_capacity: constants::DEFAULT_HISTORY_CAPACITY,
            max_buckets_per_call: constants::DEFAULT_MAX_BUCKETS_PER_CALL,
            min_deposit: constants::DEFAULT_MIN_DEPOSIT,
        }
    }
}

impl EngineConfig {
    /// Parse from JSON. Missing fields fall back to defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from a JSON file on disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Reject sizes the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.schedule_capacity == 0 {
            return Err(FlowswapError::Configuration(
                "schedule_capacity must be > 0".into(),
            ));
        }
        if self.history_capacity == 0 {
            return Err(FlowswapError::Configuration(
                "history_capacity must be > 0".into(),
            ));
        }
        if self.max_buckets_per_call == 0 {
            return Err(FlowswapError::Configuration(
                "max_buckets_per_call must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Parameters fixed when a market is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketParams {
    /// First tick at which flow starts.
    pub genesis_tick: u64,
    /// Ticks per expiry bucket; a power of ten.
    pub bucket_width: u64,
    /// Tick from which new deposits are refused, if known up front.
    #[serde(default)]
    pub closing_tick: Option<u64>,
}

impl MarketParams {
    #[must_use]
    pub fn new(genesis_tick: u64, bucket_width: u64) -> Self {
        Self {
            genesis_tick,
            bucket_width,
            closing_tick: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_config_defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.schedule_capacity, 640_000);
        assert_eq!(cfg.history_capacity, 420_000);
        assert_eq!(cfg.min_deposit, 1_000);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg = EngineConfig::from_json_str(r#"{"schedule_capacity": 64}"#).unwrap();
        assert_eq!(cfg.schedule_capacity, 64);
        assert_eq!(cfg.max_buckets_per_call, constants::DEFAULT_MAX_BUCKETS_PER_CALL);
    }

    #[test]
    fn zero_budget_rejected() {
        let err = EngineConfig::from_json_str(r#"{"max_buckets_per_call": 0}"#).unwrap_err();
        assert!(matches!(err, FlowswapError::Configuration(_)));
    }

    #[test]
    fn malformed_json_rejected() {
        let err = EngineConfig::from_json_str("{").unwrap_err();
        assert!(matches!(err, FlowswapError::Serialization(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = EngineConfig::from_json_file("/nonexistent/flowswap.json").unwrap_err();
        assert!(matches!(err, FlowswapError::Io(_)));
    }

    #[test]
    fn market_params_serde_roundtrip() {
        let params = MarketParams {
            genesis_tick: 2_000,
            bucket_width: 100,
            closing_tick: Some(50_000),
        };
        let json = serde_json::to_string(&params).unwrap();
        let back: MarketParams = serde_json::from_str(&json).unwrap();
        assert_eq!(params, back);

        let bare: MarketParams =
            serde_json::from_str(r#"{"genesis_tick": 0, "bucket_width": 10}"#).unwrap();
        assert_eq!(bare.closing_tick, None);
    }
}
