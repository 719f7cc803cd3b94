// ============================================================================
// Service Configuration
// ============================================================================
//
// Read from the environment (after `.env` is loaded by the binary):
//
//   BLACKBOOK_BIND_ADDR          listen address            (0.0.0.0:1234)
//   BLACKBOOK_LIQUIDITY_DEPTH    curve depth, whole shares (1000)
//   BLACKBOOK_SNAPSHOT_PATH      snapshot file             (data/settlement.json)
//   BLACKBOOK_LOG_JSON           json logs                 (false)
//   BLACKBOOK_CHANNEL_PUBKEY     relay channel key, hex    (unset: relay disabled)
//   BLACKBOOK_TRUSTED_REMOTES    domain:address,...        (none)
//   BLACKBOOK_REMOTE_MAX_COST    relayed trade cap, whole  (unbounded)
//
// ============================================================================

use ed25519_dalek::VerifyingKey;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

use crate::bridge::{RelayConfig, TrustedRemote};
use crate::market_resolve::{units, DEFAULT_LIQUIDITY_DEPTH};
use crate::rpc::parse_verifying_key;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:1234";
pub const DEFAULT_SNAPSHOT_PATH: &str = "data/settlement.json";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Whole shares; scaled when the pricing engine is built
    pub liquidity_depth: u128,
    pub snapshot_path: PathBuf,
    pub log_json: bool,
    pub channel_key: Option<VerifyingKey>,
    pub trusted_remotes: Vec<TrustedRemote>,
    /// Scaled collateral units
    pub remote_max_cost: Option<u128>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 1234)),
            liquidity_depth: DEFAULT_LIQUIDITY_DEPTH,
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
            log_json: false,
            channel_key: None,
            trusted_remotes: Vec::new(),
            remote_max_cost: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (environment, tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Config::default();

        if let Some(addr) = get("BLACKBOOK_BIND_ADDR") {
            config.bind_addr = addr.parse().map_err(|e| invalid("BLACKBOOK_BIND_ADDR", e))?;
        }

        if let Some(depth) = get("BLACKBOOK_LIQUIDITY_DEPTH") {
            let depth: u128 = depth.parse().map_err(|e| invalid("BLACKBOOK_LIQUIDITY_DEPTH", e))?;
            if depth == 0 {
                return Err(invalid("BLACKBOOK_LIQUIDITY_DEPTH", "must be positive"));
            }
            config.liquidity_depth = depth;
        }

        if let Some(path) = get("BLACKBOOK_SNAPSHOT_PATH") {
            config.snapshot_path = PathBuf::from(path);
        }

        if let Some(flag) = get("BLACKBOOK_LOG_JSON") {
            config.log_json = parse_bool(&flag).ok_or_else(|| invalid("BLACKBOOK_LOG_JSON", "expected true/false"))?;
        }

        if let Some(key) = get("BLACKBOOK_CHANNEL_PUBKEY") {
            config.channel_key = Some(parse_verifying_key(&key).map_err(|e| invalid("BLACKBOOK_CHANNEL_PUBKEY", e))?);
        }

        if let Some(remotes) = get("BLACKBOOK_TRUSTED_REMOTES") {
            config.trusted_remotes = parse_remotes(&remotes)?;
        }

        if let Some(cap) = get("BLACKBOOK_REMOTE_MAX_COST") {
            let whole: u128 = cap.parse().map_err(|e| invalid("BLACKBOOK_REMOTE_MAX_COST", e))?;
            let scaled = whole
                .checked_mul(units(1))
                .ok_or_else(|| invalid("BLACKBOOK_REMOTE_MAX_COST", "too large"))?;
            config.remote_max_cost = Some(scaled);
        }

        Ok(config)
    }

    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            channel_key: self.channel_key,
            trusted_remotes: self.trusted_remotes.clone(),
            remote_max_cost: self.remote_max_cost,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_remotes(value: &str) -> Result<Vec<TrustedRemote>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (domain, address) = entry
                .split_once(':')
                .ok_or_else(|| invalid("BLACKBOOK_TRUSTED_REMOTES", format!("expected domain:address, got {entry}")))?;
            let domain: u32 = domain
                .trim()
                .parse()
                .map_err(|e| invalid("BLACKBOOK_TRUSTED_REMOTES", e))?;
            let address = address.trim();
            if address.is_empty() {
                return Err(invalid("BLACKBOOK_TRUSTED_REMOTES", format!("empty address for domain {domain}")));
            }
            Ok(TrustedRemote::new(domain, address))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.liquidity_depth, DEFAULT_LIQUIDITY_DEPTH);
        assert_eq!(config.snapshot_path, PathBuf::from(DEFAULT_SNAPSHOT_PATH));
        assert!(config.channel_key.is_none());
        assert!(config.remote_max_cost.is_none());
    }

    #[test]
    fn test_full_config() {
        let key = ed25519_dalek::SigningKey::from_bytes(&[1u8; 32]).verifying_key();
        let key_hex = hex::encode(key.as_bytes());
        let config = Config::from_lookup(lookup(&[
            ("BLACKBOOK_BIND_ADDR", "127.0.0.1:8080"),
            ("BLACKBOOK_LIQUIDITY_DEPTH", "250"),
            ("BLACKBOOK_LOG_JSON", "true"),
            ("BLACKBOOK_CHANNEL_PUBKEY", &key_hex),
            ("BLACKBOOK_TRUSTED_REMOTES", "10:0xaaa, 8453:0xbbb"),
            ("BLACKBOOK_REMOTE_MAX_COST", "50"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.liquidity_depth, 250);
        assert!(config.log_json);
        assert_eq!(config.channel_key, Some(key));
        assert_eq!(
            config.trusted_remotes,
            vec![TrustedRemote::new(10, "0xaaa"), TrustedRemote::new(8453, "0xbbb")]
        );
        assert_eq!(config.remote_max_cost, Some(units(50)));
    }

    #[test]
    fn test_invalid_values() {
        assert!(Config::from_lookup(lookup(&[("BLACKBOOK_LIQUIDITY_DEPTH", "0")])).is_err());
        assert!(Config::from_lookup(lookup(&[("BLACKBOOK_BIND_ADDR", "nowhere")])).is_err());
        assert!(Config::from_lookup(lookup(&[("BLACKBOOK_TRUSTED_REMOTES", "10")])).is_err());
        assert!(Config::from_lookup(lookup(&[("BLACKBOOK_CHANNEL_PUBKEY", "zz")])).is_err());
        assert!(Config::from_lookup(lookup(&[("BLACKBOOK_LOG_JSON", "maybe")])).is_err());
    }
}
