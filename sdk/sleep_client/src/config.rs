use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ValidationError};

pub const DEFAULT_DOMAIN_NAME: &str = "SleepGuardDecryption";
pub const DEFAULT_DOMAIN_VERSION: &str = "1";
pub const DEFAULT_GRANT_DURATION_DAYS: u32 = 7;
pub const MAX_GRANT_DURATION_DAYS: u32 = 30;

/// Contracts deployed on one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Strkey of the sleep_guard contract.
    pub ledger: String,
    /// Strkey of the executor holding the ciphertexts.
    pub executor: String,
}

/// Client configuration, usually loaded from JSON.
///
/// ```json
/// {
///   "networks": { "testnet": { "ledger": "C...", "executor": "C..." } },
///   "grant_duration_days": 7
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub networks: BTreeMap<String, NetworkConfig>,
    #[serde(default = "default_domain_name")]
    pub domain_name: String,
    #[serde(default = "default_domain_version")]
    pub domain_version: String,
    #[serde(default = "default_grant_duration_days")]
    pub grant_duration_days: u32,
}

fn default_domain_name() -> String {
    DEFAULT_DOMAIN_NAME.to_string()
}

fn default_domain_version() -> String {
    DEFAULT_DOMAIN_VERSION.to_string()
}

fn default_grant_duration_days() -> u32 {
    DEFAULT_GRANT_DURATION_DAYS
}

impl ClientConfig {
    pub fn new() -> Self {
        Self {
            networks: BTreeMap::new(),
            domain_name: default_domain_name(),
            domain_version: default_domain_version(),
            grant_duration_days: DEFAULT_GRANT_DURATION_DAYS,
        }
    }

    pub fn with_network(mut self, name: &str, ledger: &str, executor: &str) -> Self {
        self.networks.insert(
            name.to_string(),
            NetworkConfig {
                ledger: ledger.to_string(),
                executor: executor.to_string(),
            },
        );
        self
    }

    pub fn from_json(json: &str) -> Result<Self, ClientError> {
        let config: ClientConfig =
            serde_json::from_str(json).map_err(|e| ClientError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        validate_grant_duration(self.grant_duration_days)?;
        if self.domain_name.is_empty() || self.domain_version.is_empty() {
            return Err(ClientError::Config("grant domain must be named".into()));
        }
        for (name, net) in &self.networks {
            if net.ledger.is_empty() || net.executor.is_empty() {
                return Err(ClientError::Config(format!("network {name} is incomplete")));
            }
        }
        Ok(())
    }

    /// Contracts registered for `network`.
    pub fn ledger_for(&self, network: &str) -> Result<&NetworkConfig, ClientError> {
        self.networks
            .get(network)
            .ok_or_else(|| ClientError::Config(format!("no ledger registered for {network}")))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate_grant_duration(days: u32) -> Result<(), ValidationError> {
    if !(1..=MAX_GRANT_DURATION_DAYS).contains(&days) {
        return Err(ValidationError::GrantDuration(days));
    }
    Ok(())
}
