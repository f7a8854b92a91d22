use serde::Deserialize;
use std::time::Duration;

use crate::ledger::models::DEFAULT_SETTLEMENT_CATEGORY;

/// Environment variable prefix, e.g. `RECEIVABLES_DATABASE_URL`
pub const ENV_PREFIX: &str = "RECEIVABLES";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub settlement_category: String,
    pub ledger_retry_interval_secs: u64,
    pub ledger_retry_grace_secs: u64,
}

impl Config {
    /// Load `.env` (if any) and the `RECEIVABLES_*` environment on top of defaults
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        Self::from_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    fn from_source<S>(source: S) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        config::Config::builder()
            .set_default("database_url", "postgresql://localhost/receivables")?
            .set_default("max_connections", 10)?
            .set_default("settlement_category", DEFAULT_SETTLEMENT_CATEGORY)?
            .set_default("ledger_retry_interval_secs", 300)?
            .set_default("ledger_retry_grace_secs", 120)?
            .add_source(source)
            .build()?
            .try_deserialize()
    }

    pub fn ledger_retry_interval(&self) -> Duration {
        Duration::from_secs(self.ledger_retry_interval_secs)
    }

    pub fn ledger_retry_grace(&self) -> Duration {
        Duration::from_secs(self.ledger_retry_grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Config {
        let env: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let source = config::Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .source(Some(env));
        Config::from_source(source).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]);
        assert_eq!(config.database_url, "postgresql://localhost/receivables");
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.settlement_category, DEFAULT_SETTLEMENT_CATEGORY);
        assert_eq!(config.ledger_retry_interval(), Duration::from_secs(300));
        assert_eq!(config.ledger_retry_grace(), Duration::from_secs(120));
    }

    #[test]
    fn test_environment_overrides() {
        let config = load(&[
            ("RECEIVABLES_DATABASE_URL", "postgresql://db/branch"),
            ("RECEIVABLES_MAX_CONNECTIONS", "4"),
            ("RECEIVABLES_LEDGER_RETRY_INTERVAL_SECS", "30"),
        ]);
        assert_eq!(config.database_url, "postgresql://db/branch");
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.ledger_retry_interval_secs, 30);
    }
}
