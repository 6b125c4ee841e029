//! Environment configuration.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `USE_PERSISTENT_STORES` | `false` | Postgres backend when `true`, in-memory otherwise |
//! | `DATABASE_URL` | (required when persistent) | Postgres connection string |
//! | `DATABASE_MAX_CONNECTIONS` | `10` | Pool size |
//! | `SOON_TO_BE_LOW_FACTOR` | `1.2` | Multiple of `min_quantity` for "soon to be low"; must be >= 1 |
//! | `LEDGER_PAGE_LIMIT` | `50` | Default ledger page size, capped at 1000 |

use std::str::FromStr;

use thiserror::Error;

use loomerp_inventory::StockThresholds;

use crate::store::query::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set when USE_PERSISTENT_STORES=true")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Where ledgers, journal and requisitions live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    InMemory,
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryConfig {
    pub backend: StorageBackend,
    pub thresholds: StockThresholds,
    pub page_limit: u32,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::InMemory,
            thresholds: StockThresholds::default(),
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl InventoryConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let use_persistent = match var("USE_PERSISTENT_STORES") {
            None => false,
            Some(raw) => raw.parse::<bool>().unwrap_or_else(|_| {
                tracing::warn!(
                    value = %raw,
                    "USE_PERSISTENT_STORES is not a bool, falling back to in-memory"
                );
                false
            }),
        };

        let backend = if use_persistent {
            let database_url = var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
            let max_connections = parse_or(
                "DATABASE_MAX_CONNECTIONS",
                var("DATABASE_MAX_CONNECTIONS"),
                DEFAULT_MAX_CONNECTIONS,
            )?;
            if max_connections == 0 {
                return Err(invalid("DATABASE_MAX_CONNECTIONS", "must be at least 1"));
            }
            StorageBackend::Postgres {
                database_url,
                max_connections,
            }
        } else {
            StorageBackend::InMemory
        };

        let factor = parse_or(
            "SOON_TO_BE_LOW_FACTOR",
            var("SOON_TO_BE_LOW_FACTOR"),
            StockThresholds::default().soon_to_be_low_factor,
        )?;
        let thresholds = StockThresholds::new(factor)
            .map_err(|e| invalid("SOON_TO_BE_LOW_FACTOR", e.to_string()))?;

        let page_limit: u32 =
            parse_or("LEDGER_PAGE_LIMIT", var("LEDGER_PAGE_LIMIT"), DEFAULT_PAGE_LIMIT)?;
        if page_limit == 0 {
            return Err(invalid("LEDGER_PAGE_LIMIT", "must be at least 1"));
        }

        Ok(Self {
            backend,
            thresholds,
            page_limit: page_limit.min(MAX_PAGE_LIMIT),
        })
    }
}

fn parse_or<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|e| invalid(name, format!("'{raw}': {e}"))),
    }
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<InventoryConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        InventoryConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_to_in_memory() {
        assert_eq!(config(&[]).unwrap(), InventoryConfig::default());
    }

    #[test]
    fn persistent_requires_database_url() {
        let err = config(&[("USE_PERSISTENT_STORES", "true")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("DATABASE_URL"));

        let cfg = config(&[
            ("USE_PERSISTENT_STORES", "true"),
            ("DATABASE_URL", "postgres://localhost/yarn"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
        ])
        .unwrap();
        assert_eq!(
            cfg.backend,
            StorageBackend::Postgres {
                database_url: "postgres://localhost/yarn".to_string(),
                max_connections: 4,
            }
        );
    }

    #[test]
    fn factor_and_page_limit_are_validated() {
        assert!(config(&[("SOON_TO_BE_LOW_FACTOR", "0.5")]).is_err());
        assert!(config(&[("SOON_TO_BE_LOW_FACTOR", "abc")]).is_err());
        assert!(config(&[("LEDGER_PAGE_LIMIT", "0")]).is_err());

        let cfg = config(&[
            ("SOON_TO_BE_LOW_FACTOR", "1.5"),
            ("LEDGER_PAGE_LIMIT", "5000"),
        ])
        .unwrap();
        assert_eq!(cfg.thresholds.soon_to_be_low_factor, dec!(1.5));
        assert_eq!(cfg.page_limit, MAX_PAGE_LIMIT);
    }

    #[test]
    fn pool_size_must_be_a_positive_integer() {
        let persistent = |size: &'static str| {
            config(&[
                ("USE_PERSISTENT_STORES", "true"),
                ("DATABASE_URL", "postgres://localhost/yarn"),
                ("DATABASE_MAX_CONNECTIONS", size),
            ])
        };
        assert!(persistent("0").is_err());
        assert!(persistent("ten").is_err());
        assert!(matches!(
            persistent("").unwrap().backend,
            StorageBackend::Postgres { max_connections: DEFAULT_MAX_CONNECTIONS, .. }
        ));
    }

    #[test]
    fn unparsable_persistence_flag_falls_back_to_in_memory() {
        let cfg = config(&[("USE_PERSISTENT_STORES", "maybe")]).unwrap();
        assert_eq!(cfg.backend, StorageBackend::InMemory);
    }
}
