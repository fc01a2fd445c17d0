//! Runtime configuration from the environment
//!
//! `.env` is loaded first when present. The store location is mandatory: the
//! process refuses to start without it.

use std::env;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Where content lives
#[derive(Debug, Clone, PartialEq)]
pub enum StoreConfig {
    /// Single redb file on local disk
    Embedded { path: PathBuf },

    /// Hosted database + storage HTTP API
    Hosted { url: String, key: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub store: StoreConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source
    ///
    /// - `STORE_URL` (required): `http(s)://…` for the hosted API,
    ///   `redb:<path>` or a plain path for the embedded store
    /// - `STORE_KEY`: API key, required for the hosted API
    /// - `PORT`: listen port, default 8080
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let present = |name: &'static str| lookup(name).filter(|v| !v.trim().is_empty());

        let url = present("STORE_URL").ok_or(ConfigError::Missing("STORE_URL"))?;
        let store = if url.starts_with("http://") || url.starts_with("https://") {
            let key = present("STORE_KEY").ok_or(ConfigError::Missing("STORE_KEY"))?;
            StoreConfig::Hosted {
                url: url.trim_end_matches('/').to_string(),
                key,
            }
        } else {
            let path = url.strip_prefix("redb:").unwrap_or(&url);
            StoreConfig::Embedded {
                path: PathBuf::from(path),
            }
        };

        let port = match present("PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value,
            })?,
            None => 8080,
        };

        Ok(Config { port, store })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_store_url_is_required() {
        assert_eq!(load(&[]), Err(ConfigError::Missing("STORE_URL")));
        assert_eq!(load(&[("STORE_URL", "  ")]), Err(ConfigError::Missing("STORE_URL")));
    }

    #[test]
    fn test_hosted_store_requires_key() {
        assert_eq!(
            load(&[("STORE_URL", "https://project.example.co")]),
            Err(ConfigError::Missing("STORE_KEY"))
        );

        let config = load(&[("STORE_URL", "https://project.example.co/"), ("STORE_KEY", "k")]).unwrap();
        assert_eq!(
            config.store,
            StoreConfig::Hosted {
                url: "https://project.example.co".to_string(),
                key: "k".to_string()
            }
        );
    }

    #[test]
    fn test_embedded_store_and_port() {
        let config = load(&[("STORE_URL", "redb:data/links.db"), ("PORT", "3000")]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(
            config.store,
            StoreConfig::Embedded { path: PathBuf::from("data/links.db") }
        );

        assert!(matches!(
            load(&[("STORE_URL", "data.db"), ("PORT", "http")]),
            Err(ConfigError::Invalid { name: "PORT", .. })
        ));
    }
}
