use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::store::keydb::parse_host_port;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Connection settings for the store behind a [`crate::ReplicaRouter`].
///
/// ```yaml
/// primary:
///   endpoint: rediss://keydb-0.internal:6380
/// replica:
///   endpoint: rediss://keydb-1.internal:6380
/// pool_size: 8
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Master node.  Every mutating command goes here.
    pub primary: EndpointConfig,
    /// Optional read replica.  Reads fall back to the primary when absent.
    #[serde(default)]
    pub replica: Option<EndpointConfig>,
    /// Connections per pool.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_pool_size() -> usize {
    4
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    /// Connection string (e.g. `rediss://keydb.local:6380`).
    pub endpoint: String,
    /// Enable TLS for the connection.
    #[serde(default = "bool_true")]
    pub tls: bool,
    /// Name of the environment variable that holds the auth token.
    #[serde(default = "default_auth_token_env")]
    pub auth_token_env: String,
}

impl EndpointConfig {
    /// Endpoint with the scheme prefix removed.
    pub fn host_port(&self) -> &str {
        self.endpoint
            .trim_start_matches("rediss://")
            .trim_start_matches("redis://")
    }
}

fn bool_true() -> bool {
    true
}

fn default_auth_token_env() -> String {
    "KEYDB_AUTH_TOKEN".to_string()
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load and validate a [`StoreConfig`] from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<StoreConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    parse_config(&contents)
        .with_context(|| format!("failed to load config file: {}", path.display()))
}

/// Parse and validate a [`StoreConfig`] from YAML text.
pub fn parse_config(contents: &str) -> Result<StoreConfig> {
    let config: StoreConfig =
        serde_yaml::from_str(contents).context("failed to parse store config")?;
    validate_config(&config)?;
    Ok(config)
}

/// Sanity checks that cannot be expressed purely with serde.
fn validate_config(config: &StoreConfig) -> Result<()> {
    anyhow::ensure!(config.pool_size >= 1, "pool_size must be at least 1");
    validate_endpoint(&config.primary).context("invalid primary endpoint")?;
    if let Some(replica) = &config.replica {
        validate_endpoint(replica).context("invalid replica endpoint")?;
    }
    Ok(())
}

fn validate_endpoint(endpoint: &EndpointConfig) -> Result<()> {
    let (host, _port) = parse_host_port(endpoint.host_port())?;
    anyhow::ensure!(!host.is_empty(), "endpoint host must not be empty");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = parse_config("primary:\n  endpoint: keydb.local\n").unwrap();
        assert_eq!(config.primary.endpoint, "keydb.local");
        assert!(config.primary.tls);
        assert_eq!(config.primary.auth_token_env, "KEYDB_AUTH_TOKEN");
        assert!(config.replica.is_none());
        assert_eq!(config.pool_size, 4);
    }

    #[test]
    fn replica_section_is_parsed() {
        let yaml = r#"
primary:
  endpoint: rediss://keydb-0.internal:6380
replica:
  endpoint: redis://keydb-1.internal:6381
  tls: false
  auth_token_env: REPLICA_TOKEN
pool_size: 2
"#;
        let config = parse_config(yaml).unwrap();
        let replica = config.replica.unwrap();
        assert_eq!(replica.host_port(), "keydb-1.internal:6381");
        assert!(!replica.tls);
        assert_eq!(replica.auth_token_env, "REPLICA_TOKEN");
        assert_eq!(config.primary.host_port(), "keydb-0.internal:6380");
        assert_eq!(config.pool_size, 2);
    }

    #[test]
    fn zero_pool_size_is_rejected() {
        let err = parse_config("primary:\n  endpoint: keydb.local\npool_size: 0\n").unwrap_err();
        assert!(err.to_string().contains("pool_size"));
    }

    #[test]
    fn bad_port_is_rejected() {
        let err = parse_config("primary:\n  endpoint: keydb.local:notaport\n").unwrap_err();
        assert!(format!("{err:#}").contains("invalid port"));
    }

    #[test]
    fn empty_host_is_rejected() {
        assert!(parse_config("primary:\n  endpoint: \"redis://:6379\"\n").is_err());
    }

    #[test]
    fn missing_primary_is_rejected() {
        assert!(parse_config("pool_size: 2\n").is_err());
    }
}
