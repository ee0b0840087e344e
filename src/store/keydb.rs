//! KeyDB / Redis backed [`Store`].
//!
//! Builds a [`fred::clients::Pool`] for one endpoint described by an
//! [`EndpointConfig`], optionally enabling TLS via `rustls` and reading the
//! auth token from an environment variable.

use std::time::Duration;

use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use bytes::Bytes;
use fred::clients::Pool;
use fred::interfaces::{ClientLike, KeysInterface, ListInterface, SortedSetsInterface};
use fred::types::config::{Config as FredConfig, ReconnectPolicy, ServerConfig, TlsConnector};
use fred::types::{Builder, Expiration, SetOptions, Value};
use tracing::trace;

use super::{key_ttl_from_pttl, ttl_millis, KeyTtl, Store};
use crate::config::EndpointConfig;
use crate::error::{Error, Result};

/// [`Store`] over a `fred` connection pool.
#[derive(Clone)]
pub struct KeyDbStore {
    pool: Pool,
}

impl KeyDbStore {
    /// Wrap an already initialised pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Build, connect and PING-verify a pool for `endpoint`.
    pub async fn connect(endpoint: &EndpointConfig, pool_size: usize) -> AnyResult<Self> {
        let pool = create_pool(endpoint, pool_size).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

/// Create a KeyDB connection pool for one endpoint.
///
/// The pool is initialised (connected + PING verified) before being returned.
/// The auth token is read from the environment variable whose name is given
/// in `endpoint.auth_token_env`; a missing variable means no password.
pub async fn create_pool(endpoint: &EndpointConfig, pool_size: usize) -> AnyResult<Pool> {
    let auth_token = std::env::var(&endpoint.auth_token_env).ok();

    let (host, port) = parse_host_port(endpoint.host_port())?;

    let mut fred_config = FredConfig {
        server: ServerConfig::new_centralized(host, port),
        ..FredConfig::default()
    };

    if endpoint.tls {
        fred_config.tls = Some(TlsConnector::default_rustls()?.into());
    }

    if let Some(token) = auth_token {
        fred_config.password = Some(token);
    }

    let mut builder = Builder::from_config(fred_config);

    // Exponential reconnect: initial 0ms, base 100ms, max 30s, factor 2.
    builder.set_policy(ReconnectPolicy::new_exponential(0, 100, 30_000, 2));

    let pool = builder
        .build_pool(pool_size)
        .context("failed to build KeyDB connection pool")?;

    pool.init().await.context("failed to connect to KeyDB")?;

    let _: String = pool
        .ping(None)
        .await
        .context("KeyDB PING failed after connect")?;

    tracing::info!(
        host = host,
        port = port,
        tls = endpoint.tls,
        pool_size,
        "KeyDB pool created and verified"
    );

    Ok(pool)
}

/// Parse a `host:port` string.  If the port is omitted, defaults to `6379`.
pub fn parse_host_port(endpoint: &str) -> AnyResult<(&str, u16)> {
    // Strip any trailing path segments (e.g. from URIs).
    let endpoint = endpoint.split('/').next().unwrap_or(endpoint);

    if let Some((host, port_str)) = endpoint.rsplit_once(':') {
        let port: u16 = port_str
            .parse()
            .with_context(|| format!("invalid port in endpoint: {endpoint}"))?;
        Ok((host, port))
    } else {
        Ok((endpoint, 6379))
    }
}

// ---------------------------------------------------------------------------
// Reply helpers
// ---------------------------------------------------------------------------

fn into_wire(value: Value) -> Option<Bytes> {
    match value {
        Value::Null => None,
        Value::Bytes(bytes) => Some(bytes),
        other => other.as_bytes().map(Bytes::copy_from_slice),
    }
}

/// Decode a `[member, score]` reply from `ZPOPMIN` / `ZRANGE ... WITHSCORES`.
///
/// RESP3 servers nest the pair one level deeper, so a single-element outer
/// array is unwrapped first.  Only a nil or empty reply means "no member";
/// anything else that is not a member and a numeric score is an error, since
/// `ZPOPMIN` has already removed the member by then.
fn into_scored_member(command: &'static str, value: Value) -> Result<Option<(Bytes, f64)>> {
    if value.is_null() {
        return Ok(None);
    }
    let mut items = value.into_array();
    if items.is_empty() {
        return Ok(None);
    }
    if items.len() == 1 && matches!(items[0], Value::Array(_)) {
        items = items.remove(0).into_array();
    }
    let mut items = items.into_iter();
    let member = items.next().and_then(into_wire);
    let score = items.next().and_then(|score| score.as_f64());
    match (member, score, items.next()) {
        (Some(member), Some(score), None) => Ok(Some((member, score))),
        _ => Err(Error::Store {
            command,
            source: fred::error::Error::new(
                fred::error::ErrorKind::Parse,
                format!("expected [member, score] reply to {command}"),
            ),
        }),
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[async_trait]
impl Store for KeyDbStore {
    async fn lpush(&self, key: &str, value: Bytes) -> Result<u64> {
        let len: u64 = self
            .pool
            .lpush(key, value)
            .await
            .map_err(Error::store("LPUSH"))?;
        trace!(%key, len, "LPUSH");
        Ok(len)
    }

    async fn rpop(&self, key: &str) -> Result<Option<Bytes>> {
        let value: Value = self
            .pool
            .rpop(key, None)
            .await
            .map_err(Error::store("RPOP"))?;
        let popped = into_wire(value);
        trace!(%key, hit = popped.is_some(), "RPOP");
        Ok(popped)
    }

    async fn llen(&self, key: &str) -> Result<u64> {
        self.pool.llen(key).await.map_err(Error::store("LLEN"))
    }

    async fn zadd(&self, key: &str, score: f64, member: Bytes) -> Result<()> {
        let added: i64 = self
            .pool
            .zadd(key, None, None, false, false, (score, member))
            .await
            .map_err(Error::store("ZADD"))?;
        trace!(%key, score, added, "ZADD");
        Ok(())
    }

    async fn zpopmin(&self, key: &str) -> Result<Option<(Bytes, f64)>> {
        let value: Value = self
            .pool
            .zpopmin(key, None)
            .await
            .map_err(Error::store("ZPOPMIN"))?;
        let popped = into_scored_member("ZPOPMIN", value)?;
        trace!(%key, hit = popped.is_some(), "ZPOPMIN");
        Ok(popped)
    }

    async fn zpeekmin(&self, key: &str) -> Result<Option<(Bytes, f64)>> {
        let value: Value = self
            .pool
            .zrange(key, 0_i64, 0_i64, None, false, None, true)
            .await
            .map_err(Error::store("ZRANGE"))?;
        into_scored_member("ZRANGE", value)
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        self.pool.zcard(key).await.map_err(Error::store("ZCARD"))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.pool.exists(key).await.map_err(Error::store("EXISTS"))
    }

    async fn set_nx(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<bool> {
        let expiration = match ttl {
            Some(ttl) => Some(Expiration::PX(ttl_millis(ttl).ok_or_else(|| {
                Error::InvalidExpiration {
                    key: key.to_string(),
                }
            })?)),
            None => None,
        };
        let result: Option<String> = self
            .pool
            .set(key, value, expiration, Some(SetOptions::NX), false)
            .await
            .map_err(Error::store("SET"))?;
        // SET … NX returns "OK" when the key was set, nil otherwise.
        let written = result.is_some();
        trace!(%key, written, ?ttl, "SET NX");
        Ok(written)
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let removed: i64 = self.pool.del(key).await.map_err(Error::store("DEL"))?;
        trace!(%key, removed, "DEL");
        Ok(removed > 0)
    }

    async fn pttl(&self, key: &str) -> Result<KeyTtl> {
        let millis: i64 = self.pool.pttl(key).await.map_err(Error::store("PTTL"))?;
        Ok(key_ttl_from_pttl(millis))
    }

    async fn ping(&self) -> Result<()> {
        let _: String = self.pool.ping(None).await.map_err(Error::store("PING"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_port_with_port() {
        let (host, port) = parse_host_port("keydb.local:6380").unwrap();
        assert_eq!(host, "keydb.local");
        assert_eq!(port, 6380);
    }

    #[test]
    fn test_parse_host_port_default() {
        let (host, port) = parse_host_port("keydb.local").unwrap();
        assert_eq!(host, "keydb.local");
        assert_eq!(port, 6379);
    }

    #[test]
    fn test_parse_host_port_strips_path() {
        let (host, port) = parse_host_port("keydb.local:6380/0").unwrap();
        assert_eq!(host, "keydb.local");
        assert_eq!(port, 6380);
    }

    #[test]
    fn nil_reply_is_absent() {
        assert_eq!(into_wire(Value::Null), None);
        assert_eq!(
            into_wire(Value::Bytes(Bytes::from_static(b""))),
            Some(Bytes::new())
        );
    }

    #[test]
    fn flat_scored_reply_is_decoded() {
        let reply = Value::Array(vec![
            Value::Bytes(Bytes::from_static(b"job-1")),
            Value::Double(2.5),
        ]);
        assert_eq!(
            into_scored_member("ZPOPMIN", reply).unwrap(),
            Some((Bytes::from_static(b"job-1"), 2.5))
        );
    }

    #[test]
    fn nested_scored_reply_is_decoded() {
        let reply = Value::Array(vec![Value::Array(vec![
            Value::Bytes(Bytes::from_static(b"job-2")),
            Value::Double(-1.0),
        ])]);
        assert_eq!(
            into_scored_member("ZPOPMIN", reply).unwrap(),
            Some((Bytes::from_static(b"job-2"), -1.0))
        );
    }

    #[test]
    fn empty_scored_reply_is_absent() {
        assert_eq!(
            into_scored_member("ZPOPMIN", Value::Array(Vec::new())).unwrap(),
            None
        );
        assert_eq!(into_scored_member("ZPOPMIN", Value::Null).unwrap(), None);
    }

    #[test]
    fn malformed_scored_reply_is_an_error() {
        let missing_score = Value::Array(vec![Value::Bytes(Bytes::from_static(b"job-3"))]);
        let bad_score = Value::Array(vec![
            Value::Bytes(Bytes::from_static(b"job-4")),
            Value::Bytes(Bytes::from_static(b"not-a-number")),
        ]);
        for reply in [missing_score, bad_score] {
            let err = into_scored_member("ZPOPMIN", reply).unwrap_err();
            assert!(matches!(err, Error::Store { command: "ZPOPMIN", .. }));
        }
    }
}
