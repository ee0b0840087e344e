use serde::Serialize;
use tracing::warn;

use crate::router::ReplicaRouter;
use crate::store::Store;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub primary: CheckResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replica: Option<CheckResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CheckResult {
    fn healthy() -> Self {
        Self {
            ok: true,
            detail: None,
        }
    }

    fn unhealthy(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: Some(detail.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

async fn check_store<S: Store + ?Sized>(store: &S, role: &str) -> CheckResult {
    match store.ping().await {
        Ok(()) => CheckResult::healthy(),
        Err(e) => {
            warn!(error = %e, %role, "store health check failed");
            CheckResult::unhealthy(format!("PING failed: {e}"))
        }
    }
}

fn aggregate_status(primary: &CheckResult, replica: Option<&CheckResult>) -> HealthStatus {
    // Writes need the primary; a dead replica only costs read scaling.
    if !primary.ok {
        HealthStatus::Unhealthy
    } else if replica.is_some_and(|r| !r.ok) {
        HealthStatus::Degraded
    } else {
        HealthStatus::Ok
    }
}

/// PING the primary and replica concurrently.
pub async fn check_router<S: Store + ?Sized>(router: &ReplicaRouter<S>) -> HealthReport {
    let replica_check = async {
        match router.replica() {
            Some(replica) => Some(check_store(replica.as_ref(), "replica").await),
            None => None,
        }
    };
    let (primary, replica) = tokio::join!(
        check_store(router.primary().as_ref(), "primary"),
        replica_check
    );

    let status = aggregate_status(&primary, replica.as_ref());
    HealthReport {
        status,
        primary,
        replica,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;
    use crate::error::{Error, Result};
    use crate::store::{KeyTtl, MemoryStore};

    /// Store whose every command fails as if the connection were down.
    struct Unreachable;

    fn down() -> Error {
        Error::Store {
            command: "PING",
            source: fred::error::Error::new(fred::error::ErrorKind::IO, "connection refused"),
        }
    }

    #[async_trait]
    impl Store for Unreachable {
        async fn lpush(&self, _: &str, _: Bytes) -> Result<u64> {
            Err(down())
        }
        async fn rpop(&self, _: &str) -> Result<Option<Bytes>> {
            Err(down())
        }
        async fn llen(&self, _: &str) -> Result<u64> {
            Err(down())
        }
        async fn zadd(&self, _: &str, _: f64, _: Bytes) -> Result<()> {
            Err(down())
        }
        async fn zpopmin(&self, _: &str) -> Result<Option<(Bytes, f64)>> {
            Err(down())
        }
        async fn zpeekmin(&self, _: &str) -> Result<Option<(Bytes, f64)>> {
            Err(down())
        }
        async fn zcard(&self, _: &str) -> Result<u64> {
            Err(down())
        }
        async fn exists(&self, _: &str) -> Result<bool> {
            Err(down())
        }
        async fn set_nx(&self, _: &str, _: Bytes, _: Option<Duration>) -> Result<bool> {
            Err(down())
        }
        async fn del(&self, _: &str) -> Result<bool> {
            Err(down())
        }
        async fn pttl(&self, _: &str) -> Result<KeyTtl> {
            Err(down())
        }
        async fn ping(&self) -> Result<()> {
            Err(down())
        }
    }

    #[tokio::test]
    async fn all_reachable_is_ok() {
        let router = ReplicaRouter::new(
            Arc::new(MemoryStore::new()),
            Some(Arc::new(MemoryStore::new())),
        );
        let report = check_router(&router).await;
        assert_eq!(report.status, HealthStatus::Ok);
        assert!(report.replica.unwrap().ok);
    }

    #[tokio::test]
    async fn replica_down_is_degraded() {
        let primary: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let replica: Arc<dyn Store> = Arc::new(Unreachable);
        let report = check_router(&ReplicaRouter::new(primary, Some(replica))).await;
        assert_eq!(report.status, HealthStatus::Degraded);
        assert!(report.primary.ok);
    }

    #[tokio::test]
    async fn primary_down_is_unhealthy() {
        let report = check_router(&ReplicaRouter::primary_only(Arc::new(Unreachable))).await;
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert!(report.replica.is_none());
        let detail = report.primary.detail.unwrap();
        assert!(detail.starts_with("PING failed"));
    }

    #[tokio::test]
    async fn report_serializes_without_empty_fields() {
        let router = ReplicaRouter::primary_only(Arc::new(MemoryStore::new()));
        let json = serde_json::to_value(check_router(&router).await).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "ok", "primary": { "ok": true } }));
    }
}
