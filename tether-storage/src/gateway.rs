//! The storage gateway: the only path from the controller to the store.
//!
//! Two surfaces are exposed over one backend:
//!
//! - sentinel methods (`list_objects`, `download_object`, ...) that never
//!   fail. Errors are logged and converted to an empty sequence or `false`,
//!   which callers must read as "unknown or absent", not as a confirmed
//!   negative.
//! - `try_*` twins returning [`GatewayResult`], for workspace crates that
//!   need to tell a failed refresh apart from an empty store.
//!
//! The session is established lazily on first use, at most once, even
//! when several first calls race.

use crate::backend::{Session, StoreBackend};
use crate::error::{GatewayError, GatewayResult};
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tether_core::{BlobEntry, Container, Table};
use tokio::sync::OnceCell;

// ============================================================================
// RETRY POLICY
// ============================================================================

/// Backoff schedule for idempotent reads.
///
/// Writes (`insert_row`, `upload_object`, `delete_object`) are attempted
/// exactly once regardless of policy.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_ms: u64,
    pub max_ms: u64,
    pub multiplier: f64,
    #[serde(default)]
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_ms: 200,
            max_ms: 2_000,
            multiplier: 2.0,
            jitter_ms: 50,
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no backoff.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_ms: 1,
            max_ms: 1,
            multiplier: 1.0,
            jitter_ms: 0,
        }
    }

    /// Delay before attempt `attempt + 1`, without jitter.
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let mut delay = self.initial_ms;
        for _ in 1..attempt {
            delay = ((delay as f64 * self.multiplier) as u64).min(self.max_ms);
        }
        delay.min(self.max_ms)
    }

    async fn run<T, F, Fut>(&self, op: &'static str, mut attempt_fn: F) -> GatewayResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = jittered_backoff(self.backoff_ms(attempt), self.jitter_ms);
                    tracing::debug!(op, attempt, delay_ms = delay, error = %err, "retrying store read");
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn jittered_backoff(base_ms: u64, jitter_ms: u64) -> u64 {
    if jitter_ms == 0 {
        return base_ms;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_nanos(0))
        .subsec_nanos() as u64;
    let jitter = nanos % jitter_ms;
    base_ms.saturating_add(jitter)
}

// ============================================================================
// GATEWAY
// ============================================================================

/// Shared client over one store backend.
///
/// The session is established on first use and then kept for the life of
/// the gateway; it is never renewed. Once the store rejects the token,
/// every primitive reports failure until a new gateway is built.
pub struct StorageGateway {
    backend: Arc<dyn StoreBackend>,
    session: OnceCell<Session>,
    retry: RetryPolicy,
}

impl StorageGateway {
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self {
            backend,
            session: OnceCell::new(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Whether a session has been established.
    pub fn is_authenticated(&self) -> bool {
        self.session.initialized()
    }

    async fn session(&self) -> GatewayResult<&Session> {
        let backend = &*self.backend;
        self.session
            .get_or_try_init(|| async move {
                tracing::debug!("establishing store session");
                backend.authenticate().await
            })
            .await
            .map_err(|err| {
                tracing::error!(error = %err, "store session could not be established");
                match err {
                    GatewayError::Session { .. } => err,
                    other => GatewayError::Session {
                        reason: other.to_string(),
                    },
                }
            })
    }

    // ------------------------------------------------------------------------
    // Fallible surface
    // ------------------------------------------------------------------------

    pub async fn try_list_objects(&self, container: Container) -> GatewayResult<Vec<BlobEntry>> {
        let session = self.session().await?;
        let backend = &*self.backend;
        self.retry
            .run("list_objects", move || backend.list_objects(session, container))
            .await
    }

    pub async fn try_download_object(
        &self,
        container: Container,
        path: &str,
    ) -> GatewayResult<Vec<u8>> {
        let session = self.session().await?;
        let backend = &*self.backend;
        self.retry
            .run("download_object", move || {
                backend.download_object(session, container, path)
            })
            .await
    }

    pub async fn try_upload_object(
        &self,
        container: Container,
        path: &str,
        bytes: &[u8],
        overwrite: bool,
    ) -> GatewayResult<()> {
        let session = self.session().await?;
        self.backend
            .upload_object(session, container, path, bytes, overwrite)
            .await
    }

    pub async fn try_delete_object(&self, container: Container, path: &str) -> GatewayResult<()> {
        let session = self.session().await?;
        self.backend.delete_object(session, container, path).await
    }

    pub async fn try_insert_row(&self, table: Table, record: &Value) -> GatewayResult<()> {
        let session = self.session().await?;
        self.backend.insert_row(session, table, record).await
    }

    pub async fn try_select_rows(&self, table: Table) -> GatewayResult<Vec<Value>> {
        let session = self.session().await?;
        let backend = &*self.backend;
        self.retry
            .run("select_rows", move || backend.select_rows(session, table))
            .await
    }

    // ------------------------------------------------------------------------
    // Sentinel surface
    // ------------------------------------------------------------------------

    /// List a container; empty on any failure.
    pub async fn list_objects(&self, container: Container) -> Vec<BlobEntry> {
        match self.try_list_objects(container).await {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(container = %container, error = %err, "list failed");
                Vec::new()
            }
        }
    }

    /// Download an object; empty bytes when absent or on any failure.
    pub async fn download_object(&self, container: Container, path: &str) -> Vec<u8> {
        match self.try_download_object(container, path).await {
            Ok(bytes) => bytes,
            Err(err) if err.is_not_found() => {
                tracing::debug!(container = %container, path, "object absent");
                Vec::new()
            }
            Err(err) => {
                tracing::warn!(container = %container, path, error = %err, "download failed");
                Vec::new()
            }
        }
    }

    /// Upload an object; `true` only when the store confirmed the write.
    pub async fn upload_object(
        &self,
        container: Container,
        path: &str,
        bytes: &[u8],
        overwrite: bool,
    ) -> bool {
        match self.try_upload_object(container, path, bytes, overwrite).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(container = %container, path, error = %err, "upload failed");
                false
            }
        }
    }

    /// Delete an object; `true` only when the store confirmed the delete.
    pub async fn delete_object(&self, container: Container, path: &str) -> bool {
        match self.try_delete_object(container, path).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(container = %container, path, error = %err, "delete failed");
                false
            }
        }
    }

    /// Insert a row; `true` only when the store confirmed the insert.
    pub async fn insert_row(&self, table: Table, record: &Value) -> bool {
        match self.try_insert_row(table, record).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(table = %table, error = %err, "insert failed");
                false
            }
        }
    }

    /// Read a table; empty on any failure.
    pub async fn select_rows(&self, table: Table) -> Vec<Value> {
        match self.try_select_rows(table).await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(table = %table, error = %err, "select failed");
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for StorageGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageGateway")
            .field("authenticated", &self.is_authenticated())
            .field("retry", &self.retry)
            .finish()
    }
}
