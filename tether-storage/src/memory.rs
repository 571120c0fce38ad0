//! In-memory backend for tests and offline runs.
//!
//! Buckets are ordered by key so listings are deterministic. Every
//! operation can be switched to fail, and every call is counted, so tests
//! can assert both outcomes and the absence of retries.

use crate::backend::{Session, StoreBackend};
use crate::error::{GatewayError, GatewayResult};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tether_core::{BlobEntry, Container, EntryKind, Table, Timestamp};

/// Backend operation, used to inject failures and count calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Authenticate,
    List,
    Download,
    Upload,
    Delete,
    Insert,
    Select,
}

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    updated_at: Timestamp,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: RwLock<HashMap<Container, BTreeMap<String, StoredObject>>>,
    tables: RwLock<HashMap<Table, Vec<Value>>>,
    failing: RwLock<HashSet<Operation>>,
    calls: RwLock<HashMap<Operation, usize>>,
    auth_latency: RwLock<Option<Duration>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `op` fail (or succeed again) from now on.
    pub fn fail(&self, op: Operation, failing: bool) {
        let mut set = write(&self.failing);
        if failing {
            set.insert(op);
        } else {
            set.remove(&op);
        }
    }

    /// Number of times `op` reached the backend.
    pub fn calls(&self, op: Operation) -> usize {
        read(&self.calls).get(&op).copied().unwrap_or(0)
    }

    /// Delay every login, to widen race windows in tests.
    pub fn set_auth_latency(&self, latency: Duration) {
        *write(&self.auth_latency) = Some(latency);
    }

    pub fn put_object(&self, container: Container, path: impl Into<String>, bytes: Vec<u8>) {
        write(&self.objects).entry(container).or_default().insert(
            path.into(),
            StoredObject {
                bytes,
                updated_at: Utc::now(),
            },
        );
    }

    pub fn object(&self, container: Container, path: &str) -> Option<Vec<u8>> {
        read(&self.objects)
            .get(&container)
            .and_then(|bucket| bucket.get(path))
            .map(|o| o.bytes.clone())
    }

    pub fn push_row(&self, table: Table, row: Value) {
        write(&self.tables).entry(table).or_default().push(row);
    }

    pub fn rows(&self, table: Table) -> Vec<Value> {
        read(&self.tables).get(&table).cloned().unwrap_or_default()
    }

    fn enter(&self, op: Operation) -> GatewayResult<()> {
        *write(&self.calls).entry(op).or_insert(0) += 1;
        if read(&self.failing).contains(&op) {
            return Err(match op {
                Operation::Authenticate => GatewayError::Session {
                    reason: "injected authentication failure".to_string(),
                },
                other => GatewayError::Unavailable {
                    reason: format!("injected {:?} failure", other),
                },
            });
        }
        Ok(())
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn authenticate(&self) -> GatewayResult<Session> {
        let latency = *read(&self.auth_latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.enter(Operation::Authenticate)?;
        Ok(Session::anonymous())
    }

    async fn list_objects(
        &self,
        _session: &Session,
        container: Container,
    ) -> GatewayResult<Vec<BlobEntry>> {
        self.enter(Operation::List)?;
        let objects = read(&self.objects);
        let entries = objects
            .get(&container)
            .map(|bucket| {
                bucket
                    .iter()
                    .map(|(path, object)| BlobEntry {
                        name: path.clone(),
                        path: path.clone(),
                        size_bytes: object.bytes.len() as u64,
                        container,
                        kind: EntryKind::Object,
                        last_modified: Some(object.updated_at),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(entries)
    }

    async fn download_object(
        &self,
        _session: &Session,
        container: Container,
        path: &str,
    ) -> GatewayResult<Vec<u8>> {
        self.enter(Operation::Download)?;
        self.object(container, path)
            .ok_or_else(|| GatewayError::NotFound {
                container,
                path: path.to_string(),
            })
    }

    async fn upload_object(
        &self,
        _session: &Session,
        container: Container,
        path: &str,
        bytes: &[u8],
        overwrite: bool,
    ) -> GatewayResult<()> {
        self.enter(Operation::Upload)?;
        let mut objects = write(&self.objects);
        let bucket = objects.entry(container).or_default();
        if !overwrite && bucket.contains_key(path) {
            return Err(GatewayError::Status {
                status: 409,
                body: "The resource already exists".to_string(),
            });
        }
        bucket.insert(
            path.to_string(),
            StoredObject {
                bytes: bytes.to_vec(),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete_object(
        &self,
        _session: &Session,
        container: Container,
        path: &str,
    ) -> GatewayResult<()> {
        self.enter(Operation::Delete)?;
        if let Some(bucket) = write(&self.objects).get_mut(&container) {
            bucket.remove(path);
        }
        Ok(())
    }

    async fn insert_row(
        &self,
        _session: &Session,
        table: Table,
        record: &Value,
    ) -> GatewayResult<()> {
        self.enter(Operation::Insert)?;
        self.push_row(table, record.clone());
        Ok(())
    }

    async fn select_rows(&self, _session: &Session, table: Table) -> GatewayResult<Vec<Value>> {
        self.enter(Operation::Select)?;
        Ok(self.rows(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_listing_is_ordered_by_key() {
        let backend = MemoryBackend::new();
        backend.put_object(Container::Location, "b.json", b"{}".to_vec());
        backend.put_object(Container::Location, "a.json", b"{}".to_vec());
        backend.put_object(Container::Logs, "x.log", b"x".to_vec());

        let session = backend.authenticate().await.unwrap();
        let entries = backend
            .list_objects(&session, Container::Location)
            .await
            .unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
        assert!(entries.iter().all(|e| e.container == Container::Location));
        assert_eq!(entries[0].size_bytes, 2);
    }

    #[tokio::test]
    async fn test_delete_of_absent_object_is_ok() {
        let backend = MemoryBackend::new();
        let session = backend.authenticate().await.unwrap();
        assert!(backend
            .delete_object(&session, Container::Files, "ghost")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_injected_failures_are_counted() {
        let backend = MemoryBackend::new();
        let session = backend.authenticate().await.unwrap();
        backend.fail(Operation::Select, true);

        assert!(backend.select_rows(&session, Table::Devices).await.is_err());
        assert!(backend.select_rows(&session, Table::Devices).await.is_err());
        assert_eq!(backend.calls(Operation::Select), 2);

        backend.fail(Operation::Select, false);
        backend.push_row(Table::Devices, json!({"android_id": "d1"}));
        assert_eq!(
            backend.select_rows(&session, Table::Devices).await.unwrap().len(),
            1
        );
    }
}
