//! Backend trait for the hosted table + bucket service.
//!
//! Backends are fallible and know nothing about sessions being shared or
//! retried; `StorageGateway` layers that on top.

use crate::error::GatewayResult;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::fmt;
use tether_core::{BlobEntry, Container, Table};

/// Authenticated session handle returned by [`StoreBackend::authenticate`].
pub struct Session {
    access_token: Option<SecretString>,
}

impl Session {
    /// Session for backends that need no credentials.
    pub fn anonymous() -> Self {
        Self { access_token: None }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            access_token: Some(SecretString::from(token.into())),
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_ref().map(|t| t.expose_secret())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Raw access to the backing store.
///
/// Every method may fail; implementations must not panic on remote input.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Log in and return a session usable by every other call.
    async fn authenticate(&self) -> GatewayResult<Session>;

    /// List every object in a container, ordered by key.
    async fn list_objects(
        &self,
        session: &Session,
        container: Container,
    ) -> GatewayResult<Vec<BlobEntry>>;

    /// Fetch an object body. Missing objects yield `GatewayError::NotFound`.
    async fn download_object(
        &self,
        session: &Session,
        container: Container,
        path: &str,
    ) -> GatewayResult<Vec<u8>>;

    /// Store an object body, replacing an existing one only if `overwrite`.
    async fn upload_object(
        &self,
        session: &Session,
        container: Container,
        path: &str,
        bytes: &[u8],
        overwrite: bool,
    ) -> GatewayResult<()>;

    /// Remove an object. Removing an absent object is not an error.
    async fn delete_object(
        &self,
        session: &Session,
        container: Container,
        path: &str,
    ) -> GatewayResult<()>;

    /// Append a row to a table.
    async fn insert_row(&self, session: &Session, table: Table, record: &Value)
        -> GatewayResult<()>;

    /// Read every row of a table.
    async fn select_rows(&self, session: &Session, table: Table) -> GatewayResult<Vec<Value>>;
}
