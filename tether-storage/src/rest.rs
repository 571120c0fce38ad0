//! HTTP backend for the hosted table + bucket service.
//!
//! Tables are reached through the REST interface (`/rest/v1/{table}`),
//! objects through the storage interface (`/storage/v1/object/...`), and
//! the session through a password grant (`/auth/v1/token`).

use crate::backend::{Session, StoreBackend};
use crate::error::{GatewayError, GatewayResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tether_core::{BlobEntry, Container, EntryKind, Table};

/// Objects requested per listing page.
const LIST_PAGE_SIZE: usize = 100;

/// Connection settings for [`RestBackend`].
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RestConfig {
    pub url: String,
    /// Project API key sent as `apikey` on every request.
    #[serde(deserialize_with = "secret")]
    pub api_key: SecretString,
    pub email: String,
    #[serde(deserialize_with = "secret")]
    pub password: SecretString,
    pub request_timeout_ms: u64,
}

fn secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: serde::Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

pub struct RestBackend {
    client: Client,
    base_url: String,
    api_key: SecretString,
    email: String,
    password: SecretString,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// One record of a bucket listing. Folder placeholders carry no `id`.
#[derive(Debug, Deserialize)]
struct ListedObject {
    name: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    metadata: Option<Value>,
}

impl RestBackend {
    pub fn new(config: RestConfig) -> GatewayResult<Self> {
        if config.url.trim().is_empty() {
            return Err(GatewayError::Config("url must not be empty".to_string()));
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            email: config.email,
            password: config.password,
        })
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.base_url, table.as_str())
    }

    fn object_url(&self, container: Container, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            container.as_str(),
            encode_object_path(path)
        )
    }

    fn headers(&self, session: &Session) -> GatewayResult<HeaderMap> {
        let api_key = self.api_key.expose_secret();
        let bearer = session.access_token().unwrap_or(api_key);
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("apikey"),
            HeaderValue::from_str(api_key).map_err(|e| GatewayError::Config(e.to_string()))?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", bearer))
                .map_err(|e| GatewayError::Config(e.to_string()))?,
        );
        Ok(headers)
    }

    async fn list_page(
        &self,
        session: &Session,
        container: Container,
        offset: usize,
    ) -> GatewayResult<Vec<ListedObject>> {
        let url = format!(
            "{}/storage/v1/object/list/{}",
            self.base_url,
            container.as_str()
        );
        let body = json!({
            "prefix": "",
            "limit": LIST_PAGE_SIZE,
            "offset": offset,
            "sortBy": {"column": "name", "order": "asc"},
        });
        let response = self
            .client
            .post(url)
            .headers(self.headers(session)?)
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.json::<Vec<ListedObject>>().await?)
    }
}

#[async_trait]
impl StoreBackend for RestBackend {
    async fn authenticate(&self) -> GatewayResult<Session> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.base_url);
        let response = self
            .client
            .post(url)
            .header("apikey", self.api_key.expose_secret())
            .json(&json!({
                "email": self.email,
                "password": self.password.expose_secret(),
            }))
            .send()
            .await
            .map_err(|e| GatewayError::Session {
                reason: e.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Session {
                reason: format!("HTTP {}: {}", status.as_u16(), body),
            });
        }
        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| GatewayError::Session {
                reason: format!("unreadable token response: {}", e),
            })?;
        tracing::info!(email = %self.email, "store session established");
        Ok(Session::bearer(token.access_token))
    }

    async fn list_objects(
        &self,
        session: &Session,
        container: Container,
    ) -> GatewayResult<Vec<BlobEntry>> {
        let mut entries = Vec::new();
        let mut offset = 0;
        loop {
            let page = self.list_page(session, container, offset).await?;
            let page_len = page.len();
            entries.extend(page.into_iter().map(|item| listed_to_entry(container, item)));
            if page_len < LIST_PAGE_SIZE {
                break;
            }
            offset += page_len;
        }
        Ok(entries)
    }

    async fn download_object(
        &self,
        session: &Session,
        container: Container,
        path: &str,
    ) -> GatewayResult<Vec<u8>> {
        let response = self
            .client
            .get(self.object_url(container, path))
            .headers(self.headers(session)?)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if is_not_found(status, &body) {
                return Err(GatewayError::NotFound {
                    container,
                    path: path.to_string(),
                });
            }
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn upload_object(
        &self,
        session: &Session,
        container: Container,
        path: &str,
        bytes: &[u8],
        overwrite: bool,
    ) -> GatewayResult<()> {
        let response = self
            .client
            .post(self.object_url(container, path))
            .headers(self.headers(session)?)
            .header("x-upsert", if overwrite { "true" } else { "false" })
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn delete_object(
        &self,
        session: &Session,
        container: Container,
        path: &str,
    ) -> GatewayResult<()> {
        let response = self
            .client
            .delete(self.object_url(container, path))
            .headers(self.headers(session)?)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        if is_not_found(status, &body) {
            return Ok(());
        }
        Err(GatewayError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn insert_row(
        &self,
        session: &Session,
        table: Table,
        record: &Value,
    ) -> GatewayResult<()> {
        let response = self
            .client
            .post(self.table_url(table))
            .headers(self.headers(session)?)
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn select_rows(&self, session: &Session, table: Table) -> GatewayResult<Vec<Value>> {
        let response = self
            .client
            .get(self.table_url(table))
            .headers(self.headers(session)?)
            .query(&[("select", "*")])
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.json::<Vec<Value>>().await?)
    }
}

impl std::fmt::Debug for RestBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestBackend")
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

async fn ensure_success(response: Response) -> GatewayResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GatewayError::Status {
        status: status.as_u16(),
        body,
    })
}

/// The storage service reports missing objects either as 404 or as a 400
/// whose body carries a `not_found` error.
fn is_not_found(status: StatusCode, body: &str) -> bool {
    status == StatusCode::NOT_FOUND
        || (status == StatusCode::BAD_REQUEST
            && (body.contains("not_found") || body.contains("Object not found")))
}

/// Percent-encode each key segment; a leading separator is dropped.
fn encode_object_path(path: &str) -> String {
    path.trim_start_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn listed_to_entry(container: Container, item: ListedObject) -> BlobEntry {
    let size_bytes = item
        .metadata
        .as_ref()
        .and_then(|m| m.get("size"))
        .and_then(|size| match size {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse::<u64>().ok(),
            _ => None,
        })
        .unwrap_or(0);
    let last_modified = item
        .updated_at
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|at| at.with_timezone(&Utc));
    let kind = if item.id.is_none() {
        EntryKind::Directory
    } else {
        EntryKind::Object
    };
    BlobEntry {
        name: item.name.clone(),
        path: item.name,
        size_bytes,
        container,
        kind,
        last_modified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RestConfig {
        RestConfig {
            url: "https://project.example.co/".to_string(),
            api_key: SecretString::from("anon-key".to_string()),
            email: "ops@example.com".to_string(),
            password: SecretString::from("hunter2".to_string()),
            request_timeout_ms: 5_000,
        }
    }

    #[test]
    fn test_urls_trim_trailing_slash() {
        let backend = RestBackend::new(config()).unwrap();
        assert_eq!(
            backend.table_url(Table::Commands),
            "https://project.example.co/rest/v1/commands"
        );
        assert_eq!(
            backend.object_url(Container::Files, "d1-filetree.json"),
            "https://project.example.co/storage/v1/object/files/d1-filetree.json"
        );
    }

    #[test]
    fn test_empty_url_rejected() {
        let mut cfg = config();
        cfg.url = "  ".to_string();
        assert!(matches!(RestBackend::new(cfg), Err(GatewayError::Config(_))));
    }

    #[test]
    fn test_object_path_encoding() {
        assert_eq!(encode_object_path("/DCIM/My Photo.jpg"), "DCIM/My%20Photo.jpg");
        assert_eq!(encode_object_path("a#b/c?d"), "a%23b/c%3Fd");
        assert_eq!(encode_object_path("plain.txt"), "plain.txt");
    }

    #[test]
    fn test_not_found_detection() {
        assert!(is_not_found(StatusCode::NOT_FOUND, ""));
        assert!(is_not_found(
            StatusCode::BAD_REQUEST,
            r#"{"statusCode":"404","error":"not_found","message":"Object not found"}"#
        ));
        assert!(!is_not_found(StatusCode::BAD_REQUEST, "invalid bucket"));
        assert!(!is_not_found(StatusCode::INTERNAL_SERVER_ERROR, "not_found"));
    }

    #[test]
    fn test_listed_object_mapping() {
        let item: ListedObject = serde_json::from_value(json!({
            "name": "ping-001.json",
            "id": "4b1c",
            "updated_at": "2024-11-02T10:15:00.000Z",
            "metadata": {"size": 61, "mimetype": "application/json"}
        }))
        .unwrap();
        let entry = listed_to_entry(Container::Location, item);
        assert_eq!(entry.path, "ping-001.json");
        assert_eq!(entry.size_bytes, 61);
        assert_eq!(entry.kind, EntryKind::Object);
        assert!(entry.last_modified.is_some());
    }

    #[test]
    fn test_folder_placeholder_is_directory() {
        let item: ListedObject = serde_json::from_value(json!({
            "name": "archive",
            "id": null,
            "metadata": null
        }))
        .unwrap();
        let entry = listed_to_entry(Container::Media, item);
        assert!(entry.is_directory());
        assert_eq!(entry.size_bytes, 0);
        assert!(entry.last_modified.is_none());
    }

    #[test]
    fn test_config_deserializes_secrets() {
        let cfg: RestConfig = serde_json::from_value(json!({
            "url": "https://project.example.co",
            "api_key": "anon-key",
            "email": "ops@example.com",
            "password": "hunter2",
            "request_timeout_ms": 1000
        }))
        .unwrap();
        assert_eq!(cfg.api_key.expose_secret(), "anon-key");
        assert_eq!(cfg.password.expose_secret(), "hunter2");
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let backend = RestBackend::new(config()).unwrap();
        let rendered = format!("{:?}", backend);
        assert!(!rendered.contains("anon-key"));
        assert!(!rendered.contains("hunter2"));
    }
}
