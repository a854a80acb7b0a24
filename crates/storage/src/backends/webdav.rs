//! WebDAV backend over HTTP(S) (driver tag `webdav`).

use crate::error::{BackendError, BackendResult, Operation};
use crate::traits::{Backend, validate_hash};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

const DRIVER: &str = "webdav";

/// Settings accepted by the `webdav` driver.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebDavSettings {
    /// Collection URL chunks are stored under, e.g. `https://dav.example.com/depot/`.
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

impl std::fmt::Debug for WebDavSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebDavSettings")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

/// Chunks stored as flat resources in one WebDAV collection.
pub struct WebDavBackend {
    client: Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl std::fmt::Debug for WebDavBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebDavBackend")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl WebDavBackend {
    pub fn from_settings(settings: WebDavSettings) -> BackendResult<Self> {
        let lower = settings.url.to_ascii_lowercase();
        if !(lower.starts_with("http://") || lower.starts_with("https://")) {
            return Err(BackendError::Config(
                "webdav driver requires an http(s) 'url'".to_string(),
            ));
        }
        if settings.password.is_some() && settings.username.is_none() {
            return Err(BackendError::Config(
                "webdav driver requires 'username' when 'password' is set".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| BackendError::Config(format!("failed to build http client: {e}")))?;

        let mut base_url = settings.url;
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            client,
            base_url,
            username: settings.username,
            password: settings.password,
        })
    }

    fn resource_url(&self, hash: &str) -> BackendResult<String> {
        validate_hash(hash)?;
        Ok(format!("{}{}", self.base_url, hash.to_ascii_lowercase()))
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.request(method, url);
        match &self.username {
            Some(user) => request.basic_auth(user, self.password.as_deref()),
            None => request,
        }
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        operation: Operation,
        hash: &str,
    ) -> BackendResult<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|e| BackendError::failed(DRIVER, operation, e))?;
        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(BackendError::NotFound(hash.to_string())),
            status => Err(BackendError::failed(
                DRIVER,
                operation,
                format!("unexpected status {status}"),
            )),
        }
    }
}

#[async_trait]
impl Backend for WebDavBackend {
    /// Ensure the collection exists. A 405 means it already does.
    #[instrument(skip(self), fields(backend = DRIVER))]
    async fn connect(&self) -> BackendResult<()> {
        let mkcol = Method::from_bytes(b"MKCOL")
            .map_err(|e| BackendError::failed(DRIVER, Operation::Connect, e))?;
        let response = self
            .request(mkcol, &self.base_url)
            .send()
            .await
            .map_err(|e| BackendError::failed(DRIVER, Operation::Connect, e))?;
        let status = response.status();
        if status.is_success() || status == StatusCode::METHOD_NOT_ALLOWED {
            Ok(())
        } else {
            Err(BackendError::failed(
                DRIVER,
                Operation::Connect,
                format!("MKCOL returned {status}"),
            ))
        }
    }

    #[instrument(skip(self, data), fields(backend = DRIVER, size = data.len()))]
    async fn store(&self, hash: &str, data: Bytes) -> BackendResult<()> {
        let url = self.resource_url(hash)?;
        self.send(
            self.request(Method::PUT, &url).body(data),
            Operation::Store,
            hash,
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = DRIVER))]
    async fn fetch(&self, hash: &str) -> BackendResult<Bytes> {
        let url = self.resource_url(hash)?;
        let response = self
            .send(self.request(Method::GET, &url), Operation::Fetch, hash)
            .await?;
        response
            .bytes()
            .await
            .map_err(|e| BackendError::failed(DRIVER, Operation::Fetch, e))
    }

    #[instrument(skip(self), fields(backend = DRIVER))]
    async fn delete(&self, hash: &str) -> BackendResult<()> {
        let url = self.resource_url(hash)?;
        self.send(self.request(Method::DELETE, &url), Operation::Delete, hash)
            .await?;
        Ok(())
    }

    fn driver_name(&self) -> &'static str {
        DRIVER
    }
}
