//! FTP backend (driver tag `ftp`).
//!
//! One control connection per backend instance, opened on `connect` and
//! closed with `QUIT` on `release`. Chunks are flat files named by hash
//! inside the configured directory.

use crate::error::{BackendError, BackendResult, Operation};
use crate::traits::{Backend, validate_hash};
use async_ftp::{FtpError, FtpStream};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

const DRIVER: &str = "ftp";

/// Settings accepted by the `ftp` driver.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FtpSettings {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Directory chunks live in; must already exist.
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_port() -> u16 {
    21
}

fn default_username() -> String {
    "anonymous".to_string()
}

fn default_path() -> String {
    "/".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl std::fmt::Debug for FtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("path", &self.path)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

/// Chunks stored on an FTP server.
pub struct FtpBackend {
    settings: FtpSettings,
    timeout: Duration,
    session: Mutex<Option<FtpStream>>,
}

impl std::fmt::Debug for FtpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtpBackend")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl FtpBackend {
    pub fn from_settings(settings: FtpSettings) -> BackendResult<Self> {
        if settings.host.trim().is_empty() {
            return Err(BackendError::Config("ftp driver requires 'host'".to_string()));
        }
        if settings.port == 0 {
            return Err(BackendError::Config("ftp driver requires a non-zero 'port'".to_string()));
        }
        Ok(Self {
            timeout: Duration::from_secs(settings.timeout_secs),
            settings,
            session: Mutex::new(None),
        })
    }

    fn address(&self) -> String {
        format!("{}:{}", self.settings.host, self.settings.port)
    }

    async fn open(&self) -> BackendResult<FtpStream> {
        let settings = &self.settings;
        let mut stream = self
            .bounded(Operation::Connect, FtpStream::connect(self.address()))
            .await?;
        self.bounded(
            Operation::Connect,
            stream.login(&settings.username, &settings.password),
        )
        .await?;
        self.bounded(Operation::Connect, stream.cwd(&settings.path))
            .await?;
        debug!(host = %settings.host, path = %settings.path, "ftp session opened");
        Ok(stream)
    }

    /// The open session, opening one first if needed.
    async fn ensure<'g>(&self, session: &'g mut Option<FtpStream>) -> BackendResult<&'g mut FtpStream> {
        if session.is_none() {
            *session = Some(self.open().await?);
        }
        session
            .as_mut()
            .ok_or_else(|| BackendError::failed(DRIVER, Operation::Connect, "no ftp session"))
    }

    async fn bounded<T>(
        &self,
        operation: Operation,
        fut: impl Future<Output = Result<T, FtpError>>,
    ) -> BackendResult<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(|e| map_error(operation, e)),
            Err(_) => Err(BackendError::failed(
                DRIVER,
                operation,
                format!("timed out after {}s", self.timeout.as_secs()),
            )),
        }
    }
}

/// Reply 550 means the file does not exist (or is not accessible).
fn is_unavailable(err: &FtpError) -> bool {
    matches!(err, FtpError::InvalidResponse(reply) if reply.contains("response: 550"))
}

fn map_error(operation: Operation, err: FtpError) -> BackendError {
    if matches!(operation, Operation::Fetch | Operation::Delete) && is_unavailable(&err) {
        return BackendError::NotFound(err.to_string());
    }
    BackendError::failed(DRIVER, operation, err)
}

#[async_trait]
impl Backend for FtpBackend {
    #[instrument(skip(self), fields(backend = DRIVER))]
    async fn connect(&self) -> BackendResult<()> {
        let mut session = self.session.lock().await;
        self.ensure(&mut session).await?;
        Ok(())
    }

    #[instrument(skip(self, data), fields(backend = DRIVER, size = data.len()))]
    async fn store(&self, hash: &str, data: Bytes) -> BackendResult<()> {
        validate_hash(hash)?;
        let name = hash.to_ascii_lowercase();
        let mut session = self.session.lock().await;
        let stream = self.ensure(&mut session).await?;
        let mut reader = data.as_ref();
        self.bounded(Operation::Store, stream.put(&name, &mut reader))
            .await
    }

    #[instrument(skip(self), fields(backend = DRIVER))]
    async fn fetch(&self, hash: &str) -> BackendResult<Bytes> {
        validate_hash(hash)?;
        let name = hash.to_ascii_lowercase();
        let mut session = self.session.lock().await;
        let stream = self.ensure(&mut session).await?;
        let cursor = self
            .bounded(Operation::Fetch, stream.simple_retr(&name))
            .await?;
        Ok(Bytes::from(cursor.into_inner()))
    }

    #[instrument(skip(self), fields(backend = DRIVER))]
    async fn delete(&self, hash: &str) -> BackendResult<()> {
        validate_hash(hash)?;
        let name = hash.to_ascii_lowercase();
        let mut session = self.session.lock().await;
        let stream = self.ensure(&mut session).await?;
        self.bounded(Operation::Delete, stream.rm(&name)).await
    }

    #[instrument(skip(self), fields(backend = DRIVER))]
    async fn release(&self) -> BackendResult<()> {
        let Some(mut stream) = self.session.lock().await.take() else {
            return Ok(());
        };
        self.bounded(Operation::Release, stream.quit()).await
    }

    fn driver_name(&self) -> &'static str {
        DRIVER
    }
}
