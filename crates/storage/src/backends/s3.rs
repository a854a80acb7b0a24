//! S3-compatible backend using the AWS SDK (driver tag `s3`).

use crate::error::{BackendError, BackendResult, Operation};
use crate::traits::{Backend, chunk_key};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::ProvideCredentials;
use aws_credential_types::provider::error::CredentialsError;
use aws_credential_types::provider::future::ProvideCredentials as ProvideCredentialsFuture;
use aws_sdk_s3::Client;
use aws_smithy_http_client::Builder as SmithyHttpClientBuilder;
use bytes::Bytes;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::instrument;

const DRIVER: &str = "s3";

/// Marker included in lazy-credentials errors so they surface as
/// configuration problems instead of generic transport failures.
const CREDENTIALS_ERROR_MARKER: &str = "depot-s3-lazy-credentials";

/// Settings accepted by the `s3` driver.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct S3Settings {
    /// Bucket name.
    pub bucket: String,
    /// Optional endpoint URL (for MinIO, etc.). Bare `host:port` means http.
    pub endpoint: Option<String>,
    /// AWS region (default: us-east-1).
    pub region: Option<String>,
    /// Optional key prefix.
    pub prefix: Option<String>,
    /// Falls back to the ambient AWS credential chain when unset.
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Use `endpoint/bucket/key` URLs. Required for MinIO.
    #[serde(default)]
    pub force_path_style: bool,
}

impl std::fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Settings")
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("prefix", &self.prefix)
            .field("force_path_style", &self.force_path_style)
            .finish_non_exhaustive()
    }
}

/// Lazily initializes the AWS default credentials chain on first signed request.
#[derive(Debug)]
struct LazyDefaultCredentialsProvider {
    region: String,
    chain: OnceCell<aws_config::default_provider::credentials::DefaultCredentialsChain>,
}

impl LazyDefaultCredentialsProvider {
    fn new(region: String) -> Self {
        Self {
            region,
            chain: OnceCell::new(),
        }
    }

    async fn credentials(&self) -> aws_credential_types::provider::Result {
        let chain = self
            .chain
            .get_or_init(|| async {
                aws_config::default_provider::credentials::DefaultCredentialsChain::builder()
                    .region(aws_config::Region::new(self.region.clone()))
                    .build()
                    .await
            })
            .await;
        chain.provide_credentials().await.map_err(|err| {
            CredentialsError::provider_error(format!(
                "{CREDENTIALS_ERROR_MARKER}: default AWS credentials resolution failed: {err}"
            ))
        })
    }
}

impl ProvideCredentials for LazyDefaultCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> ProvideCredentialsFuture<'a>
    where
        Self: 'a,
    {
        ProvideCredentialsFuture::new(self.credentials())
    }
}

/// Chunks stored as objects in an S3 bucket.
pub struct S3Backend {
    client: Client,
    bucket: String,
    prefix: Option<String>,
    endpoint: String,
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl S3Backend {
    /// Build a client from settings. No network traffic happens here.
    pub fn from_settings(settings: S3Settings) -> BackendResult<Self> {
        if settings.bucket.is_empty() {
            return Err(BackendError::Config(
                "s3 driver requires a non-empty 'bucket'".to_string(),
            ));
        }
        if settings.access_key_id.is_some() ^ settings.secret_access_key.is_some() {
            return Err(BackendError::Config(
                "s3 driver requires both access_key_id and secret_access_key when either is set"
                    .to_string(),
            ));
        }

        let region = settings
            .region
            .unwrap_or_else(|| "us-east-1".to_string());
        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(aws_config::Region::new(region.clone()));

        if let (Some(key_id), Some(secret)) = (settings.access_key_id, settings.secret_access_key)
        {
            let credentials =
                aws_sdk_s3::config::Credentials::new(key_id, secret, None, None, "depot-storage");
            builder = builder.credentials_provider(credentials);
        } else {
            builder =
                builder.credentials_provider(LazyDefaultCredentialsProvider::new(region.clone()));
        }

        let endpoint = settings.endpoint.map(|url| {
            let lower = url.to_ascii_lowercase();
            if lower.starts_with("http://") || lower.starts_with("https://") {
                url
            } else {
                format!("http://{url}")
            }
        });

        if let Some(url) = &endpoint {
            builder = builder.endpoint_url(url);
            // Plain-HTTP endpoints (local MinIO) must not depend on native trust roots
            if url.to_ascii_lowercase().starts_with("http://") {
                builder = builder.http_client(SmithyHttpClientBuilder::new().build_http());
            }
        }

        if settings.force_path_style {
            builder = builder.force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: settings.bucket,
            prefix: settings
                .prefix
                .map(|p| p.trim_end_matches('/').to_string())
                .filter(|p| !p.is_empty()),
            endpoint: endpoint.unwrap_or_else(|| format!("s3.{region}.amazonaws.com")),
        })
    }

    /// Get the full object key for a chunk (applies prefix if configured).
    fn full_key(&self, hash: &str) -> BackendResult<String> {
        let key = chunk_key(hash)?;
        Ok(match &self.prefix {
            Some(prefix) => format!("{prefix}/{key}"),
            None => key,
        })
    }

    /// Convert an SDK error, mapping 404 to NotFound.
    fn map_sdk_error<E>(
        err: aws_sdk_s3::error::SdkError<E>,
        operation: Operation,
        hash: &str,
    ) -> BackendError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        if let aws_sdk_s3::error::SdkError::ServiceError(ref service_err) = err
            && service_err.raw().status().as_u16() == 404
        {
            return BackendError::NotFound(hash.to_string());
        }
        if err.to_string().contains(CREDENTIALS_ERROR_MARKER) {
            return BackendError::Config(
                "S3 credential initialization failed; configure credentials explicitly"
                    .to_string(),
            );
        }
        BackendError::failed(DRIVER, operation, err)
    }

    async fn exists(&self, key: &str, hash: &str) -> BackendResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => match Self::map_sdk_error(e, Operation::Delete, hash) {
                BackendError::NotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }
}

#[async_trait]
impl Backend for S3Backend {
    #[instrument(skip(self, data), fields(backend = DRIVER, size = data.len()))]
    async fn store(&self, hash: &str, data: Bytes) -> BackendResult<()> {
        let key = self.full_key(hash)?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(data.into())
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, Operation::Store, hash))?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = DRIVER))]
    async fn fetch(&self, hash: &str) -> BackendResult<Bytes> {
        let key = self.full_key(hash)?;
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, Operation::Fetch, hash))?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| BackendError::failed(DRIVER, Operation::Fetch, e))?
            .into_bytes();
        Ok(bytes)
    }

    #[instrument(skip(self), fields(backend = DRIVER))]
    async fn delete(&self, hash: &str) -> BackendResult<()> {
        let key = self.full_key(hash)?;

        // delete_object succeeds on missing keys, so check first to report NotFound
        if !self.exists(&key, hash).await? {
            return Err(BackendError::NotFound(hash.to_string()));
        }

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, Operation::Delete, hash))?;
        Ok(())
    }

    fn driver_name(&self) -> &'static str {
        DRIVER
    }
}
