//! First-start initialization: admin account, settings and storages.

use crate::auth::sha256_hex;
use anyhow::{Context, Result};
use depot_core::config::{AdminConfig, AppConfig, EngineSeed, StorageSeed};
use depot_core::{DEFAULT_CHUNK_SIZE, DEFAULT_NUM_STORAGES, DEFAULT_SECRET_KEY, PermissionSet, keys};
use depot_engine::Engine;
use depot_metadata::models::{NewStorage, UserRow};
use depot_metadata::{ConfigRepo, ConfigRepoExt, MetadataStore, StorageRepo, UserRepo};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde_json::json;
use time::OffsetDateTime;

/// Permissions of the bootstrap admin.
pub const ADMIN_PERMISSIONS: &str = "rwa";

const GENERATED_PASSWORD_LEN: usize = 24;

/// Run every bootstrap step against a freshly opened store.
pub async fn run(config: &AppConfig, engine: &Engine) -> Result<()> {
    let metadata = engine.metadata().as_ref();

    if let Some(password) = ensure_admin_user(metadata, &config.admin).await? {
        tracing::warn!(
            username = %config.admin.username,
            password = %password,
            "generated admin password; it is shown only once, change it with `depot set-admin-password`"
        );
    }
    seed_settings(metadata, &config.engine).await?;
    seed_storages(engine, &config.storages).await?;
    warn_if_default_secret(metadata).await?;
    Ok(())
}

/// Ensure the admin account exists.
///
/// A configured password hash always wins over the stored one. Returns the
/// generated password when the account had to be created without one.
pub async fn ensure_admin_user(metadata: &dyn MetadataStore, config: &AdminConfig) -> Result<Option<String>> {
    let configured = config.password_hash.as_deref().map(str::to_lowercase);

    if let Some(existing) = metadata.get_user(&config.username).await? {
        if let Some(hash) = configured
            && hash != existing.password_hash
        {
            metadata.set_user_password(&config.username, &hash).await?;
            tracing::info!(username = %config.username, "admin password updated from configuration");
        } else {
            tracing::debug!(username = %config.username, "admin user already exists");
        }
        return Ok(None);
    }

    let (password_hash, generated) = match configured {
        Some(hash) => (hash, None),
        None => {
            let password: String = rand::rng()
                .sample_iter(Alphanumeric)
                .take(GENERATED_PASSWORD_LEN)
                .map(char::from)
                .collect();
            (sha256_hex(&password), Some(password))
        }
    };

    metadata
        .create_user(&UserRow {
            username: config.username.clone(),
            password_hash,
            permissions: ADMIN_PERMISSIONS.to_string(),
            created_at: OffsetDateTime::now_utc(),
        })
        .await?;
    tracing::info!(username = %config.username, "admin user created");
    Ok(generated)
}

/// Reset the admin password, creating the account if needed.
pub async fn set_admin_password(metadata: &dyn MetadataStore, username: &str, password: &str) -> Result<()> {
    anyhow::ensure!(!password.is_empty(), "password must not be empty");
    let hash = sha256_hex(password);

    if metadata.get_user(username).await?.is_some() {
        metadata.set_user_password(username, &hash).await?;
    } else {
        metadata
            .create_user(&UserRow {
                username: username.to_string(),
                password_hash: hash,
                permissions: ADMIN_PERMISSIONS.to_string(),
                created_at: OffsetDateTime::now_utc(),
            })
            .await?;
    }
    tracing::info!(username, "admin password set");
    Ok(())
}

/// Write initial settings for keys that are not persisted yet.
pub async fn seed_settings(metadata: &dyn MetadataStore, seed: &EngineSeed) -> Result<()> {
    let values = [
        (keys::CHUNK_SIZE, json!(seed.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE))),
        (
            keys::NUM_STORAGES,
            json!(seed.num_storages.unwrap_or(DEFAULT_NUM_STORAGES)),
        ),
        (
            keys::SECRET_KEY,
            json!(seed.secret_key.as_deref().unwrap_or(DEFAULT_SECRET_KEY)),
        ),
    ];

    for (key, value) in values {
        if metadata.init_config(key, &value).await? && key != keys::SECRET_KEY {
            tracing::info!(key, value = %value, "setting initialized");
        }
    }
    Ok(())
}

/// Register configured storages whose names are not yet known.
pub async fn seed_storages(engine: &Engine, seeds: &[StorageSeed]) -> Result<()> {
    let access = PermissionSet::all();
    for seed in seeds {
        if engine.metadata().get_storage(&seed.name).await?.is_some() {
            tracing::debug!(storage = %seed.name, "storage already registered");
            continue;
        }
        engine
            .register_storage(
                NewStorage {
                    name: seed.name.clone(),
                    driver: seed.driver.clone(),
                    priority: i64::from(seed.priority),
                    enabled: seed.enabled,
                    driver_settings: seed.settings.clone(),
                },
                &access,
            )
            .await
            .with_context(|| format!("failed to register storage {}", seed.name))?;
    }
    Ok(())
}

/// Log a warning when the token secret was never changed. Returns true if so.
pub async fn warn_if_default_secret(metadata: &dyn MetadataStore) -> Result<bool> {
    let secret: String = metadata
        .get_config_or(keys::SECRET_KEY, DEFAULT_SECRET_KEY.to_string())
        .await?;
    let is_default = secret == DEFAULT_SECRET_KEY;
    if is_default {
        tracing::warn!(
            "secret_key is still the default; set engine.secret_key or PUT /v1/config/secret_key"
        );
    }
    Ok(is_default)
}
