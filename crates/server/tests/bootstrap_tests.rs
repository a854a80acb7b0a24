//! First-start bootstrap tests.

mod common;

use common::TestMetadata;
use depot_core::config::{AdminConfig, AppConfig, EngineSeed, StorageSeed};
use depot_core::{ContentHash, DEFAULT_CHUNK_SIZE, DEFAULT_SECRET_KEY};
use depot_engine::Engine;
use depot_metadata::{ConfigRepoExt, StorageRepo, UserRepo};
use depot_server::auth::sha256_hex;
use depot_server::bootstrap;
use depot_storage::DriverRegistry;
use serde_json::json;

fn memory_seed(name: &str) -> StorageSeed {
    let mut settings = serde_json::Map::new();
    settings.insert("namespace".to_string(), json!(name));
    StorageSeed {
        name: name.to_string(),
        driver: "memory".to_string(),
        priority: 5,
        enabled: true,
        settings,
    }
}

#[tokio::test]
async fn test_admin_created_with_generated_password() {
    let db = TestMetadata::new().await.unwrap();
    let store = db.store();

    let password = bootstrap::ensure_admin_user(store.as_ref(), &AdminConfig::default())
        .await
        .unwrap()
        .expect("a password should be generated");
    assert_eq!(password.len(), 24);

    let admin = store.get_user("admin").await.unwrap().unwrap();
    assert_eq!(admin.permissions, bootstrap::ADMIN_PERMISSIONS);
    assert_eq!(admin.password_hash, sha256_hex(&password));

    // Nothing is generated once the account exists.
    let again = bootstrap::ensure_admin_user(store.as_ref(), &AdminConfig::default())
        .await
        .unwrap();
    assert!(again.is_none());
    let unchanged = store.get_user("admin").await.unwrap().unwrap();
    assert_eq!(unchanged.password_hash, admin.password_hash);
}

#[tokio::test]
async fn test_configured_admin_hash_wins() {
    let db = TestMetadata::new().await.unwrap();
    let store = db.store();

    bootstrap::ensure_admin_user(store.as_ref(), &AdminConfig::default())
        .await
        .unwrap();

    let config = AdminConfig {
        username: "admin".to_string(),
        password_hash: Some(ContentHash::compute(b"configured").to_hex().to_uppercase()),
    };
    let generated = bootstrap::ensure_admin_user(store.as_ref(), &config)
        .await
        .unwrap();
    assert!(generated.is_none());

    let admin = store.get_user("admin").await.unwrap().unwrap();
    assert_eq!(admin.password_hash, sha256_hex("configured"));
}

#[tokio::test]
async fn test_set_admin_password() {
    let db = TestMetadata::new().await.unwrap();
    let store = db.store();

    bootstrap::set_admin_password(store.as_ref(), "root", "first")
        .await
        .unwrap();
    let root = store.get_user("root").await.unwrap().unwrap();
    assert_eq!(root.permissions, "rwa");
    assert_eq!(root.password_hash, sha256_hex("first"));

    bootstrap::set_admin_password(store.as_ref(), "root", "second")
        .await
        .unwrap();
    let root = store.get_user("root").await.unwrap().unwrap();
    assert_eq!(root.password_hash, sha256_hex("second"));

    assert!(
        bootstrap::set_admin_password(store.as_ref(), "root", "")
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_seed_settings_never_overwrites() {
    let db = TestMetadata::new().await.unwrap();
    let store = db.store();

    bootstrap::seed_settings(store.as_ref(), &EngineSeed::default())
        .await
        .unwrap();
    assert_eq!(
        store.get_config_or("chunk_size", 0u64).await.unwrap(),
        DEFAULT_CHUNK_SIZE
    );
    assert!(bootstrap::warn_if_default_secret(store.as_ref()).await.unwrap());

    let seed = EngineSeed {
        chunk_size: Some(4096),
        num_storages: Some(1),
        secret_key: Some("fresh".to_string()),
    };
    bootstrap::seed_settings(store.as_ref(), &seed).await.unwrap();
    assert_eq!(
        store.get_config_or("chunk_size", 0u64).await.unwrap(),
        DEFAULT_CHUNK_SIZE
    );
    assert_eq!(
        store
            .get_config_or("secret_key", String::new())
            .await
            .unwrap(),
        DEFAULT_SECRET_KEY
    );
}

#[tokio::test]
async fn test_run_seeds_storages_once() {
    let db = TestMetadata::new().await.unwrap();
    let engine = Engine::new(db.store(), DriverRegistry::builtin());

    let config = AppConfig {
        admin: AdminConfig::for_testing(),
        engine: EngineSeed {
            secret_key: Some("not-default".to_string()),
            ..Default::default()
        },
        storages: vec![memory_seed("one"), memory_seed("two")],
        ..AppConfig::default()
    };
    bootstrap::run(&config, &engine).await.unwrap();
    bootstrap::run(&config, &engine).await.unwrap();

    let names: Vec<_> = db
        .store()
        .list_storages()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, ["one", "two"]);
    assert!(
        !bootstrap::warn_if_default_secret(db.store().as_ref())
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_seed_storages_rejects_unknown_driver() {
    let db = TestMetadata::new().await.unwrap();
    let engine = Engine::new(db.store(), DriverRegistry::builtin());

    let mut seed = memory_seed("bad");
    seed.driver = "gopher".to_string();
    let err = bootstrap::seed_storages(&engine, &[seed]).await.unwrap_err();
    assert!(format!("{err:#}").contains("bad"));
}
