//! Upload, download and delete of whole files.

mod common;

use common::{Harness, Mode, rw, seeded_bytes};
use depot_core::{ChunkHash, FileHash, PermissionSet, size_kb};
use depot_engine::{Download, EngineError};
use depot_metadata::{ChunkRepo, FileRepo};
use futures::StreamExt;
use std::collections::HashSet;

async fn collect(mut download: Download) -> Result<Vec<u8>, EngineError> {
    let mut out = Vec::new();
    while let Some(item) = download.stream.next().await {
        out.extend_from_slice(&item?);
    }
    Ok(out)
}

async fn healthy(n: usize, chunk_size: u64, replicas: usize) -> Harness {
    let h = Harness::new(17).await;
    h.configure(chunk_size, replicas).await;
    for i in 0..n {
        h.add(&format!("s{i}"), Mode::Healthy).await;
    }
    h
}

#[tokio::test]
async fn test_round_trip_across_sizes() {
    let h = healthy(3, 1024, 2).await;

    for (i, len) in [0usize, 1, 1023, 1024, 1025, 4096, 5000].into_iter().enumerate() {
        let data = seeded_bytes(i as u64, len);
        let name = format!("dir/file-{len}.bin");
        let file = h.engine.upload(&data[..], &name, &rw()).await.unwrap();

        assert_eq!(file.size_bytes as usize, len);
        assert_eq!(file.chunk_count as usize, len.div_ceil(1024));

        let download = h.engine.download(&name, true).await.unwrap();
        assert_eq!(download.chunks.len(), len.div_ceil(1024));
        assert_eq!(collect(download).await.unwrap(), data, "len {len}");
    }
}

#[tokio::test]
async fn test_empty_file_has_no_chunks() {
    let h = healthy(1, 1024, 1).await;
    let file = h.engine.upload(&b""[..], "empty", &rw()).await.unwrap();

    assert_eq!(file.chunk_count, 0);
    assert_eq!(file.file_hash, FileHash::compute("empty", &[]).to_hex());
    let download = h.engine.download(&file.file_hash, false).await.unwrap();
    assert!(collect(download).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_dedup_across_files() {
    let h = Harness::new(3).await;
    h.configure(1024, 2).await;
    let fakes = [
        h.add("a", Mode::Healthy).await,
        h.add("b", Mode::Healthy).await,
        h.add("c", Mode::Healthy).await,
    ];
    let data = seeded_bytes(99, 3000);

    let first = h.engine.upload(&data[..], "one.bin", &rw()).await.unwrap();
    let stores_after_first: usize = fakes.iter().map(|f| f.stores()).sum();
    let second = h.engine.upload(&data[..], "two.bin", &rw()).await.unwrap();
    let stores_after_second: usize = fakes.iter().map(|f| f.stores()).sum();

    assert_ne!(first.file_hash, second.file_hash);
    assert_eq!(h.store.count_files().await.unwrap(), 2);
    assert_eq!(h.store.count_chunks().await.unwrap(), 3);
    assert_eq!(stores_after_first, 3 * 2);
    assert_eq!(stores_after_second, stores_after_first);
    assert_eq!(
        h.store.get_file_chunks(&first.file_hash).await.unwrap(),
        h.store.get_file_chunks(&second.file_hash).await.unwrap()
    );
}

#[tokio::test]
async fn test_repeated_chunk_within_one_file() {
    let h = healthy(2, 1024, 1).await;
    let data = vec![7u8; 3072];

    let file = h.engine.upload(&data[..], "zeros", &rw()).await.unwrap();
    assert_eq!(file.chunk_count, 3);
    assert_eq!(h.store.count_chunks().await.unwrap(), 1);

    let download = h.engine.download("zeros", true).await.unwrap();
    assert_eq!(collect(download).await.unwrap(), data);
}

#[tokio::test]
async fn test_upload_rejections() {
    let h = healthy(2, 1024, 1).await;
    h.engine.upload(&b"x"[..], "taken", &rw()).await.unwrap();

    let err = h.engine.upload(&b"y"[..], "taken", &rw()).await.unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));

    let err = h.engine.upload(&b"y"[..], "", &rw()).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));

    let read_only = PermissionSet::parse("r").unwrap();
    let err = h.engine.upload(&b"y"[..], "new", &read_only).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn test_failed_upload_records_no_file() {
    let h = Harness::new(1).await;
    h.configure(1024, 3).await;
    h.add("a", Mode::Healthy).await;
    h.add("b", Mode::Healthy).await;

    let err = h
        .engine
        .upload(&seeded_bytes(1, 2048)[..], "doomed", &rw())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientReplicas { .. }));
    assert!(!h.store.file_exists("doomed").await.unwrap());
}

#[tokio::test]
async fn test_download_by_hash_ignores_suffix() {
    let h = healthy(1, 1024, 1).await;
    let file = h.engine.upload(&b"abc"[..], "docs/a.txt", &rw()).await.unwrap();

    let key = format!("{}/a.txt", file.file_hash);
    let download = h.engine.download(&key, false).await.unwrap();
    assert_eq!(download.file.filename, "docs/a.txt");
    assert_eq!(collect(download).await.unwrap(), b"abc");

    let upper = h.engine.resolve(&file.file_hash.to_uppercase(), false).await.unwrap();
    assert_eq!(upper.file_hash, file.file_hash);

    assert!(matches!(
        h.engine.download("docs/missing.txt", true).await,
        Err(EngineError::NotFound(_))
    ));
    assert!(matches!(
        h.engine.resolve("not-a-hash/a.txt", false).await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_download_stops_at_first_failure() {
    let h = Harness::new(2).await;
    h.configure(1024, 1).await;
    let only = h.add("only", Mode::Healthy).await;
    h.engine
        .upload(&seeded_bytes(5, 3000)[..], "f", &rw())
        .await
        .unwrap();

    only.set_mode(Mode::AlwaysFail);
    let mut download = h.engine.download("f", true).await.unwrap();
    assert!(matches!(
        download.stream.next().await,
        Some(Err(EngineError::ChunkUnavailable { .. }))
    ));
    assert!(download.stream.next().await.is_none());
}

#[tokio::test]
async fn test_delete_removes_rows_and_replicas() {
    let h = Harness::new(12).await;
    h.configure(1024, 2).await;
    let fakes = [
        h.add("a", Mode::Healthy).await,
        h.add("b", Mode::Healthy).await,
        h.add("c", Mode::Healthy).await,
    ];

    let file = h
        .engine
        .upload(&seeded_bytes(3, 2500)[..], "victim", &rw())
        .await
        .unwrap();
    let summary = h.engine.delete("victim", true, &rw()).await.unwrap();

    assert_eq!(summary.chunks_removed, 3);
    assert_eq!(summary.chunks_shared, 0);
    assert!(h.store.get_file_by_hash(&file.file_hash).await.unwrap().is_none());
    assert_eq!(h.store.count_chunks().await.unwrap(), 0);
    assert_eq!(fakes.iter().map(|f| f.deletes()).sum::<usize>(), 3 * 2);
    assert!(fakes.iter().all(|f| f.data.is_empty()));
}

#[tokio::test]
async fn test_delete_keeps_shared_chunks() {
    let h = healthy(2, 1024, 2).await;
    let shared = seeded_bytes(8, 1024);
    let mut other = shared.clone();
    other.extend(seeded_bytes(9, 1024));

    h.engine.upload(&shared[..], "a", &rw()).await.unwrap();
    h.engine.upload(&other[..], "b", &rw()).await.unwrap();

    let summary = h.engine.delete("b", true, &rw()).await.unwrap();
    assert_eq!(summary.chunks_removed, 1);
    assert_eq!(summary.chunks_shared, 1);
    assert_eq!(h.store.count_chunks().await.unwrap(), 1);

    let download = h.engine.download("a", true).await.unwrap();
    assert_eq!(collect(download).await.unwrap(), shared);
}

#[tokio::test]
async fn test_delete_aborts_on_backend_failure() {
    let h = Harness::new(4).await;
    h.configure(1024, 2).await;
    h.add("a", Mode::Healthy).await;
    let b = h.add("b", Mode::Healthy).await;

    let file = h
        .engine
        .upload(&seeded_bytes(4, 2048)[..], "sticky", &rw())
        .await
        .unwrap();
    b.set_mode(Mode::FailDelete);

    let err = h.engine.delete(&file.file_hash, false, &rw()).await.unwrap_err();
    assert!(matches!(err, EngineError::BackendOperationFailed(_)));
    assert!(h.store.file_exists("sticky").await.unwrap());
    assert_eq!(h.store.count_chunks().await.unwrap(), 2);
}

#[tokio::test]
async fn test_aborted_delete_leaves_no_dangling_replicas() {
    let h = Harness::new(6).await;
    h.configure(1024, 1).await;
    let only = h.add("only", Mode::Healthy).await;

    let data = seeded_bytes(31, 2048);
    let file = h.engine.upload(&data[..], "f", &rw()).await.unwrap();
    let mut chunks = h.store.get_file_chunks(&file.file_hash).await.unwrap();
    chunks.sort();
    let (first, second) = (chunks[0].clone(), chunks[1].clone());
    only.fail_delete_of(&second);

    let err = h.engine.delete("f", true, &rw()).await.unwrap_err();
    assert!(matches!(err, EngineError::BackendOperationFailed(_)));
    assert!(!only.data.contains(&first));
    assert!(h.store.chunk_storages(&first).await.unwrap().is_empty());
    assert_eq!(h.store.chunk_storages(&second).await.unwrap().len(), 1);

    // Same content as the lost chunk, under a new name.
    let first_data = if ChunkHash::compute(&data[..1024]).to_hex() == first {
        &data[..1024]
    } else {
        &data[1024..]
    };
    h.engine.upload(first_data, "g", &rw()).await.unwrap();
    assert!(only.data.contains(&first));

    let download = h.engine.download("g", true).await.unwrap();
    assert_eq!(collect(download).await.unwrap(), first_data);
    let download = h.engine.download("f", true).await.unwrap();
    assert_eq!(collect(download).await.unwrap(), data);
}

#[tokio::test]
async fn test_delete_tolerates_missing_replicas() {
    use depot_storage::Backend;

    let h = Harness::new(4).await;
    h.configure(1024, 1).await;
    let only = h.add("only", Mode::Healthy).await;

    let file = h.engine.upload(&b"short"[..], "f", &rw()).await.unwrap();
    let chunk = h.store.get_file_chunks(&file.file_hash).await.unwrap().remove(0);
    only.data.delete(&chunk).await.unwrap();

    h.engine.delete("f", true, &rw()).await.unwrap();
    assert_eq!(h.store.count_chunks().await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_requires_write() {
    let h = healthy(1, 1024, 1).await;
    h.engine.upload(&b"x"[..], "f", &rw()).await.unwrap();

    let read_only = PermissionSet::parse("r").unwrap();
    assert!(matches!(
        h.engine.delete("f", true, &read_only).await,
        Err(EngineError::Forbidden(_))
    ));
    assert!(matches!(
        h.engine.delete("nope", true, &rw()).await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_end_to_end_with_offline_storage() {
    let h = Harness::new(2024).await;
    h.configure(1024 * 1024, 2).await;
    let live_a = h.add("live-a", Mode::Healthy).await;
    let live_b = h.add("live-b", Mode::Healthy).await;
    h.add("offline", Mode::Offline).await;

    let data = seeded_bytes(25, 2 * 1024 * 1024 + 512 * 1024);
    let file = h.engine.upload(&data[..], "big.bin", &rw()).await.unwrap();

    assert_eq!(file.chunk_count, 3);
    assert_eq!(size_kb(file.size_bytes as u64), 2560);

    let live: HashSet<String> = ["live-a".to_string(), "live-b".to_string()].into();
    for hash in h.store.get_file_chunks(&file.file_hash).await.unwrap() {
        let names: HashSet<String> = h
            .store
            .chunk_storages(&hash)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, live);
    }
    assert_eq!(live_a.data.len(), 3);
    assert_eq!(live_b.data.len(), 3);

    let download = h.engine.download("big.bin", true).await.unwrap();
    assert_eq!(collect(download).await.unwrap(), data);

    h.engine.delete("big.bin", true, &rw()).await.unwrap();
    assert_eq!(h.store.count_chunks().await.unwrap(), 0);
    assert_eq!(h.store.count_files().await.unwrap(), 0);
}
