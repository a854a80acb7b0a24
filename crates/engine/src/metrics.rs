//! Engine counters.
//!
//! The statics are created lazily and registered by whoever exposes them
//! (see [`all`]).

use prometheus::core::Collector;
use prometheus::IntCounter;
use std::sync::LazyLock;

pub static CHUNKS_STORED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_chunks_stored_total",
        "Total number of new chunks written to storage backends",
    )
    .expect("metric creation failed")
});

pub static CHUNKS_DEDUPLICATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_chunks_deduplicated_total",
        "Total number of chunk writes skipped because the chunk already existed",
    )
    .expect("metric creation failed")
});

pub static BYTES_STORED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_bytes_stored_total",
        "Total bytes of new chunks (counted once, not per replica)",
    )
    .expect("metric creation failed")
});

pub static PLACEMENT_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_placement_failures_total",
        "Total number of chunks that could not reach the replica target",
    )
    .expect("metric creation failed")
});

pub static READ_FALLBACKS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_read_fallbacks_total",
        "Total number of chunk reads retried on another storage",
    )
    .expect("metric creation failed")
});

pub static FILES_UPLOADED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("depot_files_uploaded_total", "Total number of files uploaded")
        .expect("metric creation failed")
});

pub static FILES_DELETED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("depot_files_deleted_total", "Total number of files deleted")
        .expect("metric creation failed")
});

/// Every engine collector, for registration.
pub fn all() -> Vec<Box<dyn Collector>> {
    vec![
        Box::new(CHUNKS_STORED.clone()),
        Box::new(CHUNKS_DEDUPLICATED.clone()),
        Box::new(BYTES_STORED.clone()),
        Box::new(PLACEMENT_FAILURES.clone()),
        Box::new(READ_FALLBACKS.clone()),
        Box::new(FILES_UPLOADED.clone()),
        Box::new(FILES_DELETED.clone()),
    ]
}
