//! Test fixtures and data generators.

use depot_metadata::models::{ChunkRow, FileRow, UserRow};
use time::OffsetDateTime;

pub const ADMIN_PASSWORD: &str = "test-admin-password";

/// Deterministic pseudo-random bytes, so chunk boundaries land on distinct content.
#[allow(dead_code)]
pub fn seeded_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 33) as u8
        })
        .collect()
}

/// A 64-character lowercase hex string derived from `n`.
#[allow(dead_code)]
pub fn hex_hash(n: u8) -> String {
    depot_core::ContentHash::compute(&[n]).to_hex()
}

#[allow(dead_code)]
pub fn chunk_row(hash: &str, size: i64) -> ChunkRow {
    ChunkRow {
        chunk_hash: hash.to_string(),
        size_bytes: size,
        update_time: OffsetDateTime::now_utc(),
    }
}

#[allow(dead_code)]
pub fn file_row(hash: &str, filename: &str, size: i64, chunk_count: i64) -> FileRow {
    FileRow {
        file_hash: hash.to_string(),
        filename: filename.to_string(),
        size_bytes: size,
        chunk_count,
        update_time: OffsetDateTime::now_utc(),
    }
}

#[allow(dead_code)]
pub fn user_row(username: &str, permissions: &str) -> UserRow {
    UserRow {
        username: username.to_string(),
        password_hash: depot_core::ContentHash::compute(username.as_bytes()).to_hex(),
        permissions: permissions.to_string(),
        created_at: OffsetDateTime::now_utc(),
    }
}
