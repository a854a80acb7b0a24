//! Test data helpers.

use depot_core::PermissionSet;

/// Deterministic pseudo-random bytes.
pub fn seeded_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 33) as u8
        })
        .collect()
}

/// Read and write access.
pub fn rw() -> PermissionSet {
    PermissionSet::parse("rw").unwrap()
}
