use bytes::Bytes;
use depot_core::ChunkHash;

/// Hex chunk key for `data`, as the engine would compute it.
pub fn chunk_hash(data: &[u8]) -> String {
    ChunkHash::compute(data).to_hex()
}

/// Deterministic payload; the same seed always yields the same bytes.
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut state = seed ^ 0x9e37_79b9_7f4a_7c15;
    let data: Vec<u8> = (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state as u8
        })
        .collect();
    Bytes::from(data)
}
