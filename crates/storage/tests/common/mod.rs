pub mod fixtures;
pub mod mocks;

#[allow(unused_imports)]
pub use fixtures::{chunk_hash, seeded_bytes};
#[allow(unused_imports)]
pub use mocks::{InstrumentedBackend, OpCounts};
