//! Shared test utilities for engine integration tests.

#![allow(dead_code)]

pub mod fakes;
pub mod fixtures;
pub mod harness;

pub use fakes::{FakeBackend, Mode};
pub use fixtures::{rw, seeded_bytes};
pub use harness::Harness;
