//! Fake storage backends with switchable failure modes.

use async_trait::async_trait;
use bytes::Bytes;
use depot_storage::{Backend, BackendError, BackendResult, MemoryBackend, Operation};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// How a fake backend behaves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Healthy,
    /// Connects, then fails every operation.
    AlwaysFail,
    /// Cannot even connect.
    Offline,
    /// Everything works except delete.
    FailDelete,
    /// Returns data that does not match the requested hash.
    Corrupt,
}

/// A memory backend that counts calls and fails on demand.
pub struct FakeBackend {
    pub data: MemoryBackend,
    mode: Mutex<Mode>,
    /// Delete fails for this one hash, whatever the mode.
    stuck: Mutex<Option<String>>,
    pub stores: AtomicUsize,
    pub fetches: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl FakeBackend {
    pub fn new(mode: Mode) -> Self {
        Self {
            data: MemoryBackend::new(),
            mode: Mutex::new(mode),
            stuck: Mutex::new(None),
            stores: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
        }
    }

    pub fn set_mode(&self, mode: Mode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn fail_delete_of(&self, hash: &str) {
        *self.stuck.lock().unwrap() = Some(hash.to_string());
    }

    pub fn mode(&self) -> Mode {
        *self.mode.lock().unwrap()
    }

    pub fn stores(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    fn fail(op: Operation) -> BackendError {
        BackendError::failed("fake", op, "injected failure")
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn connect(&self) -> BackendResult<()> {
        match self.mode() {
            Mode::Offline => Err(Self::fail(Operation::Connect)),
            _ => Ok(()),
        }
    }

    async fn store(&self, hash: &str, data: Bytes) -> BackendResult<()> {
        self.stores.fetch_add(1, Ordering::SeqCst);
        match self.mode() {
            Mode::AlwaysFail | Mode::Offline => Err(Self::fail(Operation::Store)),
            _ => self.data.store(hash, data).await,
        }
    }

    async fn fetch(&self, hash: &str) -> BackendResult<Bytes> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.mode() {
            Mode::AlwaysFail | Mode::Offline => Err(Self::fail(Operation::Fetch)),
            Mode::Corrupt => Ok(Bytes::from_static(b"not the chunk you stored")),
            _ => self.data.fetch(hash).await,
        }
    }

    async fn delete(&self, hash: &str) -> BackendResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.stuck.lock().unwrap().as_deref() == Some(hash) {
            return Err(Self::fail(Operation::Delete));
        }
        match self.mode() {
            Mode::AlwaysFail | Mode::Offline | Mode::FailDelete => {
                Err(Self::fail(Operation::Delete))
            }
            _ => self.data.delete(hash).await,
        }
    }

    fn driver_name(&self) -> &'static str {
        "fake"
    }
}
