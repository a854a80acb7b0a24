use async_trait::async_trait;
use bytes::Bytes;
use depot_storage::{Backend, BackendError, BackendResult, Operation};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Per-operation call counters.
#[derive(Default, Debug)]
pub struct OpCounts {
    pub connect: AtomicUsize,
    pub store: AtomicUsize,
    pub fetch: AtomicUsize,
    pub delete: AtomicUsize,
    pub release: AtomicUsize,
}

#[allow(dead_code)]
impl OpCounts {
    pub fn get(&self, op: Operation) -> usize {
        let counter = match op {
            Operation::Connect => &self.connect,
            Operation::Store => &self.store,
            Operation::Fetch => &self.fetch,
            Operation::Delete => &self.delete,
            Operation::Release => &self.release,
        };
        counter.load(Ordering::SeqCst)
    }
}

/// Wraps a backend, counting calls and optionally failing one operation.
#[allow(dead_code)]
pub struct InstrumentedBackend<B> {
    pub inner: B,
    pub counts: Arc<OpCounts>,
    pub fail_on: Option<Operation>,
}

#[allow(dead_code)]
impl<B: Backend> InstrumentedBackend<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            counts: Arc::new(OpCounts::default()),
            fail_on: None,
        }
    }

    pub fn failing(inner: B, op: Operation) -> Self {
        Self {
            fail_on: Some(op),
            ..Self::new(inner)
        }
    }

    fn check(&self, op: Operation) -> BackendResult<()> {
        if self.fail_on == Some(op) {
            return Err(BackendError::failed("instrumented", op, "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl<B: Backend> Backend for InstrumentedBackend<B> {
    async fn connect(&self) -> BackendResult<()> {
        self.counts.connect.fetch_add(1, Ordering::SeqCst);
        self.check(Operation::Connect)?;
        self.inner.connect().await
    }

    async fn store(&self, hash: &str, data: Bytes) -> BackendResult<()> {
        self.counts.store.fetch_add(1, Ordering::SeqCst);
        self.check(Operation::Store)?;
        self.inner.store(hash, data).await
    }

    async fn fetch(&self, hash: &str) -> BackendResult<Bytes> {
        self.counts.fetch.fetch_add(1, Ordering::SeqCst);
        self.check(Operation::Fetch)?;
        self.inner.fetch(hash).await
    }

    async fn delete(&self, hash: &str) -> BackendResult<()> {
        self.counts.delete.fetch_add(1, Ordering::SeqCst);
        self.check(Operation::Delete)?;
        self.inner.delete(hash).await
    }

    async fn release(&self) -> BackendResult<()> {
        self.counts.release.fetch_add(1, Ordering::SeqCst);
        self.check(Operation::Release)?;
        self.inner.release().await
    }

    fn driver_name(&self) -> &'static str {
        "instrumented"
    }
}
