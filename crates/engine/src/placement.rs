//! Weighted placement of chunk replicas.
//!
//! Up to `2 * required` sequential draws are made from the candidate
//! storages, each weighted by priority. A storage that stores the chunk
//! leaves the pool. A storage that fails sits out while untried candidates
//! remain, then becomes eligible again for whatever budget is left.

use crate::metrics::PLACEMENT_FAILURES;
use crate::{Engine, EngineError, EngineResult};
use bytes::Bytes;
use depot_metadata::models::StorageRow;
use depot_storage::BackendSessionExt;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use std::collections::HashSet;
use tracing::{debug, instrument, warn};

impl Engine {
    /// Store `data` on `required` distinct storages drawn from `candidates`.
    ///
    /// Returns the ids of the storages that hold the chunk, in success order.
    #[instrument(skip(self, data, candidates), fields(chunk_hash = %hash, candidates = candidates.len()))]
    pub async fn place(
        &self,
        hash: &str,
        data: &Bytes,
        candidates: Vec<StorageRow>,
        required: usize,
    ) -> EngineResult<Vec<i64>> {
        let mut pool = candidates;
        let mut failed: HashSet<i64> = HashSet::new();
        let mut placed = Vec::with_capacity(required);

        for attempt in 0..required.saturating_mul(2) {
            if placed.len() >= required {
                break;
            }
            let Some(index) = self.draw(&pool, &failed) else {
                break;
            };

            let storage = &pool[index];
            match self.store_on(storage, hash, data.clone()).await {
                Ok(()) => {
                    debug!(storage = %storage.name, attempt, "replica stored");
                    placed.push(storage.storage_id);
                    failed.remove(&storage.storage_id);
                    pool.swap_remove(index);
                }
                Err(e) => {
                    warn!(storage = %storage.name, attempt, error = %e, "replica write failed");
                    failed.insert(storage.storage_id);
                }
            }
        }

        if placed.len() < required {
            PLACEMENT_FAILURES.inc();
            return Err(EngineError::InsufficientReplicas {
                hash: hash.to_string(),
                required,
                achieved: placed.len(),
            });
        }
        Ok(placed)
    }

    /// Pick one index of `pool`, weighted by priority, preferring storages
    /// that have not failed yet. `None` once the pool is empty.
    fn draw(&self, pool: &[StorageRow], failed: &HashSet<i64>) -> Option<usize> {
        let untried: Vec<usize> = (0..pool.len())
            .filter(|&i| !failed.contains(&pool[i].storage_id))
            .collect();
        let eligible = if untried.is_empty() {
            (0..pool.len()).collect()
        } else {
            untried
        };

        let weights = eligible.iter().map(|&i| pool[i].priority.max(1) as u64);
        let dist = WeightedIndex::new(weights).ok()?;
        let pick = self.with_rng_locked(|rng| dist.sample(rng));
        Some(eligible[pick])
    }

    async fn store_on(&self, storage: &StorageRow, hash: &str, data: Bytes) -> EngineResult<()> {
        let backend = self.backend_for(storage)?;
        backend.store_session(hash, data).await?;
        Ok(())
    }
}
