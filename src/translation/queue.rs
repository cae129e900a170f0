use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use super::backend::{BatchItem, TranslationBackend, TranslationBatch, TranslationResponse};
use super::context::ContextSnapshot;
use crate::errors::BackendError;
use crate::stabilization::BlockId;

/// Resolved batch, ready to be applied by the engine
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub batch: TranslationBatch,
    /// One entry per batch item
    pub results: BTreeMap<BlockId, Result<String, BackendError>>,
}

impl BatchOutcome {
    pub fn batch_id(&self) -> u64 {
        self.batch.batch_id
    }

    pub fn succeeded(&self) -> usize {
        self.results.values().filter(|r| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.values().filter(|r| r.is_err()).count()
    }

    /// Map a backend answer onto the batch; missing blocks fail
    pub fn from_response(batch: TranslationBatch, response: Result<TranslationResponse, BackendError>) -> Self {
        let results = match response {
            Ok(mut response) => batch
                .items
                .iter()
                .map(|item| {
                    let result = response.results.remove(&item.block_id).unwrap_or_else(|| {
                        Err(BackendError::Rejected(format!("No translation returned for block {}", item.block_id)))
                    });
                    (item.block_id, result)
                })
                .collect(),
            Err(e) => TranslationResponse::all_failed(&batch, e).results,
        };
        Self { batch, results }
    }
}

/// Batches stabilized blocks and tracks which block ids are in flight.
///
/// The queue itself is synchronous and lives behind the engine lock;
/// only [`dispatch`] awaits the backend.
#[derive(Debug, Default)]
pub struct TranslationRequestQueue {
    in_flight: BTreeMap<u64, BTreeSet<BlockId>>,
    next_batch_id: u64,
}

impl TranslationRequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one batch from the blocks of a cycle.
    ///
    /// Blocks already in flight, and repeats within `items`, are dropped.
    /// Returns `None` when nothing is left to send.
    pub fn submit(
        &mut self,
        items: Vec<BatchItem>,
        context: ContextSnapshot,
        source_language: &str,
        target_language: &str,
    ) -> Option<TranslationBatch> {
        let mut ids = BTreeSet::new();
        let mut accepted = Vec::with_capacity(items.len());
        for item in items {
            if self.is_in_flight(item.block_id) || !ids.insert(item.block_id) {
                debug!("Block {} already queued, skipping", item.block_id);
                continue;
            }
            accepted.push(item);
        }
        if accepted.is_empty() {
            return None;
        }

        self.next_batch_id += 1;
        let batch_id = self.next_batch_id;
        self.in_flight.insert(batch_id, ids);
        debug!("Batch {} queued with {} block(s)", batch_id, accepted.len());

        Some(TranslationBatch {
            batch_id,
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            items: accepted,
            context,
        })
    }

    /// Release the ids of a resolved batch; false if it was unknown
    pub fn complete(&mut self, batch_id: u64) -> bool {
        self.in_flight.remove(&batch_id).is_some()
    }

    pub fn is_in_flight(&self, id: BlockId) -> bool {
        self.in_flight.values().any(|ids| ids.contains(&id))
    }

    pub fn in_flight_batches(&self) -> usize {
        self.in_flight.len()
    }

    pub fn in_flight_blocks(&self) -> usize {
        self.in_flight.values().map(BTreeSet::len).sum()
    }

    /// No batch awaiting a response
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }
}

/// Send a batch to the backend, failing every block on error or timeout
pub async fn dispatch(backend: &dyn TranslationBackend, batch: TranslationBatch, timeout: Duration) -> BatchOutcome {
    debug!("Dispatching batch {} ({} block(s)) to {}", batch.batch_id, batch.len(), backend.name());
    let response = match tokio::time::timeout(timeout, backend.translate(batch.clone())).await {
        Ok(response) => response,
        Err(_) => {
            warn!("Batch {} timed out after {:?}", batch.batch_id, timeout);
            Err(BackendError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    };
    if let Err(e) = &response {
        warn!("Batch {} failed: {}", batch.batch_id, e);
    }
    BatchOutcome::from_response(batch, response)
}
