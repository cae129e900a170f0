use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

use super::context::ContextSnapshot;
use crate::errors::BackendError;
use crate::geometry::Rect;
use crate::stabilization::BlockId;

/// A stabilized block waiting for its translation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub block_id: BlockId,
    pub source_text: String,
    pub rect: Rect,
}

/// Every block stabilized in one cycle, sent as a single request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationBatch {
    pub batch_id: u64,
    pub source_language: String,
    pub target_language: String,
    pub items: Vec<BatchItem>,
    pub context: ContextSnapshot,
}

impl TranslationBatch {
    pub fn block_ids(&self) -> Vec<BlockId> {
        self.items.iter().map(|item| item.block_id).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Per-block results of a batch.
///
/// A block missing from `results` counts as failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslationResponse {
    pub results: BTreeMap<BlockId, Result<String, BackendError>>,
}

impl TranslationResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(mut self, id: BlockId, result: Result<String, BackendError>) -> Self {
        self.results.insert(id, result);
        self
    }

    pub fn insert(&mut self, id: BlockId, result: Result<String, BackendError>) {
        self.results.insert(id, result);
    }

    /// Fail every block of a batch with the same error
    pub fn all_failed(batch: &TranslationBatch, error: BackendError) -> Self {
        let results = batch
            .items
            .iter()
            .map(|item| (item.block_id, Err(error.clone())))
            .collect();
        Self { results }
    }
}

/// Common trait for translation services
///
/// Implementations receive the whole batch plus context and answer per
/// block. An `Err` return fails every block of the batch.
#[async_trait]
pub trait TranslationBackend: Send + Sync + Debug {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    async fn translate(&self, batch: TranslationBatch) -> Result<TranslationResponse, BackendError>;
}
