/*!
 * Mock translation backend for tests and trace replay.
 *
 * - `MockBackend::working()` - translates every block
 * - `MockBackend::partial()` - rejects every other block of a batch
 * - `MockBackend::intermittent(n)` - fails every nth batch
 * - `MockBackend::failing()` - fails every batch
 * - `MockBackend::slow(ms)` - translates after a delay
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::backend::{TranslationBackend, TranslationBatch, TranslationResponse};
use crate::errors::BackendError;

/// Behavior mode for the mock backend
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds
    Working,
    /// Rejects the blocks at odd positions of each batch
    Partial,
    /// Fails every Nth batch
    Intermittent { fail_every: usize },
    /// Always fails with an error
    Failing,
    /// Succeeds after a delay (for timeout testing)
    Slow { delay_ms: u64 },
}

/// Scripted [`TranslationBackend`]; clones share counters and history
#[derive(Debug, Clone)]
pub struct MockBackend {
    behavior: MockBehavior,
    request_count: Arc<AtomicUsize>,
    received: Arc<Mutex<Vec<TranslationBatch>>>,
    custom_response: Option<fn(&str, &str) -> String>,
}

impl MockBackend {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            received: Arc::new(Mutex::new(Vec::new())),
            custom_response: None,
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn partial() -> Self {
        Self::new(MockBehavior::Partial)
    }

    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent {
            fail_every: fail_every.max(1),
        })
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Replace the default `[target] source` translation
    pub fn with_custom_response(mut self, generator: fn(&str, &str) -> String) -> Self {
        self.custom_response = Some(generator);
        self
    }

    /// Batches received so far
    pub fn received(&self) -> Vec<TranslationBatch> {
        self.received.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    fn render(&self, source: &str, target_language: &str) -> String {
        match self.custom_response {
            Some(generator) => generator(source, target_language),
            None => format!("[{}] {}", target_language, source),
        }
    }

    fn translate_all(&self, batch: &TranslationBatch) -> TranslationResponse {
        let mut response = TranslationResponse::new();
        for item in &batch.items {
            response.insert(item.block_id, Ok(self.render(&item.source_text, &batch.target_language)));
        }
        response
    }
}

#[async_trait]
impl TranslationBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn translate(&self, batch: TranslationBatch) -> Result<TranslationResponse, BackendError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.received.lock().push(batch.clone());

        match self.behavior {
            MockBehavior::Working => Ok(self.translate_all(&batch)),

            MockBehavior::Partial => {
                let mut response = TranslationResponse::new();
                for (i, item) in batch.items.iter().enumerate() {
                    let result = if i % 2 == 1 {
                        Err(BackendError::Rejected(format!("Simulated rejection of block {}", item.block_id)))
                    } else {
                        Ok(self.render(&item.source_text, &batch.target_language))
                    };
                    response.insert(item.block_id, result);
                }
                Ok(response)
            }

            MockBehavior::Intermittent { fail_every } => {
                if count % fail_every == fail_every - 1 {
                    Err(BackendError::RequestFailed(format!(
                        "Simulated intermittent failure (request #{})",
                        count + 1
                    )))
                } else {
                    Ok(self.translate_all(&batch))
                }
            }

            MockBehavior::Failing => Err(BackendError::RequestFailed("Simulated backend failure".to_string())),

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                Ok(self.translate_all(&batch))
            }
        }
    }
}
