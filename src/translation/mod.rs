/*!
 * Translation side of the pipeline.
 *
 * - `context`: rolling history of previous translations
 * - `queue`: batching and in-flight bookkeeping
 * - `backend`: the trait external translation services implement
 * - `cache`: reuse of earlier translations
 * - `health`: backend availability signal
 * - `mock`: scripted backend for tests and trace replay
 */

pub use self::backend::{BatchItem, TranslationBackend, TranslationBatch, TranslationResponse};
pub use self::cache::{CacheStats, TranslationCache};
pub use self::context::{ContextBuffer, ContextEntry, ContextSnapshot};
pub use self::health::{BackendHealth, BackendStatus};
pub use self::mock::{MockBackend, MockBehavior};
pub use self::queue::{BatchOutcome, TranslationRequestQueue, dispatch};

pub mod backend;
pub mod cache;
pub mod context;
pub mod health;
pub mod mock;
pub mod queue;
