/*!
 * # Screenlate - on-screen text stabilization for live translation overlays
 *
 * Turns noisy per-frame OCR output into stable text blocks, translates them
 * in batches with rolling context, and decides when overlay slots appear,
 * update and disappear.
 *
 * ## Features
 *
 * - Confidence and noise-phrase filtering of raw OCR fragments
 * - Per-provider glue rules merging fragments into text blocks
 * - Settle/debounce of animated text with a forced-progress bound
 * - Batched, deduplicated translation requests with timeouts and one retry
 * - Overlay slot lifecycle with delayed clear and leave-onscreen mode
 * - Translation cache and backend availability signal
 * - ISO 639-1 and ISO 639-2 language code support
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `ocr`: Fragment data model, capture/OCR traits, trace replay
 * - `filters`: Confidence and ignore-phrase filters
 * - `glue`: Fragment gluing
 * - `stabilization`: Block identity and the settle state machine
 * - `translation`: Context buffer, request queue, cache, backends
 * - `overlay`: Overlay slot lifecycle
 * - `engine`: Per-cycle orchestration under one lock
 * - `capture_loop`: Async capture scheduling
 * - `geometry`: Rectangle math
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::len_without_is_empty)]

pub mod app_config;
pub mod capture_loop;
pub mod engine;
pub mod errors;
pub mod filters;
pub mod geometry;
pub mod glue;
pub mod language_utils;
pub mod ocr;
pub mod overlay;
pub mod stabilization;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use capture_loop::{CaptureLoop, LoopSummary};
pub use engine::{CycleReport, Engine, EngineStats};
pub use errors::{AppError, BackendError, ConfigError, GlueError, OcrError};
pub use geometry::Rect;
pub use glue::{GlueEngine, GluedBlock};
pub use language_utils::{get_language_name, language_codes_match, normalize_language_code};
pub use ocr::{FragmentSet, TextFragment};
pub use overlay::{OverlayEvent, OverlayLifecycleManager, OverlayRenderer};
pub use stabilization::{BlockId, BlockState};
