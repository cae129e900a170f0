/*!
 * Common test utilities for the screenlate test suite
 */

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

use screenlate::app_config::Config;
use screenlate::translation::TranslationBackend;
use screenlate::{Engine, FragmentSet, Rect, TextFragment};


pub use recording::RecordingRenderer;

/// Route library logs through env_logger; safe to call from every test
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

pub fn fragment(text: &str, x: f32, y: f32, width: f32, height: f32) -> TextFragment {
    TextFragment::new(text, Rect::new(x, y, width, height))
}

/// One cycle from the default provider
pub fn frame(fragments: Vec<TextFragment>) -> FragmentSet {
    FragmentSet::new("default", fragments)
}

/// Defaults with a short clear delay so lifecycle tests stay small
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.stabilization.settle_time_ms = 150;
    config.stabilization.max_settle_time_ms = 1000;
    config.overlay.clear_delay_ms = 200;
    config
}

/// Engine wired to a recording renderer
pub fn engine_with(config: Config, backend: Arc<dyn TranslationBackend>) -> (Arc<Engine>, Arc<RecordingRenderer>) {
    init_logging();
    let renderer = Arc::new(RecordingRenderer::default());
    let engine = Arc::new(Engine::new(config, backend, renderer.clone()));
    (engine, renderer)
}

/// Feed the same fragments every 50 ms from `start` until a batch appears.
///
/// Returns the time of the cycle that produced it.
pub fn settle(engine: &Engine, fragments: &[TextFragment], start: Instant, max_cycles: u64) -> Option<(Instant, screenlate::translation::TranslationBatch)> {
    for i in 0..max_cycles {
        let now = start + ms(i * 50);
        let report = engine.process_cycle(frame(fragments.to_vec()), now);
        if let Some(batch) = report.batch {
            return Some((now, batch));
        }
    }
    None
}
