use futures::future::join_all;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::engine::Engine;
use crate::errors::OcrError;
use crate::ocr::{FragmentSet, OcrEngine, ScreenSource};

/// Totals of a finished capture loop
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopSummary {
    pub cycles: u64,
    pub capture_failures: u64,
    pub capture_timeouts: u64,
    pub batches_spawned: u64,
}

/// Periodic capture -> OCR -> engine cycle.
///
/// Only one cycle runs at a time. Translation batches are spawned as
/// separate tasks and applied back to the engine when they resolve.
pub struct CaptureLoop {
    engine: Arc<Engine>,
    source: Arc<dyn ScreenSource>,
    ocr: Arc<dyn OcrEngine>,
    cancel: CancellationToken,
    max_cycles: Option<u64>,
}

impl CaptureLoop {
    pub fn new(engine: Arc<Engine>, source: Arc<dyn ScreenSource>, ocr: Arc<dyn OcrEngine>) -> Self {
        Self {
            engine,
            source,
            ocr,
            cancel: CancellationToken::new(),
            max_cycles: None,
        }
    }

    /// Stop on its own after `cycles` capture cycles
    pub fn with_max_cycles(mut self, cycles: u64) -> Self {
        self.max_cycles = Some(cycles);
        self
    }

    /// Token that stops the loop when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    async fn capture_once(&self) -> Result<FragmentSet, OcrError> {
        let bitmap = self.source.capture().await?;
        let settings = self.engine.config().ocr.settings_for(self.ocr.provider_id());
        let fragments = self.ocr.recognize(&bitmap, &settings).await?;
        Ok(FragmentSet::new(self.ocr.provider_id(), fragments))
    }

    /// Run until cancelled or the cycle limit is reached, then wait for
    /// outstanding translations
    pub async fn run(self) -> LoopSummary {
        let config = self.engine.config();
        let mut ticker = tokio::time::interval(Duration::from_millis(config.capture.interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let ocr_timeout = Duration::from_millis(config.capture.ocr_timeout_ms);

        let mut summary = LoopSummary::default();
        let mut tasks: Vec<JoinHandle<()>> = Vec::new();
        info!("Capture loop started ({} ms interval, provider {})", config.capture.interval_ms, self.ocr.provider_id());

        loop {
            if self.max_cycles.is_some_and(|max| summary.cycles >= max) {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.cancel.cancelled() => break,
            }

            if !self.engine.should_capture() {
                debug!("Capture paused while translating");
                tokio::select! {
                    _ = self.engine.wait_idle() => {}
                    _ = self.cancel.cancelled() => break,
                }
            }

            summary.cycles += 1;
            let set = match tokio::time::timeout(ocr_timeout, self.capture_once()).await {
                Ok(Ok(set)) => set,
                Ok(Err(e)) => {
                    warn!("Capture cycle {} failed: {}", summary.cycles, e);
                    summary.capture_failures += 1;
                    self.engine.tick(Instant::now().into_std());
                    continue;
                }
                Err(_) => {
                    warn!("Capture cycle {} timed out after {:?}", summary.cycles, ocr_timeout);
                    summary.capture_timeouts += 1;
                    self.engine.tick(Instant::now().into_std());
                    continue;
                }
            };

            let report = self.engine.process_cycle(set, Instant::now().into_std());
            if let Some(batch) = report.batch {
                summary.batches_spawned += 1;
                let engine = Arc::clone(&self.engine);
                tasks.push(tokio::spawn(async move {
                    engine.translate_batch(batch).await;
                }));
            }
            tasks.retain(|task| !task.is_finished());
        }

        if !tasks.is_empty() {
            debug!("Waiting for {} translation task(s)", tasks.len());
            for result in join_all(tasks).await {
                if let Err(e) = result {
                    warn!("Translation task failed: {}", e);
                }
            }
        }
        info!("Capture loop stopped after {} cycle(s)", summary.cycles);
        summary
    }
}
