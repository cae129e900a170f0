/*!
 * Per-cycle pipeline orchestration.
 *
 * The engine owns every mutable table (windows, context, queue, slots)
 * behind one lock. A capture cycle and a translation response never
 * interleave; the backend call itself runs outside the lock.
 */

use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

use crate::app_config::{Config, DisplayMode};
use crate::filters::{ConfidenceFilter, IgnorePhraseFilter};
use crate::glue::GlueEngine;
use crate::ocr::FragmentSet;
use crate::overlay::{OverlayEvent, OverlayLifecycleManager, OverlayRenderer};
use crate::stabilization::{
    BlockId, BlockState, FailureOutcome, StabilizationTracker, TrackerConfig, TrackerEvent,
};
use crate::translation::{
    BackendHealth, BackendStatus, BatchItem, BatchOutcome, ContextBuffer, TranslationBackend,
    TranslationBatch, TranslationCache, TranslationRequestQueue, dispatch,
};

/// Running counters, readable at any time
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EngineStats {
    pub cycles: u64,
    pub cycles_skipped: u64,
    pub fragments_seen: u64,
    pub dropped_low_confidence: u64,
    pub dropped_ignored: u64,
    pub blocks_stabilized: u64,
    pub forced_stabilizations: u64,
    pub cache_hits: u64,
    pub batches_sent: u64,
    pub translations_applied: u64,
    pub translations_failed: u64,
    pub translations_discarded: u64,
}

/// What one capture cycle did
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Gluing short-circuited; tracker state untouched
    pub skipped: bool,
    pub fragments: usize,
    pub dropped_low_confidence: usize,
    pub dropped_ignored: usize,
    pub blocks: usize,
    pub stabilized: Vec<BlockId>,
    /// Overlay changes already forwarded to the renderer
    pub events: Vec<OverlayEvent>,
    /// Batch to hand to [`Engine::execute`]
    pub batch: Option<TranslationBatch>,
}

struct EngineState {
    tracker: StabilizationTracker,
    context: ContextBuffer,
    queue: TranslationRequestQueue,
    overlay: OverlayLifecycleManager,
    cache: TranslationCache,
    health: BackendHealth,
    stats: EngineStats,
}

impl EngineState {
    fn new(config: &Config) -> Self {
        Self {
            tracker: StabilizationTracker::new(TrackerConfig::from_config(config)),
            context: ContextBuffer::from_config(&config.context),
            queue: TranslationRequestQueue::new(),
            overlay: OverlayLifecycleManager::new(
                config.overlay.margin_px,
                Duration::from_millis(config.overlay.clear_delay_ms),
            ),
            cache: TranslationCache::new(config.translation.cache_enabled),
            health: BackendHealth::new(config.translation.unavailable_after_failures),
            stats: EngineStats::default(),
        }
    }

    /// Bind a translated block to its slot.
    ///
    /// Other displayed blocks under the new slot are replaced and cleared.
    fn display(&mut self, config: &Config, id: BlockId, translated: &str, now: Instant, events: &mut Vec<OverlayEvent>) {
        let Some(window) = self.tracker.get(id) else {
            return;
        };
        let rect = window.rect;
        let text = match config.overlay.display_mode {
            DisplayMode::Translated => translated.to_string(),
            DisplayMode::Source => window.stabilized_text.clone().unwrap_or_default(),
        };

        for other in self.tracker.displayed_overlapping(id, &rect) {
            debug!("Block {} replaces block {} in the same region", id, other);
            events.extend(self.overlay.clear(other, now));
            self.tracker.mark_cleared(other, now);
        }
        events.push(self.overlay.bind(id, &text, rect));
    }

    /// Clear slots whose delay elapsed and mark their windows
    fn fire_due_clears(&mut self, now: Instant, events: &mut Vec<OverlayEvent>) {
        let cleared = self.overlay.tick(now);
        for event in &cleared {
            self.tracker.mark_cleared(event.block_id(), now);
        }
        events.extend(cleared);
    }

    fn handle_tracker_event(&mut self, config: &Config, event: TrackerEvent, now: Instant, events: &mut Vec<OverlayEvent>) {
        match event {
            TrackerEvent::Stabilized { forced, .. } => {
                self.stats.blocks_stabilized += 1;
                if forced {
                    self.stats.forced_stabilizations += 1;
                }
            }
            TrackerEvent::GeometryChanged { id, rect } => {
                events.extend(self.overlay.refresh_geometry(id, rect));
            }
            TrackerEvent::Vanished { id } => {
                let provider = self.tracker.get(id).map(|w| w.provider.clone()).unwrap_or_default();
                if config.leave_translation_onscreen(&provider) {
                    debug!("Block {} vanished, translation stays onscreen", id);
                } else if !self.overlay.has_pending_clear(id) {
                    let delay = Duration::from_millis(config.overlay.clear_delay_ms);
                    self.overlay.schedule_clear(id, now + delay);
                }
            }
            TrackerEvent::Reappeared { id } => {
                self.overlay.cancel_clear(id);
            }
            TrackerEvent::Replaced { id } => {
                if config.overlay.keep_translated_until_replaced {
                    self.overlay.cancel_clear(id);
                } else {
                    events.extend(self.overlay.clear(id, now));
                }
            }
            TrackerEvent::Evicted { id } => {
                events.extend(self.overlay.clear(id, now));
                self.overlay.remove(id);
            }
        }
    }
}

/// Stabilization and translation engine shared by the capture loop and
/// the translation tasks
pub struct Engine {
    config: RwLock<Arc<Config>>,
    state: Mutex<EngineState>,
    backend: Arc<dyn TranslationBackend>,
    renderer: Arc<dyn OverlayRenderer>,
    idle: Notify,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("backend", &self.backend.name())
            .field("renderer", &self.renderer)
            .finish_non_exhaustive()
    }
}

/// Clamp a configuration before it is installed
fn sanitized(config: Config) -> Config {
    let (config, fixes) = config.sanitize();
    for fix in &fixes {
        warn!("Config: {}", fix);
    }
    config
}

impl Engine {
    pub fn new(config: Config, backend: Arc<dyn TranslationBackend>, renderer: Arc<dyn OverlayRenderer>) -> Self {
        let config = sanitized(config);
        let state = EngineState::new(&config);
        Self {
            config: RwLock::new(Arc::new(config)),
            state: Mutex::new(state),
            backend,
            renderer,
            idle: Notify::new(),
        }
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> Arc<Config> {
        self.config.read().clone()
    }

    /// Swap the configuration; tracked blocks keep their timers.
    ///
    /// Out-of-range values are replaced with defaults first.
    pub fn reload_config(&self, config: Config) {
        let config = sanitized(config);
        let mut state = self.state.lock();
        state.tracker.set_config(TrackerConfig::from_config(&config));
        state
            .context
            .set_limits(config.context.max_context_pieces, config.context.min_context_size);
        state.context.set_game_info(config.context.game_info.clone());
        state.overlay.set_margin(config.overlay.margin_px);
        state.overlay.set_retain(Duration::from_millis(config.overlay.clear_delay_ms));
        state.cache.set_enabled(config.translation.cache_enabled);
        state.health.set_threshold(config.translation.unavailable_after_failures);
        *self.config.write() = Arc::new(config);
        info!("Configuration reloaded");
    }

    fn emit(&self, events: &[OverlayEvent]) {
        for event in events {
            self.renderer.handle(event);
        }
    }

    /// Run filters, glue and stabilization on one cycle's fragments.
    ///
    /// Cached translations are displayed right away; everything else that
    /// became stable is returned as a single batch.
    pub fn process_cycle(&self, set: FragmentSet, now: Instant) -> CycleReport {
        let config = self.config();
        let settings = config.ocr.settings_for(set.provider());
        let mut report = CycleReport {
            fragments: set.len(),
            ..Default::default()
        };

        let confident = ConfidenceFilter::from_settings(&settings).apply(set.fragments());
        report.dropped_low_confidence = set.len() - confident.len();
        let before_ignore = confident.len();
        let kept = IgnorePhraseFilter::new(&config.filters.ignore_phrases, config.filters.case_sensitive).apply(confident);
        report.dropped_ignored = before_ignore - kept.len();

        let glued = GlueEngine::new(settings.glue.clone(), config.capture.max_fragments_per_cycle).glue(&kept);

        let mut events = Vec::new();
        {
            let mut state = self.state.lock();
            state.stats.cycles += 1;
            state.stats.fragments_seen += report.fragments as u64;
            state.stats.dropped_low_confidence += report.dropped_low_confidence as u64;
            state.stats.dropped_ignored += report.dropped_ignored as u64;

            match glued {
                Err(e) => {
                    debug!("Cycle skipped: {}", e);
                    state.stats.cycles_skipped += 1;
                    report.skipped = true;
                }
                Ok(blocks) => {
                    report.blocks = blocks.len();
                    let tracker_events = state.tracker.update(&blocks, set.provider(), now);
                    for event in tracker_events {
                        if let TrackerEvent::Stabilized { id, .. } = event {
                            report.stabilized.push(id);
                        }
                        state.handle_tracker_event(&config, event, now, &mut events);
                    }
                }
            }

            state.fire_due_clears(now, &mut events);

            if !report.skipped {
                report.batch = self.collect_ready(&mut state, &config, now, &mut events);
            }
        }

        self.emit(&events);
        report.events = events;
        report
    }

    /// Overlay timers only, for cycles without OCR output
    pub fn tick(&self, now: Instant) -> Vec<OverlayEvent> {
        let mut events = Vec::new();
        self.state.lock().fire_due_clears(now, &mut events);
        self.emit(&events);
        events
    }

    fn collect_ready(
        &self,
        state: &mut EngineState,
        config: &Config,
        now: Instant,
        events: &mut Vec<OverlayEvent>,
    ) -> Option<TranslationBatch> {
        let mut items = Vec::new();
        for ready in state.tracker.ready_for_translation() {
            let cached = state
                .cache
                .get(&ready.text, &config.source_language, &config.target_language);
            match cached {
                Some(translated) => {
                    state.stats.cache_hits += 1;
                    state.tracker.begin_translation(ready.id);
                    state.tracker.complete_translation(ready.id, &translated);
                    state.context.push(&ready.text, &translated);
                    state.display(config, ready.id, &translated, now, events);
                }
                None => items.push(BatchItem {
                    block_id: ready.id,
                    source_text: ready.text,
                    rect: ready.rect,
                }),
            }
        }

        let context = state.context.snapshot();
        let batch = state
            .queue
            .submit(items, context, &config.source_language, &config.target_language)?;
        for id in batch.block_ids() {
            state.tracker.begin_translation(id);
        }
        state.stats.batches_sent += 1;
        Some(batch)
    }

    /// Send a batch to the backend with the configured timeout
    pub async fn execute(&self, batch: TranslationBatch) -> BatchOutcome {
        let timeout = Duration::from_secs(self.config().translation.timeout_secs);
        dispatch(self.backend.as_ref(), batch, timeout).await
    }

    /// Apply a resolved batch: display successes, retry or drop failures
    pub fn apply_outcome(&self, outcome: BatchOutcome, now: Instant) -> Vec<OverlayEvent> {
        let config = self.config();
        let mut events = Vec::new();
        {
            let mut state = self.state.lock();
            state.queue.complete(outcome.batch_id());

            for item in &outcome.batch.items {
                let Some(result) = outcome.results.get(&item.block_id) else {
                    continue;
                };
                match result {
                    Ok(translated) => {
                        state.health.record_success();
                        state.cache.store(
                            &item.source_text,
                            &outcome.batch.source_language,
                            &outcome.batch.target_language,
                            translated,
                        );
                        if state.tracker.complete_translation(item.block_id, translated) {
                            state.stats.translations_applied += 1;
                            state.context.push(&item.source_text, translated);
                            state.display(&config, item.block_id, translated, now, &mut events);
                        } else {
                            debug!("Discarding translation for block {}: no longer waiting", item.block_id);
                            state.stats.translations_discarded += 1;
                        }
                    }
                    Err(e) => {
                        state.stats.translations_failed += 1;
                        state.health.record_failure(&e.to_string());
                        match state.tracker.fail_translation(item.block_id) {
                            FailureOutcome::WillRetry => {
                                debug!("Block {} failed ({}), will retry", item.block_id, e)
                            }
                            FailureOutcome::Exhausted => {
                                warn!("Block {} failed again ({}), giving up", item.block_id, e)
                            }
                            FailureOutcome::Unknown => {}
                        }
                    }
                }
            }

            if state.queue.is_idle() {
                self.idle.notify_waiters();
            }
        }

        self.emit(&events);
        events
    }

    /// Execute and apply in one step
    pub async fn translate_batch(&self, batch: TranslationBatch) -> Vec<OverlayEvent> {
        let outcome = self.execute(batch).await;
        self.apply_outcome(outcome, tokio::time::Instant::now().into_std())
    }

    /// Hide every slot; in-flight results for them are discarded
    pub fn clear_all_overlays(&self, now: Instant) -> Vec<OverlayEvent> {
        let events = {
            let mut state = self.state.lock();
            let owners: Vec<BlockId> = state
                .tracker
                .windows()
                .filter(|w| matches!(w.state, BlockState::Displayed | BlockState::Translating))
                .map(|w| w.id)
                .collect();
            for id in owners {
                state.tracker.mark_cleared(id, now);
            }
            state.overlay.clear_all(now)
        };
        info!("Cleared {} overlay(s)", events.len());
        self.emit(&events);
        events
    }

    /// False while a batch is in flight and OCR pauses during translation
    pub fn should_capture(&self) -> bool {
        if !self.config().capture.pause_ocr_while_translating {
            return true;
        }
        self.state.lock().queue.is_idle()
    }

    /// Wait until no batch is in flight
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            let idle = self.state.lock().queue.is_idle();
            if idle {
                return;
            }
            notified.await;
        }
    }

    pub fn backend_status(&self) -> BackendStatus {
        self.state.lock().health.status()
    }

    pub fn stats(&self) -> EngineStats {
        self.state.lock().stats.clone()
    }

    pub fn block_state(&self, id: BlockId) -> Option<BlockState> {
        self.state.lock().tracker.state_of(id)
    }

    pub fn tracked_blocks(&self) -> usize {
        self.state.lock().tracker.len()
    }

    pub fn visible_overlays(&self) -> usize {
        self.state.lock().overlay.visible_count()
    }

    pub fn context_len(&self) -> usize {
        self.state.lock().context.len()
    }
}
