use log::{debug, info};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use super::state::{BlockId, BlockState, FailureOutcome};
use crate::app_config::Config;
use crate::geometry::Rect;
use crate::glue::GluedBlock;

/// Timing and matching thresholds of the tracker
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Unchanged time after which a block is final
    pub settle_time: Duration,
    /// Time since first observation after which a block is forced final
    pub max_settle_time: Duration,
    /// Minimum overlap ratio for matching a block to a window
    pub min_match_overlap: f32,
    /// How long an undisplayed or cleared window may go unseen
    pub unseen_grace: Duration,
    /// Whether force-stabilized blocks get a retry after a failure
    pub retry_forced_blocks: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl TrackerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            settle_time: Duration::from_millis(config.stabilization.settle_time_ms),
            max_settle_time: Duration::from_millis(config.stabilization.max_settle_time_ms),
            min_match_overlap: config.stabilization.min_match_overlap,
            unseen_grace: Duration::from_millis(config.overlay.clear_delay_ms),
            retry_forced_blocks: config.stabilization.retry_forced_blocks,
        }
    }
}

/// Per-block settle state: a `TextBlock` with its timers
#[derive(Debug, Clone)]
pub struct StabilizationWindow {
    pub id: BlockId,
    pub state: BlockState,
    /// Provider whose fragments formed the block
    pub provider: String,
    /// Most recently observed text
    pub text: String,
    /// Bounding rectangle; only grows while settling
    pub rect: Rect,
    pub first_seen: Instant,
    pub last_seen: Instant,
    pub last_changed: Instant,
    /// Accumulated time the text stayed identical
    pub unchanged_for: Duration,
    /// Text that was sent for translation
    pub stabilized_text: Option<String>,
    /// Latest translation received
    pub translated_text: Option<String>,
    /// Reached `Stable` through the max-settle escape hatch
    pub forced: bool,
    /// Translation attempts since the window was created or reopened
    pub attempts: u8,
    /// Set while a displayed block is missing from the screen
    pub missing_since: Option<Instant>,
    pub cleared_at: Option<Instant>,
    seen_cycle: u64,
}

impl StabilizationWindow {
    fn new(id: BlockId, block: &GluedBlock, provider: &str, now: Instant, cycle: u64) -> Self {
        Self {
            id,
            state: BlockState::Detected,
            provider: provider.to_string(),
            text: block.text.clone(),
            rect: block.rect,
            first_seen: now,
            last_seen: now,
            last_changed: now,
            unchanged_for: Duration::ZERO,
            stabilized_text: None,
            translated_text: None,
            forced: false,
            attempts: 0,
            missing_since: None,
            cleared_at: None,
            seen_cycle: cycle,
        }
    }

    /// Start a fresh settle window in place, keeping the id and translation
    fn reopen(&mut self, block: &GluedBlock, now: Instant) {
        self.state = BlockState::Detected;
        self.text = block.text.clone();
        self.rect = block.rect;
        self.first_seen = now;
        self.last_changed = now;
        self.unchanged_for = Duration::ZERO;
        self.forced = false;
        self.attempts = 0;
        self.missing_since = None;
        self.cleared_at = None;
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.first_seen)
    }

    fn max_attempts(&self, config: &TrackerConfig) -> u8 {
        if self.forced && !config.retry_forced_blocks { 1 } else { 2 }
    }
}

/// Something the engine must react to after a tracker update
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    /// A block reached `Stable`
    Stabilized { id: BlockId, forced: bool },
    /// A displayed block's rectangle changed
    GeometryChanged { id: BlockId, rect: Rect },
    /// A displayed block is missing from the screen
    Vanished { id: BlockId },
    /// A missing displayed block is visible again
    Reappeared { id: BlockId },
    /// A displayed or cleared block shows new text and settles again
    Replaced { id: BlockId },
    /// The window was dropped
    Evicted { id: BlockId },
}

/// Block to translate, taken from a `Stable` window
#[derive(Debug, Clone, PartialEq)]
pub struct ReadyBlock {
    pub id: BlockId,
    pub text: String,
    pub rect: Rect,
    pub provider: String,
}

/// Tracks block identity and settle timers across capture cycles
#[derive(Debug)]
pub struct StabilizationTracker {
    config: TrackerConfig,
    windows: BTreeMap<BlockId, StabilizationWindow>,
    next_id: u64,
    cycle: u64,
}

impl StabilizationTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            windows: BTreeMap::new(),
            next_id: 1,
            cycle: 0,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Swap thresholds; existing windows keep their timers
    pub fn set_config(&mut self, config: TrackerConfig) {
        self.config = config;
    }

    pub fn get(&self, id: BlockId) -> Option<&StabilizationWindow> {
        self.windows.get(&id)
    }

    pub fn windows(&self) -> impl Iterator<Item = &StabilizationWindow> {
        self.windows.values()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn state_of(&self, id: BlockId) -> Option<BlockState> {
        self.windows.get(&id).map(|w| w.state)
    }

    /// Greedy best-overlap assignment of blocks to windows.
    ///
    /// Returns, per block index, the matched window id.
    fn match_blocks(&self, blocks: &[GluedBlock]) -> Vec<Option<BlockId>> {
        let mut candidates: Vec<(f32, BlockId, usize)> = Vec::new();
        for (bi, block) in blocks.iter().enumerate() {
            for window in self.windows.values() {
                let ratio = window.rect.overlap_ratio(&block.rect);
                if ratio >= self.config.min_match_overlap {
                    candidates.push((ratio, window.id, bi));
                }
            }
        }
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        let mut assignment: Vec<Option<BlockId>> = vec![None; blocks.len()];
        let mut taken: Vec<BlockId> = Vec::new();
        for (_, id, bi) in candidates {
            if assignment[bi].is_none() && !taken.contains(&id) {
                assignment[bi] = Some(id);
                taken.push(id);
            }
        }
        assignment
    }

    fn check_settled(config: &TrackerConfig, window: &mut StabilizationWindow, now: Instant) -> Option<TrackerEvent> {
        if !window.state.is_settling() {
            return None;
        }
        let settled = window.unchanged_for >= config.settle_time;
        let overdue = window.age(now) >= config.max_settle_time;
        if !(settled || overdue) {
            return None;
        }
        window.state = BlockState::Stable;
        window.forced = !settled;
        if window.forced {
            info!("Block {} forced stable after {:?}: '{}'", window.id, window.age(now), window.text);
        } else {
            debug!("Block {} stable after {:?} unchanged", window.id, window.unchanged_for);
        }
        Some(TrackerEvent::Stabilized {
            id: window.id,
            forced: window.forced,
        })
    }

    /// Apply one cycle's glued blocks
    pub fn update(&mut self, blocks: &[GluedBlock], provider: &str, now: Instant) -> Vec<TrackerEvent> {
        self.cycle += 1;
        let cycle = self.cycle;
        let config = self.config.clone();
        let assignment = self.match_blocks(blocks);
        let mut events = Vec::new();

        for (block, matched) in blocks.iter().zip(assignment) {
            let Some(id) = matched else {
                let id = BlockId(self.next_id);
                self.next_id += 1;
                let mut window = StabilizationWindow::new(id, block, provider, now, cycle);
                debug!("Block {} detected at {:?}: '{}'", id, block.rect, block.text);
                events.extend(Self::check_settled(&config, &mut window, now));
                self.windows.insert(id, window);
                continue;
            };

            let Some(window) = self.windows.get_mut(&id) else {
                continue;
            };
            let delta = now.saturating_duration_since(window.last_seen);
            window.last_seen = now;
            window.seen_cycle = cycle;
            let text_changed = window.text != block.text;

            match window.state {
                BlockState::Detected | BlockState::Settling | BlockState::Stable => {
                    if text_changed {
                        window.text = block.text.clone();
                        window.unchanged_for = Duration::ZERO;
                        window.last_changed = now;
                        // A new settle window; the failure budget stays with the window
                        if window.state == BlockState::Stable {
                            window.first_seen = now;
                            window.forced = false;
                        }
                        window.state = BlockState::Settling;
                    } else {
                        window.unchanged_for += delta;
                        if window.state == BlockState::Detected {
                            window.state = BlockState::Settling;
                        }
                    }
                    window.rect = window.rect.union(&block.rect);
                    events.extend(Self::check_settled(&config, window, now));
                }
                BlockState::Translating => {
                    if text_changed {
                        window.text = block.text.clone();
                        window.unchanged_for = Duration::ZERO;
                        window.last_changed = now;
                    } else {
                        window.unchanged_for += delta;
                    }
                    window.rect = window.rect.union(&block.rect);
                }
                BlockState::Displayed => {
                    let replaced = window.stabilized_text.as_deref() != Some(block.text.as_str());
                    if replaced {
                        debug!("Block {} replaced: '{}'", id, block.text);
                        window.reopen(block, now);
                        events.push(TrackerEvent::Replaced { id });
                        events.extend(Self::check_settled(&config, window, now));
                        continue;
                    }
                    window.text = block.text.clone();
                    if window.missing_since.take().is_some() {
                        events.push(TrackerEvent::Reappeared { id });
                    }
                    if window.rect != block.rect {
                        window.rect = block.rect;
                        events.push(TrackerEvent::GeometryChanged { id, rect: block.rect });
                    }
                }
                BlockState::Cleared => {
                    debug!("Block {} reopened: '{}'", id, block.text);
                    window.reopen(block, now);
                    events.push(TrackerEvent::Replaced { id });
                    events.extend(Self::check_settled(&config, window, now));
                }
            }
        }

        // Windows not seen this cycle
        let mut evicted = Vec::new();
        for window in self.windows.values_mut() {
            if window.seen_cycle == cycle {
                continue;
            }
            let unseen = now.saturating_duration_since(window.last_seen);
            match window.state {
                BlockState::Detected | BlockState::Settling | BlockState::Stable => {
                    if unseen > config.unseen_grace {
                        evicted.push(window.id);
                    }
                }
                BlockState::Translating => {}
                BlockState::Displayed => {
                    if window.missing_since.is_none() {
                        window.missing_since = Some(now);
                        events.push(TrackerEvent::Vanished { id: window.id });
                    }
                }
                BlockState::Cleared => {
                    let cleared_for = window
                        .cleared_at
                        .map(|t| now.saturating_duration_since(t))
                        .unwrap_or(unseen);
                    if cleared_for >= config.unseen_grace && unseen >= config.unseen_grace {
                        evicted.push(window.id);
                    }
                }
            }
        }
        for id in evicted {
            self.windows.remove(&id);
            debug!("Block {} evicted", id);
            events.push(TrackerEvent::Evicted { id });
        }

        events
    }

    /// `Stable` windows seen this cycle that still have an attempt left
    pub fn ready_for_translation(&self) -> Vec<ReadyBlock> {
        self.windows
            .values()
            .filter(|w| {
                w.state == BlockState::Stable
                    && w.seen_cycle == self.cycle
                    && w.attempts < w.max_attempts(&self.config)
            })
            .map(|w| ReadyBlock {
                id: w.id,
                text: w.text.clone(),
                rect: w.rect,
                provider: w.provider.clone(),
            })
            .collect()
    }

    /// `Stable` -> `Translating`; returns the text being translated
    pub fn begin_translation(&mut self, id: BlockId) -> Option<String> {
        let window = self.windows.get_mut(&id)?;
        if window.state != BlockState::Stable {
            return None;
        }
        window.state = BlockState::Translating;
        window.attempts += 1;
        window.stabilized_text = Some(window.text.clone());
        window.stabilized_text.clone()
    }

    /// `Translating` -> `Displayed`
    pub fn complete_translation(&mut self, id: BlockId, translated: &str) -> bool {
        let Some(window) = self.windows.get_mut(&id) else {
            return false;
        };
        if window.state != BlockState::Translating {
            return false;
        }
        window.state = BlockState::Displayed;
        window.translated_text = Some(translated.to_string());
        window.missing_since = None;
        true
    }

    /// `Translating` -> `Stable`, with or without a retry left
    pub fn fail_translation(&mut self, id: BlockId) -> FailureOutcome {
        let Some(window) = self.windows.get_mut(&id) else {
            return FailureOutcome::Unknown;
        };
        if window.state != BlockState::Translating {
            return FailureOutcome::Unknown;
        }
        window.state = BlockState::Stable;
        if window.attempts < window.max_attempts(&self.config) {
            FailureOutcome::WillRetry
        } else {
            FailureOutcome::Exhausted
        }
    }

    /// `Displayed`/`Translating` -> `Cleared`
    pub fn mark_cleared(&mut self, id: BlockId, now: Instant) -> bool {
        let Some(window) = self.windows.get_mut(&id) else {
            return false;
        };
        if !matches!(window.state, BlockState::Displayed | BlockState::Translating) {
            return false;
        }
        window.state = BlockState::Cleared;
        window.cleared_at = Some(now);
        window.missing_since = None;
        true
    }

    /// Displayed windows other than `id` that intersect `rect`
    pub fn displayed_overlapping(&self, id: BlockId, rect: &Rect) -> Vec<BlockId> {
        self.windows
            .values()
            .filter(|w| w.id != id && w.state == BlockState::Displayed)
            .filter(|w| w.rect.intersection_area(rect) > 0.0)
            .map(|w| w.id)
            .collect()
    }

    /// Drop a window regardless of state
    pub fn remove(&mut self, id: BlockId) -> Option<StabilizationWindow> {
        self.windows.remove(&id)
    }
}
