/*!
 * Overlay slot lifecycle.
 *
 * Each displayed block owns one slot. The manager only decides what is on
 * screen and when it goes away; painting is done by an [`OverlayRenderer`]
 * fed with the events returned from every operation.
 */

use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::time::{Duration, Instant};

use crate::geometry::Rect;
use crate::stabilization::BlockId;

/// Change to what the overlay shows
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum OverlayEvent {
    Created { id: BlockId, rect: Rect, text: String },
    Updated { id: BlockId, rect: Rect, text: String },
    Cleared { id: BlockId },
}

impl OverlayEvent {
    pub fn block_id(&self) -> BlockId {
        match self {
            Self::Created { id, .. } | Self::Updated { id, .. } | Self::Cleared { id } => *id,
        }
    }
}

/// Receives overlay events; implemented by the host's painting layer
pub trait OverlayRenderer: Send + Sync + Debug {
    fn handle(&self, event: &OverlayEvent);
}

/// Renderer that drops every event
#[derive(Debug, Default)]
pub struct NullRenderer;

impl OverlayRenderer for NullRenderer {
    fn handle(&self, _event: &OverlayEvent) {}
}

/// Display state bound to one block
#[derive(Debug, Clone, PartialEq)]
pub struct OverlaySlot {
    pub block_id: BlockId,
    pub text: String,
    /// Block rectangle grown by the overlay margin
    pub rect: Rect,
    /// Hidden; kept until `retain` passes without a rebind
    pub cleared: bool,
    pub clear_at: Option<Instant>,
    cleared_at: Option<Instant>,
}

/// Owns every overlay slot
#[derive(Debug, Default)]
pub struct OverlayLifecycleManager {
    slots: BTreeMap<BlockId, OverlaySlot>,
    margin: f32,
    retain: Duration,
}

impl OverlayLifecycleManager {
    pub fn new(margin: f32, retain: Duration) -> Self {
        Self {
            slots: BTreeMap::new(),
            margin,
            retain,
        }
    }

    pub fn set_margin(&mut self, margin: f32) {
        self.margin = margin;
    }

    pub fn set_retain(&mut self, retain: Duration) {
        self.retain = retain;
    }

    pub fn get(&self, id: BlockId) -> Option<&OverlaySlot> {
        self.slots.get(&id)
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.slots.contains_key(&id)
    }

    /// Slot exists and is on screen
    pub fn is_visible(&self, id: BlockId) -> bool {
        self.slots.get(&id).is_some_and(|slot| !slot.cleared)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slots currently on screen
    pub fn visible_count(&self) -> usize {
        self.slots.values().filter(|slot| !slot.cleared).count()
    }

    pub fn slots(&self) -> impl Iterator<Item = &OverlaySlot> {
        self.slots.values()
    }

    /// Show `text` for a block, creating its slot or replacing its content
    pub fn bind(&mut self, id: BlockId, text: &str, block_rect: Rect) -> OverlayEvent {
        let rect = block_rect.expand(self.margin);
        match self.slots.get_mut(&id) {
            Some(slot) if !slot.cleared => {
                slot.text = text.to_string();
                slot.rect = rect;
                slot.clear_at = None;
                OverlayEvent::Updated {
                    id,
                    rect,
                    text: text.to_string(),
                }
            }
            _ => {
                debug!("Overlay slot created for block {}", id);
                self.slots.insert(
                    id,
                    OverlaySlot {
                        block_id: id,
                        text: text.to_string(),
                        rect,
                        cleared: false,
                        clear_at: None,
                        cleared_at: None,
                    },
                );
                OverlayEvent::Created {
                    id,
                    rect,
                    text: text.to_string(),
                }
            }
        }
    }

    /// Replace the text of a live slot
    pub fn refresh(&mut self, id: BlockId, text: &str) -> Option<OverlayEvent> {
        let slot = self.slots.get_mut(&id).filter(|s| !s.cleared)?;
        if slot.text == text {
            return None;
        }
        slot.text = text.to_string();
        Some(OverlayEvent::Updated {
            id,
            rect: slot.rect,
            text: slot.text.clone(),
        })
    }

    /// Follow a block rectangle change
    pub fn refresh_geometry(&mut self, id: BlockId, block_rect: Rect) -> Option<OverlayEvent> {
        let rect = block_rect.expand(self.margin);
        let slot = self.slots.get_mut(&id).filter(|s| !s.cleared)?;
        if slot.rect == rect {
            return None;
        }
        slot.rect = rect;
        Some(OverlayEvent::Updated {
            id,
            rect,
            text: slot.text.clone(),
        })
    }

    /// Clear the slot at `at`, replacing any pending clear
    pub fn schedule_clear(&mut self, id: BlockId, at: Instant) -> bool {
        match self.slots.get_mut(&id) {
            Some(slot) if !slot.cleared => {
                slot.clear_at = Some(at);
                true
            }
            _ => false,
        }
    }

    pub fn cancel_clear(&mut self, id: BlockId) -> bool {
        self.slots
            .get_mut(&id)
            .and_then(|slot| slot.clear_at.take())
            .is_some()
    }

    pub fn has_pending_clear(&self, id: BlockId) -> bool {
        self.slots.get(&id).is_some_and(|slot| slot.clear_at.is_some())
    }

    /// Hide a slot right away
    pub fn clear(&mut self, id: BlockId, now: Instant) -> Option<OverlayEvent> {
        let slot = self.slots.get_mut(&id).filter(|s| !s.cleared)?;
        slot.cleared = true;
        slot.clear_at = None;
        slot.cleared_at = Some(now);
        debug!("Overlay slot cleared for block {}", id);
        Some(OverlayEvent::Cleared { id })
    }

    /// Clear every slot whose scheduled time has passed, then destroy
    /// slots that stayed cleared for the retain window
    pub fn tick(&mut self, now: Instant) -> Vec<OverlayEvent> {
        let due: Vec<BlockId> = self
            .slots
            .values()
            .filter(|slot| !slot.cleared && slot.clear_at.is_some_and(|at| at <= now))
            .map(|slot| slot.block_id)
            .collect();
        let events = due.into_iter().filter_map(|id| self.clear(id, now)).collect();

        let retain = self.retain;
        self.slots.retain(|_, slot| {
            slot.cleared_at
                .is_none_or(|at| now.saturating_duration_since(at) < retain)
        });
        events
    }

    /// Drop a slot without an event
    pub fn remove(&mut self, id: BlockId) -> Option<OverlaySlot> {
        self.slots.remove(&id)
    }

    pub fn clear_all(&mut self, now: Instant) -> Vec<OverlayEvent> {
        let ids: Vec<BlockId> = self.slots.keys().copied().collect();
        ids.into_iter().filter_map(|id| self.clear(id, now)).collect()
    }
}
