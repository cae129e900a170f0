/*!
 * Rolling translation context.
 *
 * Recent source/translation pairs are attached to every request so the
 * backend can keep names and tone consistent between text boxes.
 */

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::app_config::ContextConfig;

/// One previously translated piece of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    /// Monotonic sequence number, never reused
    pub seq: u64,
    pub source: String,
    pub translated: String,
}

impl ContextEntry {
    fn char_count(&self) -> usize {
        self.source.chars().count() + self.translated.chars().count()
    }
}

/// Immutable copy of the buffer, carried by a translation batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    /// Static game or document description
    #[serde(default)]
    pub game_info: Option<String>,

    /// Entries, oldest first
    pub entries: Vec<ContextEntry>,
}

impl ContextSnapshot {
    pub fn is_empty(&self) -> bool {
        self.game_info.is_none() && self.entries.is_empty()
    }

    /// Render as a prompt section
    pub fn to_prompt(&self) -> String {
        let mut out = String::new();
        if let Some(info) = &self.game_info {
            out.push_str("Context: ");
            out.push_str(info.trim());
            out.push('\n');
        }
        if !self.entries.is_empty() {
            out.push_str("Previous lines:\n");
            for entry in &self.entries {
                out.push_str(&format!("{} => {}\n", entry.source, entry.translated));
            }
        }
        out
    }
}

/// Bounded history of source/translation pairs
#[derive(Debug, Clone)]
pub struct ContextBuffer {
    entries: VecDeque<ContextEntry>,
    max_pieces: usize,
    min_size: usize,
    game_info: Option<String>,
    next_seq: u64,
    total_chars: usize,
}

impl ContextBuffer {
    pub fn new(max_pieces: usize, min_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_pieces,
            min_size,
            game_info: None,
            next_seq: 0,
            total_chars: 0,
        }
    }

    pub fn from_config(config: &ContextConfig) -> Self {
        Self::new(config.max_context_pieces, config.min_context_size).with_game_info(config.game_info.clone())
    }

    pub fn with_game_info(mut self, game_info: Option<String>) -> Self {
        self.set_game_info(game_info);
        self
    }

    pub fn set_game_info(&mut self, game_info: Option<String>) {
        self.game_info = game_info.filter(|info| !info.trim().is_empty());
    }

    /// Apply new bounds, evicting immediately if they shrank
    pub fn set_limits(&mut self, max_pieces: usize, min_size: usize) {
        self.max_pieces = max_pieces;
        self.min_size = min_size;
        self.evict();
    }

    /// Append a pair; returns its sequence number
    pub fn push(&mut self, source: &str, translated: &str) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;

        let entry = ContextEntry {
            seq,
            source: source.to_string(),
            translated: translated.to_string(),
        };
        self.total_chars += entry.char_count();
        self.entries.push_back(entry);
        self.evict();
        seq
    }

    fn evict(&mut self) {
        while self.entries.len() > self.max_pieces {
            self.pop_oldest();
        }
        if self.min_size == 0 {
            return;
        }
        while let Some(oldest) = self.entries.front() {
            if self.total_chars - oldest.char_count() < self.min_size {
                break;
            }
            self.pop_oldest();
        }
    }

    fn pop_oldest(&mut self) {
        if let Some(entry) = self.entries.pop_front() {
            self.total_chars -= entry.char_count();
        }
    }

    /// Entries oldest first, plus the static info
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            game_info: self.game_info.clone(),
            entries: self.entries.iter().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Characters held across all entries
    pub fn total_chars(&self) -> usize {
        self.total_chars
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_chars = 0;
    }
}
