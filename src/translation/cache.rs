/*!
 * Translation caching.
 *
 * Games repeat the same lines constantly (menus, battle messages). A block
 * whose stabilized text was translated before is displayed straight from
 * the cache without a backend round trip.
 */

use log::debug;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::language_utils::normalize_language_code;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    source_text: String,
    source_language: String,
    target_language: String,
}

impl CacheKey {
    fn new(source_text: &str, source_language: &str, target_language: &str) -> Self {
        Self {
            source_text: source_text.trim().to_string(),
            source_language: normalize_language_code(source_language),
            target_language: normalize_language_code(target_language),
        }
    }
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<CacheKey, String>,
    hits: usize,
    misses: usize,
}

/// Hit/miss counters of a [`TranslationCache`]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 { 0.0 } else { self.hits as f64 / total as f64 }
    }
}

/// Shared source text -> translation map; clones share storage
#[derive(Debug, Clone)]
pub struct TranslationCache {
    inner: Arc<RwLock<CacheInner>>,
    enabled: bool,
}

impl TranslationCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            inner: Arc::new(RwLock::new(CacheInner::default())),
            enabled,
        }
    }

    pub fn get(&self, source_text: &str, source_language: &str, target_language: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }

        let key = CacheKey::new(source_text, source_language, target_language);
        let mut inner = self.inner.write();
        match inner.entries.get(&key).cloned() {
            Some(translation) => {
                inner.hits += 1;
                debug!("Cache hit for '{}' ({} -> {})", truncate_text(source_text, 30),
                    key.source_language, key.target_language);
                Some(translation)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    pub fn store(&self, source_text: &str, source_language: &str, target_language: &str, translation: &str) {
        if !self.enabled || translation.trim().is_empty() {
            return;
        }

        let key = CacheKey::new(source_text, source_language, target_language);
        self.inner.write().entries.insert(key, translation.to_string());
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.read();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            entries: inner.entries.len(),
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.hits = 0;
        inner.misses = 0;
        debug!("Translation cache cleared");
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Truncate on a character boundary
fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}...")
    }
}
