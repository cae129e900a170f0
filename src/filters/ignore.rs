use crate::app_config::IgnorePhrase;
use crate::ocr::TextFragment;

/// Drops fragments that match configured noise phrases.
///
/// Runs before gluing so an ignored phrase never widens a block's rectangle.
#[derive(Debug, Clone, Default)]
pub struct IgnorePhraseFilter {
    phrases: Vec<IgnorePhrase>,
    case_sensitive: bool,
}

impl IgnorePhraseFilter {
    pub fn new(phrases: &[IgnorePhrase], case_sensitive: bool) -> Self {
        let phrases = phrases
            .iter()
            .filter(|p| !p.phrase.trim().is_empty())
            .map(|p| {
                // Exact matches compare against trimmed fragment text
                let phrase = if p.exact_match { p.phrase.trim() } else { p.phrase.as_str() };
                IgnorePhrase {
                    phrase: if case_sensitive { phrase.to_string() } else { phrase.to_lowercase() },
                    exact_match: p.exact_match,
                }
            })
            .collect();
        Self {
            phrases,
            case_sensitive,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    /// Whether the text matches any phrase
    pub fn matches(&self, text: &str) -> bool {
        if self.phrases.is_empty() {
            return false;
        }
        let folded;
        let candidate = if self.case_sensitive {
            text
        } else {
            folded = text.to_lowercase();
            folded.as_str()
        };
        let trimmed = candidate.trim();

        self.phrases.iter().any(|p| {
            if p.exact_match {
                trimmed == p.phrase
            } else {
                candidate.contains(&p.phrase)
            }
        })
    }

    /// Keep the fragments that match no phrase, preserving their order
    pub fn apply(&self, fragments: Vec<TextFragment>) -> Vec<TextFragment> {
        if self.phrases.is_empty() {
            return fragments;
        }
        fragments.into_iter().filter(|f| !self.matches(&f.text)).collect()
    }
}
