use crate::app_config::ProviderSettings;
use crate::ocr::TextFragment;

/// Drops fragments whose confidence is below the provider's floors.
///
/// The letter floor applies to the mean of the per-character scores, the
/// line floor to the whole-fragment score. A fragment must pass every floor
/// for which it carries a score; missing scores count as fully confident.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceFilter {
    pub letter_threshold: f32,
    pub line_threshold: f32,
}

impl ConfidenceFilter {
    pub fn new(letter_threshold: f32, line_threshold: f32) -> Self {
        Self {
            letter_threshold,
            line_threshold,
        }
    }

    /// Thresholds of already-resolved provider settings
    pub fn from_settings(settings: &ProviderSettings) -> Self {
        Self::new(settings.letter_confidence, settings.line_confidence)
    }

    pub fn accepts(&self, fragment: &TextFragment) -> bool {
        let line_ok = fragment
            .line_confidence
            .is_none_or(|c| c >= self.line_threshold);
        let letters_ok = fragment
            .mean_letter_confidence()
            .is_none_or(|c| c >= self.letter_threshold);
        line_ok && letters_ok
    }

    /// Keep the accepted fragments, preserving their order
    pub fn apply(&self, fragments: &[TextFragment]) -> Vec<TextFragment> {
        fragments.iter().filter(|f| self.accepts(f)).cloned().collect()
    }
}
