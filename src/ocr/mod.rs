/*!
 * OCR data model and collaborator interfaces.
 *
 * The screen source and the OCR engines are external; this module defines
 * what they hand to the core:
 * - `TextFragment`: one raw detection (text + rectangle + confidence)
 * - `FragmentSet`: the immutable snapshot of one capture cycle
 * - `ScreenSource` / `OcrEngine`: the async traits they implement
 * - `replay`: a recorded-trace implementation of both traits
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

use crate::app_config::ProviderSettings;
use crate::errors::OcrError;
use crate::geometry::Rect;

pub mod replay;

/// A captured screen image
pub type Bitmap = image::RgbaImage;

/// One raw OCR detection for a single capture cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    /// Bounding rectangle in capture-space pixels
    pub rect: Rect,

    /// Recognized text
    pub text: String,

    /// Whole-line confidence (0.0 to 1.0); absent means fully confident
    #[serde(default)]
    pub line_confidence: Option<f32>,

    /// Per-character confidences; empty when the engine does not report them
    #[serde(default)]
    pub letter_confidences: Vec<f32>,

    /// Provider that produced the fragment
    #[serde(default)]
    pub provider: String,
}

impl TextFragment {
    /// Create a fragment without confidence information
    pub fn new(text: &str, rect: Rect) -> Self {
        Self {
            rect,
            text: text.to_string(),
            line_confidence: None,
            letter_confidences: Vec::new(),
            provider: String::new(),
        }
    }

    /// Set the whole-line confidence
    pub fn with_line_confidence(mut self, confidence: f32) -> Self {
        self.line_confidence = Some(confidence);
        self
    }

    /// Set the per-character confidences
    pub fn with_letter_confidences(mut self, confidences: Vec<f32>) -> Self {
        self.letter_confidences = confidences;
        self
    }

    /// Mean of the per-character confidences, if any were reported
    pub fn mean_letter_confidence(&self) -> Option<f32> {
        if self.letter_confidences.is_empty() {
            return None;
        }
        let sum: f32 = self.letter_confidences.iter().sum();
        Some(sum / self.letter_confidences.len() as f32)
    }
}

/// Immutable snapshot of the fragments of one capture cycle
#[derive(Debug, Clone)]
pub struct FragmentSet {
    provider: String,
    fragments: Arc<[TextFragment]>,
}

impl FragmentSet {
    /// Create a snapshot, stamping every fragment with the provider id
    pub fn new(provider: &str, fragments: Vec<TextFragment>) -> Self {
        let fragments: Vec<TextFragment> = fragments
            .into_iter()
            .map(|mut f| {
                if f.provider.is_empty() {
                    f.provider = provider.to_string();
                }
                f
            })
            .collect();
        Self {
            provider: provider.to_string(),
            fragments: fragments.into(),
        }
    }

    /// An empty cycle
    pub fn empty(provider: &str) -> Self {
        Self::new(provider, Vec::new())
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn fragments(&self) -> &[TextFragment] {
        &self.fragments
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

/// Produces screen bitmaps on demand
#[async_trait]
pub trait ScreenSource: Send + Sync + Debug {
    /// Capture the current screen region
    async fn capture(&self) -> Result<Bitmap, OcrError>;
}

/// Turns a bitmap into raw text fragments
#[async_trait]
pub trait OcrEngine: Send + Sync + Debug {
    /// Provider id used to resolve per-provider settings
    fn provider_id(&self) -> &str;

    /// Recognize text in a bitmap
    async fn recognize(
        &self,
        bitmap: &Bitmap,
        settings: &ProviderSettings,
    ) -> Result<Vec<TextFragment>, OcrError>;
}
