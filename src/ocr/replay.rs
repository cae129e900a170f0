/*!
 * Recorded OCR trace playback.
 *
 * A trace is a JSON array of frames, each frame the fragments one OCR pass
 * returned. `ReplaySource` plays them back in order as both the screen
 * source and the OCR engine, so the capture loop can be driven without a
 * real screen. After the last frame it keeps returning empty frames.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;

use super::{Bitmap, OcrEngine, ScreenSource, TextFragment};
use crate::app_config::ProviderSettings;
use crate::errors::{ConfigError, OcrError};

/// One recorded OCR pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceFrame {
    #[serde(default)]
    pub fragments: Vec<TextFragment>,
}

/// Plays back a recorded trace
#[derive(Debug)]
pub struct ReplaySource {
    provider: String,
    frames: Mutex<VecDeque<TraceFrame>>,
}

impl ReplaySource {
    pub fn new(provider: &str, frames: Vec<TraceFrame>) -> Self {
        Self {
            provider: provider.to_string(),
            frames: Mutex::new(frames.into()),
        }
    }

    /// Load a trace file
    pub fn from_file(provider: &str, path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let frames: Vec<TraceFrame> = serde_json::from_str(&raw)?;
        Ok(Self::new(provider, frames))
    }

    /// Frames not yet played
    pub fn remaining(&self) -> usize {
        self.frames.lock().len()
    }
}

#[async_trait]
impl ScreenSource for ReplaySource {
    async fn capture(&self) -> Result<Bitmap, OcrError> {
        Ok(Bitmap::new(1, 1))
    }
}

#[async_trait]
impl OcrEngine for ReplaySource {
    fn provider_id(&self) -> &str {
        &self.provider
    }

    async fn recognize(
        &self,
        _bitmap: &Bitmap,
        _settings: &ProviderSettings,
    ) -> Result<Vec<TextFragment>, OcrError> {
        Ok(self.frames.lock().pop_front().map(|f| f.fragments).unwrap_or_default())
    }
}
