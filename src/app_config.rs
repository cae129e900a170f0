use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::Path;

use crate::errors::ConfigError;

/// Application configuration module
/// This module handles loading, sanitizing and validating the thresholds that
/// drive gluing, stabilization, the translation queue and overlay lifetime.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language code (ISO)
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Target language code (ISO)
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Capture loop settings
    #[serde(default)]
    pub capture: CaptureConfig,

    /// OCR provider settings
    #[serde(default)]
    pub ocr: OcrConfig,

    /// Noise phrase filtering
    #[serde(default)]
    pub filters: FilterConfig,

    /// Settle/debounce settings
    #[serde(default)]
    pub stabilization: StabilizationConfig,

    /// Translation queue settings
    #[serde(default)]
    pub translation: TranslationQueueConfig,

    /// Context buffer settings
    #[serde(default)]
    pub context: ContextConfig,

    /// Overlay persistence settings
    #[serde(default)]
    pub overlay: OverlayConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Capture loop configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CaptureConfig {
    /// Interval between capture cycles in milliseconds
    #[serde(default = "default_capture_interval_ms")]
    pub interval_ms: u64,

    /// Timeout for one capture + recognition pass in milliseconds
    #[serde(default = "default_ocr_timeout_ms")]
    pub ocr_timeout_ms: u64,

    /// Suspend capture while a translation batch is in flight
    #[serde(default)]
    pub pause_ocr_while_translating: bool,

    /// Upper bound of fragments accepted in one cycle before gluing is skipped
    #[serde(default = "default_max_fragments_per_cycle")]
    pub max_fragments_per_cycle: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_capture_interval_ms(),
            ocr_timeout_ms: default_ocr_timeout_ms(),
            pause_ocr_while_translating: false,
            max_fragments_per_cycle: default_max_fragments_per_cycle(),
        }
    }
}

/// Geometric glue parameters for one OCR provider
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GlueRule {
    /// Max horizontal gap, in multiples of the average character width
    #[serde(default = "default_horizontal_glue")]
    pub horizontal_glue: f32,

    /// Max vertical gap, in multiples of the line height
    #[serde(default = "default_vertical_glue")]
    pub vertical_glue: f32,

    /// Allowed vertical misalignment for side-by-side fragments (percent)
    #[serde(default = "default_vertical_overlap_tolerance")]
    pub vertical_overlap_tolerance: f32,

    /// Max height difference for side-by-side fragments (pixels)
    #[serde(default = "default_height_similarity")]
    pub height_similarity: f32,

    /// Join stacked lines with a line break instead of a space
    #[serde(default)]
    pub keep_linefeeds: bool,

    /// Minimum shared width ratio for stacked lines (0.0 to 1.0)
    #[serde(default = "default_min_horizontal_overlap")]
    pub min_horizontal_overlap: f32,

    /// Fragments narrower than this are discarded before gluing (pixels)
    #[serde(default = "default_min_region_size")]
    pub min_region_width: f32,

    /// Fragments shorter than this are discarded before gluing (pixels)
    #[serde(default = "default_min_region_size")]
    pub min_region_height: f32,

    /// Glued blocks with fewer characters are dropped as noise
    #[serde(default = "default_min_text_fragment_size")]
    pub min_text_fragment_size: usize,
}

impl Default for GlueRule {
    fn default() -> Self {
        Self {
            horizontal_glue: default_horizontal_glue(),
            vertical_glue: default_vertical_glue(),
            vertical_overlap_tolerance: default_vertical_overlap_tolerance(),
            height_similarity: default_height_similarity(),
            keep_linefeeds: false,
            min_horizontal_overlap: default_min_horizontal_overlap(),
            min_region_width: default_min_region_size(),
            min_region_height: default_min_region_size(),
            min_text_fragment_size: default_min_text_fragment_size(),
        }
    }
}

/// Fully resolved settings for one OCR provider
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProviderSettings {
    /// Glue parameters
    #[serde(default)]
    pub glue: GlueRule,

    /// Minimum mean per-letter confidence (0.0 to 1.0)
    #[serde(default = "default_confidence")]
    pub letter_confidence: f32,

    /// Minimum whole-line confidence (0.0 to 1.0)
    #[serde(default = "default_confidence")]
    pub line_confidence: f32,

    /// Keep translations of this provider's blocks onscreen until replaced
    #[serde(default)]
    pub leave_translation_onscreen: bool,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            glue: GlueRule::default(),
            letter_confidence: default_confidence(),
            line_confidence: default_confidence(),
            leave_translation_onscreen: false,
        }
    }
}

/// Per-provider override; unset fields fall back to [`OcrConfig::defaults`]
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ProviderOverride {
    // @field: Provider identifier
    pub id: String,
    pub horizontal_glue: Option<f32>,
    pub vertical_glue: Option<f32>,
    pub vertical_overlap_tolerance: Option<f32>,
    pub height_similarity: Option<f32>,
    pub keep_linefeeds: Option<bool>,
    pub min_horizontal_overlap: Option<f32>,
    pub min_region_width: Option<f32>,
    pub min_region_height: Option<f32>,
    pub min_text_fragment_size: Option<usize>,
    pub letter_confidence: Option<f32>,
    pub line_confidence: Option<f32>,
    pub leave_translation_onscreen: Option<bool>,
}

impl ProviderOverride {
    // @param id: Provider identifier
    // @returns: Override with every field unset
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }

    fn apply(&self, base: &ProviderSettings) -> ProviderSettings {
        let glue = &base.glue;
        ProviderSettings {
            glue: GlueRule {
                horizontal_glue: self.horizontal_glue.unwrap_or(glue.horizontal_glue),
                vertical_glue: self.vertical_glue.unwrap_or(glue.vertical_glue),
                vertical_overlap_tolerance: self
                    .vertical_overlap_tolerance
                    .unwrap_or(glue.vertical_overlap_tolerance),
                height_similarity: self.height_similarity.unwrap_or(glue.height_similarity),
                keep_linefeeds: self.keep_linefeeds.unwrap_or(glue.keep_linefeeds),
                min_horizontal_overlap: self
                    .min_horizontal_overlap
                    .unwrap_or(glue.min_horizontal_overlap),
                min_region_width: self.min_region_width.unwrap_or(glue.min_region_width),
                min_region_height: self.min_region_height.unwrap_or(glue.min_region_height),
                min_text_fragment_size: self
                    .min_text_fragment_size
                    .unwrap_or(glue.min_text_fragment_size),
            },
            letter_confidence: self.letter_confidence.unwrap_or(base.letter_confidence),
            line_confidence: self.line_confidence.unwrap_or(base.line_confidence),
            leave_translation_onscreen: self
                .leave_translation_onscreen
                .unwrap_or(base.leave_translation_onscreen),
        }
    }
}

/// OCR provider configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OcrConfig {
    /// Provider whose settings apply to the capture loop
    #[serde(default = "default_active_provider")]
    pub active_provider: String,

    /// Global defaults used by unknown providers and unset override fields
    #[serde(default)]
    pub defaults: ProviderSettings,

    /// Per-provider overrides
    #[serde(default)]
    pub providers: Vec<ProviderOverride>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            active_provider: default_active_provider(),
            defaults: ProviderSettings::default(),
            providers: Vec::new(),
        }
    }
}

impl OcrConfig {
    /// Get the override entry for a provider, if any
    pub fn get_provider_override(&self, provider_id: &str) -> Option<&ProviderOverride> {
        self.providers.iter().find(|p| p.id.eq_ignore_ascii_case(provider_id))
    }

    /// Resolve the settings for a provider, falling back to the defaults
    pub fn settings_for(&self, provider_id: &str) -> ProviderSettings {
        match self.get_provider_override(provider_id) {
            Some(entry) => entry.apply(&self.defaults),
            None => self.defaults.clone(),
        }
    }

    /// Resolve the settings for the active provider
    pub fn active_settings(&self) -> ProviderSettings {
        self.settings_for(&self.active_provider)
    }
}

/// A noise phrase removed before gluing
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct IgnorePhrase {
    pub phrase: String,

    /// Match the whole fragment text instead of a substring
    #[serde(default)]
    pub exact_match: bool,
}

impl IgnorePhrase {
    pub fn new(phrase: &str, exact_match: bool) -> Self {
        Self {
            phrase: phrase.to_string(),
            exact_match,
        }
    }
}

/// Fragment filtering configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct FilterConfig {
    #[serde(default)]
    pub ignore_phrases: Vec<IgnorePhrase>,

    /// Compare ignore phrases case-sensitively
    #[serde(default)]
    pub case_sensitive: bool,
}

/// Settle/debounce configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StabilizationConfig {
    /// Time a block's text must stay unchanged before it is final (ms)
    #[serde(default = "default_settle_time_ms")]
    pub settle_time_ms: u64,

    /// Time after first observation at which a block is forced final (ms)
    #[serde(default = "default_max_settle_time_ms")]
    pub max_settle_time_ms: u64,

    /// Minimum overlap ratio for matching a block to a known window
    #[serde(default = "default_min_match_overlap")]
    pub min_match_overlap: f32,

    /// Whether force-stabilized blocks get a retry after a failed translation
    #[serde(default = "default_true")]
    pub retry_forced_blocks: bool,
}

impl Default for StabilizationConfig {
    fn default() -> Self {
        Self {
            settle_time_ms: default_settle_time_ms(),
            max_settle_time_ms: default_max_settle_time_ms(),
            min_match_overlap: default_min_match_overlap(),
            retry_forced_blocks: true,
        }
    }
}

/// Translation queue configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationQueueConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Reuse translations of identical source text
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    /// Consecutive failed blocks before the backend is reported unavailable
    #[serde(default = "default_unavailable_after_failures")]
    pub unavailable_after_failures: u32,
}

impl Default for TranslationQueueConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            cache_enabled: true,
            unavailable_after_failures: default_unavailable_after_failures(),
        }
    }
}

/// Context buffer configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ContextConfig {
    /// Maximum number of previous translations kept
    #[serde(default = "default_max_context_pieces")]
    pub max_context_pieces: usize,

    /// Characters of history the buffer tries to keep (0 = count bound only)
    #[serde(default = "default_min_context_size")]
    pub min_context_size: usize,

    /// Static description of the game or document, always attached
    #[serde(default)]
    pub game_info: Option<String>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_context_pieces: default_max_context_pieces(),
            min_context_size: default_min_context_size(),
            game_info: None,
        }
    }
}

/// What an overlay slot shows
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Translated,
    Source,
}

/// Overlay persistence configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OverlayConfig {
    /// Delay before a slot whose text vanished is cleared (ms)
    #[serde(default = "default_clear_delay_ms")]
    pub clear_delay_ms: u64,

    /// Keep translations onscreen until replaced, for every provider
    #[serde(default)]
    pub leave_translation_onscreen: bool,

    /// Keep the old translation visible while a changed block re-settles
    #[serde(default = "default_true")]
    pub keep_translated_until_replaced: bool,

    /// Show translated or source text
    #[serde(default)]
    pub display_mode: DisplayMode,

    /// Slot rectangle margin around the block (pixels)
    #[serde(default)]
    pub margin_px: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            clear_delay_ms: default_clear_delay_ms(),
            leave_translation_onscreen: false,
            keep_translated_until_replaced: true,
            display_mode: DisplayMode::default(),
            margin_px: 0.0,
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_source_language() -> String {
    "ja".to_string()
}

fn default_target_language() -> String {
    "en".to_string()
}

fn default_capture_interval_ms() -> u64 {
    50
}

fn default_ocr_timeout_ms() -> u64 {
    5000
}

fn default_max_fragments_per_cycle() -> usize {
    2000
}

fn default_horizontal_glue() -> f32 {
    1.5
}

fn default_vertical_glue() -> f32 {
    1.0
}

fn default_vertical_overlap_tolerance() -> f32 {
    50.0
}

fn default_height_similarity() -> f32 {
    4.0
}

fn default_min_horizontal_overlap() -> f32 {
    0.1
}

fn default_min_region_size() -> f32 {
    1.0
}

fn default_min_text_fragment_size() -> usize {
    1
}

fn default_confidence() -> f32 {
    0.0
}

fn default_active_provider() -> String {
    "default".to_string()
}

fn default_settle_time_ms() -> u64 {
    150
}

fn default_max_settle_time_ms() -> u64 {
    2000
}

fn default_min_match_overlap() -> f32 {
    0.5
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_unavailable_after_failures() -> u32 {
    5
}

fn default_max_context_pieces() -> usize {
    10
}

fn default_min_context_size() -> usize {
    200
}

fn default_clear_delay_ms() -> u64 {
    1500
}

fn default_true() -> bool {
    true
}

/// Replace a non-finite or out-of-range value with its default
fn clamp_f32(value: &mut f32, min: f32, max: f32, default: f32, name: &str, fixes: &mut Vec<String>) {
    if !value.is_finite() || *value < min || *value > max {
        fixes.push(format!("{} = {} is outside [{}, {}], using {}", name, value, min, max, default));
        *value = default;
    }
}

fn clamp_glue(rule: &mut GlueRule, scope: &str, fixes: &mut Vec<String>) {
    clamp_f32(&mut rule.horizontal_glue, 0.0, 100.0, default_horizontal_glue(),
        &format!("{scope}.horizontal_glue"), fixes);
    clamp_f32(&mut rule.vertical_glue, 0.0, 100.0, default_vertical_glue(),
        &format!("{scope}.vertical_glue"), fixes);
    clamp_f32(&mut rule.vertical_overlap_tolerance, 0.0, 100.0, default_vertical_overlap_tolerance(),
        &format!("{scope}.vertical_overlap_tolerance"), fixes);
    clamp_f32(&mut rule.height_similarity, 0.0, f32::MAX, default_height_similarity(),
        &format!("{scope}.height_similarity"), fixes);
    clamp_f32(&mut rule.min_horizontal_overlap, 0.0, 1.0, default_min_horizontal_overlap(),
        &format!("{scope}.min_horizontal_overlap"), fixes);
    clamp_f32(&mut rule.min_region_width, 0.0, f32::MAX, default_min_region_size(),
        &format!("{scope}.min_region_width"), fixes);
    clamp_f32(&mut rule.min_region_height, 0.0, f32::MAX, default_min_region_size(),
        &format!("{scope}.min_region_height"), fixes);
}

fn clamp_optional(value: &mut Option<f32>, min: f32, max: f32, name: &str, fixes: &mut Vec<String>) {
    if let Some(v) = *value {
        if !v.is_finite() || v < min || v > max {
            fixes.push(format!("{} = {} is outside [{}, {}], using the default", name, v, min, max));
            *value = None;
        }
    }
}

impl Config {
    /// Load a configuration file, sanitizing out-of-range values
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        let (config, fixes) = config.sanitize();
        for fix in &fixes {
            warn!("Config {}: {}", path.display(), fix);
        }
        Ok(config)
    }

    /// Load a configuration file, writing a default one if none exists
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::from_file(path);
        }

        let config = Config::default();
        std::fs::write(path, serde_json::to_string_pretty(&config)?)?;
        info!("Created default configuration at {}", path.display());
        Ok(config)
    }

    /// Validate the language pair
    pub fn validate(&self) -> Result<(), ConfigError> {
        for code in [&self.source_language, &self.target_language] {
            crate::language_utils::validate_language_code(code)
                .map_err(|_| ConfigError::InvalidLanguage(code.clone()))?;
        }
        Ok(())
    }

    /// Clamp every threshold into its valid range.
    ///
    /// Bad values are replaced with defaults rather than rejected; the
    /// returned list describes each correction.
    pub fn sanitize(mut self) -> (Self, Vec<String>) {
        let mut fixes = Vec::new();

        if self.capture.interval_ms == 0 {
            fixes.push(format!("capture.interval_ms = 0, using {}", default_capture_interval_ms()));
            self.capture.interval_ms = default_capture_interval_ms();
        }
        if self.capture.ocr_timeout_ms == 0 {
            fixes.push(format!("capture.ocr_timeout_ms = 0, using {}", default_ocr_timeout_ms()));
            self.capture.ocr_timeout_ms = default_ocr_timeout_ms();
        }
        if self.capture.max_fragments_per_cycle == 0 {
            fixes.push(format!(
                "capture.max_fragments_per_cycle = 0, using {}",
                default_max_fragments_per_cycle()
            ));
            self.capture.max_fragments_per_cycle = default_max_fragments_per_cycle();
        }

        clamp_glue(&mut self.ocr.defaults.glue, "ocr.defaults", &mut fixes);
        clamp_f32(&mut self.ocr.defaults.letter_confidence, 0.0, 1.0, default_confidence(),
            "ocr.defaults.letter_confidence", &mut fixes);
        clamp_f32(&mut self.ocr.defaults.line_confidence, 0.0, 1.0, default_confidence(),
            "ocr.defaults.line_confidence", &mut fixes);

        for entry in &mut self.ocr.providers {
            let scope = format!("ocr.providers[{}]", entry.id);
            clamp_optional(&mut entry.horizontal_glue, 0.0, 100.0, &format!("{scope}.horizontal_glue"), &mut fixes);
            clamp_optional(&mut entry.vertical_glue, 0.0, 100.0, &format!("{scope}.vertical_glue"), &mut fixes);
            clamp_optional(&mut entry.vertical_overlap_tolerance, 0.0, 100.0,
                &format!("{scope}.vertical_overlap_tolerance"), &mut fixes);
            clamp_optional(&mut entry.height_similarity, 0.0, f32::MAX,
                &format!("{scope}.height_similarity"), &mut fixes);
            clamp_optional(&mut entry.min_horizontal_overlap, 0.0, 1.0,
                &format!("{scope}.min_horizontal_overlap"), &mut fixes);
            clamp_optional(&mut entry.min_region_width, 0.0, f32::MAX,
                &format!("{scope}.min_region_width"), &mut fixes);
            clamp_optional(&mut entry.min_region_height, 0.0, f32::MAX,
                &format!("{scope}.min_region_height"), &mut fixes);
            clamp_optional(&mut entry.letter_confidence, 0.0, 1.0, &format!("{scope}.letter_confidence"), &mut fixes);
            clamp_optional(&mut entry.line_confidence, 0.0, 1.0, &format!("{scope}.line_confidence"), &mut fixes);
        }

        if self.stabilization.max_settle_time_ms < self.stabilization.settle_time_ms {
            fixes.push(format!(
                "stabilization.max_settle_time_ms = {} is below settle_time_ms = {}, raising it",
                self.stabilization.max_settle_time_ms, self.stabilization.settle_time_ms
            ));
            self.stabilization.max_settle_time_ms = self.stabilization.settle_time_ms;
        }
        clamp_f32(&mut self.stabilization.min_match_overlap, 0.01, 1.0, default_min_match_overlap(),
            "stabilization.min_match_overlap", &mut fixes);

        if self.translation.timeout_secs == 0 {
            fixes.push(format!("translation.timeout_secs = 0, using {}", default_timeout_secs()));
            self.translation.timeout_secs = default_timeout_secs();
        }
        if self.translation.unavailable_after_failures == 0 {
            fixes.push(format!(
                "translation.unavailable_after_failures = 0, using {}",
                default_unavailable_after_failures()
            ));
            self.translation.unavailable_after_failures = default_unavailable_after_failures();
        }

        if self.context.max_context_pieces == 0 && self.context.min_context_size > 0 {
            fixes.push("context.min_context_size has no effect with max_context_pieces = 0".to_string());
        }

        clamp_f32(&mut self.overlay.margin_px, -1000.0, 1000.0, 0.0, "overlay.margin_px", &mut fixes);

        self.filters.ignore_phrases.retain(|p| !p.phrase.trim().is_empty());

        (self, fixes)
    }

    /// Whether blocks of the given provider stay onscreen until replaced
    pub fn leave_translation_onscreen(&self, provider_id: &str) -> bool {
        self.overlay.leave_translation_onscreen
            || self.ocr.settings_for(provider_id).leave_translation_onscreen
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: default_source_language(),
            target_language: default_target_language(),
            capture: CaptureConfig::default(),
            ocr: OcrConfig::default(),
            filters: FilterConfig::default(),
            stabilization: StabilizationConfig::default(),
            translation: TranslationQueueConfig::default(),
            context: ContextConfig::default(),
            overlay: OverlayConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
