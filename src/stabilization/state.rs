use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a text block across capture cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId(pub u64);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a tracked text block
///
/// ```text
/// Detected -> Settling -> Stable -> Translating -> Displayed -> Cleared
///                           ^            |             |           |
///                           +-- failure -+             +-----------+--> Detected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockState {
    /// First observed this cycle
    Detected,
    /// Observed again, waiting for the text to stop changing
    Settling,
    /// Final; waiting to be handed to the translation queue
    Stable,
    /// Part of an in-flight translation batch
    Translating,
    /// Translation bound to an overlay slot
    Displayed,
    /// Overlay cleared; reopens as `Detected` if the region shows text again
    Cleared,
}

impl BlockState {
    /// States in which the text has not been finalized yet
    pub fn is_settling(&self) -> bool {
        matches!(self, Self::Detected | Self::Settling)
    }
}

/// What happened to a block after a failed translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Back to `Stable`; resubmitted on the next cycle it is seen
    WillRetry,
    /// Back to `Stable` with no attempts left; ages out when it vanishes
    Exhausted,
    /// The block is no longer tracked or not translating
    Unknown,
}
