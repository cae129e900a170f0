/*!
 * Text block stabilization.
 *
 * OCR output flickers while text animates in. A block is translated only
 * after its text stopped changing for the settle time, or after the max
 * settle time since it first appeared.
 */

pub mod state;
pub mod tracker;

pub use state::{BlockId, BlockState, FailureOutcome};
pub use tracker::{ReadyBlock, StabilizationTracker, StabilizationWindow, TrackerConfig, TrackerEvent};
