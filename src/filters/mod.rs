/*!
 * Pre-glue fragment filters.
 *
 * Both filters are pure functions of their inputs and run in this order:
 * - `confidence`: drops fragments below the provider's confidence floors
 * - `ignore`: drops fragments matching configured noise phrases
 */

pub mod confidence;
pub mod ignore;

pub use confidence::ConfidenceFilter;
pub use ignore::IgnorePhraseFilter;
