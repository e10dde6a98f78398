//! Run configuration defaults

/// Default result file name
pub const DEFAULT_RESULT_FILE: &str = "captions.jsonl";

/// Default generation budget per inference call.
/// Detailed captions of multi-minute videos routinely exceed 2K tokens.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Default number of attempts for an item whose output hits the token budget.
/// Sampling is usually deterministic (temperature 0, fixed seed), so more
/// attempts rarely help unless the prompt is reselected.
pub const DEFAULT_MAX_RETRIES_ON_LENGTH: u32 = 3;

/// Upper bound accepted for `max_retries_on_length`
pub const MAX_RETRIES_ON_LENGTH_LIMIT: u32 = 20;

/// Clamp a configured attempt budget into `1..=MAX_RETRIES_ON_LENGTH_LIMIT`
pub fn clamp_retries_on_length(value: u32) -> u32 {
    value.clamp(1, MAX_RETRIES_ON_LENGTH_LIMIT)
}
