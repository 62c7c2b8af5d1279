//! Random sampling decisions

use rand::Rng;
use vigil_domain::constants::{DEFAULT_SAMPLE_RATE, MAX_SAMPLE_RATE};

/// Decide whether to report one event at `rate` percent.
///
/// `rate >= 100` always samples and `rate <= 0` never does. Every call is an
/// independent draw; there is no shared state.
pub fn should_sample(rate: i64) -> bool {
    should_sample_with(rate, &mut rand::thread_rng())
}

/// [`should_sample`] with a caller-supplied random source.
pub fn should_sample_with<R: Rng + ?Sized>(rate: i64, rng: &mut R) -> bool {
    if rate >= i64::from(MAX_SAMPLE_RATE) {
        return true;
    }
    if rate <= 0 {
        return false;
    }
    rng.gen_range(0..i64::from(MAX_SAMPLE_RATE)) < rate
}

/// Effective sample rate from configuration and an environment fallback.
///
/// A configured rate has already been validated and wins unchanged. The
/// fallback must be a non-negative base-10 integer in `[0, 100]`; anything
/// else resolves to 100 so a typo never silences reporting.
pub fn resolve_rate(configured: Option<u8>, env_value: Option<&str>) -> u8 {
    if let Some(rate) = configured {
        return rate;
    }

    env_value
        .map(str::trim)
        .filter(|raw| !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|raw| raw.parse::<u8>().ok())
        .filter(|rate| *rate <= MAX_SAMPLE_RATE)
        .unwrap_or(DEFAULT_SAMPLE_RATE)
}
