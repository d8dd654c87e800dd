//! Progress estimation for polled Horde requests.
//!
//! The Horde reports a remaining `wait_time` in seconds; combined with the
//! time elapsed since submission this gives a completion percentage.

/// Estimate completion as a percentage in `[0, 100]`.
///
/// `progress = 100 * (1 - wait_time / (wait_time + elapsed))`, rounded to
/// two decimal places. Returns 0 when both inputs are zero (nothing
/// elapsed and nothing estimated yet).
pub fn compute_progress(wait_time_secs: f64, elapsed_secs: f64) -> f64 {
    let wait = wait_time_secs.max(0.0);
    let elapsed = elapsed_secs.max(0.0);
    let total = wait + elapsed;
    if total <= 0.0 {
        return 0.0;
    }
    let raw = 100.0 * (1.0 - wait / total);
    round_to_hundredths(raw)
}

/// Fraction of interrogation forms that have finished, as a percentage.
pub fn forms_progress(done: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round_to_hundredths(100.0 * done as f64 / total as f64)
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
