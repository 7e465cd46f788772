//! Record classification and statistics.
//!
//! Everything in here is pure: the same inputs always produce the same
//! outputs, with no network access.

pub mod classify;
pub mod engagement;
pub mod stats;

pub use engagement::aggregate_engagement;
pub use stats::compute_post_stats;

/// Division that degrades to 0 instead of NaN/Inf when the denominator
/// is zero (or not finite).
pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 || !denominator.is_finite() {
        0.0
    } else {
        numerator / denominator
    }
}

/// Round to two decimal places. Applied only at packaging time, never on
/// intermediate sums.
pub fn round_to_two(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
