//! Time conversion and formatting utilities.

use std::time::Duration;

/// Format a position as `mm:ss.cc`, the way lyric documents write it.
///
/// Negative and non-finite input formats as `00:00.00`. Minutes are not
/// capped, so a position past an hour reads `61:02.50`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_timestamp(seconds: f64) -> String {
    let centis = if seconds.is_finite() && seconds > 0.0 {
        (seconds * 100.0).round() as u64
    } else {
        0
    };
    format!(
        "{:02}:{:02}.{:02}",
        centis / 6000,
        (centis / 100) % 60,
        centis % 100
    )
}

/// Format a position as `mm:ss`, dropping the centiseconds
#[must_use]
pub fn format_timestamp_short(seconds: f64) -> String {
    let mut stamp = format_timestamp(seconds.floor());
    stamp.truncate(stamp.len() - 3);
    stamp
}

/// Convert seconds to a `Duration`, saturating to zero for invalid input
#[must_use]
pub fn seconds_to_duration(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::ZERO)
}
