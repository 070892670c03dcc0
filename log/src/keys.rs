//! Row keys derived from time.
//!
//! Time is measured in ticks: 100 ns intervals since 0001-01-01T00:00:00Z.
//! An inverted time key is `MAX_TICKS - ticks(t)` written as a 19-digit,
//! zero-padded decimal, so ascending key order is newest-first.

use chrono::{DateTime, NaiveDate, Utc};

/// Ticks of 9999-12-31T23:59:59.9999999Z, the largest representable instant.
pub const MAX_TICKS: i64 = 3_155_378_975_999_999_999;

/// Ticks of the Unix epoch.
pub const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

pub const TICKS_PER_SECOND: i64 = 10_000_000;

const NANOS_PER_TICK: u32 = 100;

const MAX_SUBSEC_NANOS: u32 = 999_999_999;

/// Width of a formatted inverted key; the width of `MAX_TICKS`.
pub const KEY_WIDTH: usize = 19;

/// 0001-01-01T00:00:00Z, the zero value of the tick scale.
pub fn min_value() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Tick count of `time`, or `None` outside `[min_value, MAX_TICKS]`.
///
/// A leap second counts as the last tick of the second before it.
pub fn ticks(time: DateTime<Utc>) -> Option<i64> {
    let nanos = time.timestamp_subsec_nanos().min(MAX_SUBSEC_NANOS);
    let ticks = time
        .timestamp()
        .checked_mul(TICKS_PER_SECOND)?
        .checked_add(UNIX_EPOCH_TICKS)?
        .checked_add(i64::from(nanos / NANOS_PER_TICK))?;
    (0..=MAX_TICKS).contains(&ticks).then_some(ticks)
}

/// Instant `ticks` after the zero value, or `None` when out of range.
pub fn from_ticks(ticks: i64) -> Option<DateTime<Utc>> {
    if !(0..=MAX_TICKS).contains(&ticks) {
        return None;
    }
    let since_epoch = ticks - UNIX_EPOCH_TICKS;
    let secs = since_epoch.div_euclid(TICKS_PER_SECOND);
    let nanos = since_epoch.rem_euclid(TICKS_PER_SECOND) as u32 * NANOS_PER_TICK;
    DateTime::from_timestamp(secs, nanos)
}

/// Formats `MAX_TICKS - ticks` as a fixed-width key.
pub fn invert_ticks(ticks: i64) -> String {
    format!("{:0width$}", MAX_TICKS - ticks, width = KEY_WIDTH)
}

/// Row key that sorts `time` before every earlier instant.
///
/// Returns `None` for the zero value and for instants outside the tick
/// range.
pub fn inverted_time_key(time: DateTime<Utc>) -> Option<String> {
    match ticks(time)? {
        0 => None,
        t => Some(invert_ticks(t)),
    }
}

/// Recovers the instant an inverted time key was derived from.
pub fn time_from_inverted_key(key: &str) -> Option<DateTime<Utc>> {
    let inverted: i64 = key.parse().ok()?;
    if !(0..=MAX_TICKS).contains(&inverted) {
        return None;
    }
    from_ticks(MAX_TICKS - inverted)
}
