use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone, Utc};

/// Seconds elapsed since a channel's epoch, clamped at zero so a wall-clock
/// regression behaves as phase 0 instead of panicking downstream arithmetic.
pub fn offset_seconds(epoch: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = (now - epoch).num_milliseconds();
    if millis <= 0 {
        0.0
    } else {
        millis as f64 / 1000.0
    }
}

/// Position within one loop of a program of `total_seconds` length.
pub fn phase(offset: f64, total_seconds: f64) -> f64 {
    if total_seconds <= 0.0 {
        return 0.0;
    }
    let loops = (offset / total_seconds).floor();
    let phase = offset - loops * total_seconds;
    if phase >= total_seconds {
        0.0
    } else {
        phase
    }
}

/// The most recent 03:00 local-time instant at or before `now`. The
/// programming-day boundary is display-only; playback never resets at it.
pub fn previous_3am(now: DateTime<Local>) -> DateTime<Local> {
    let three = NaiveTime::from_hms_opt(3, 0, 0).unwrap_or_default();
    let mut date = now.date_naive();
    if now.time() < three {
        date = date.pred_opt().unwrap_or(date);
    }
    resolve_local(date.and_time(three))
}

/// The next 03:00 local-time instant strictly after `now`.
pub fn next_3am(now: DateTime<Local>) -> DateTime<Local> {
    let previous = previous_3am(now);
    let date = previous.date_naive().succ_opt().unwrap_or_else(|| previous.date_naive());
    resolve_local(date.and_time(NaiveTime::from_hms_opt(3, 0, 0).unwrap_or_default()))
}

fn resolve_local(naive: chrono::NaiveDateTime) -> DateTime<Local> {
    match Local.from_local_datetime(&naive).earliest() {
        Some(instant) => instant,
        // A DST gap swallowed 03:00; fall back to an hour later.
        None => resolve_local(naive + Duration::hours(1)),
    }
}
