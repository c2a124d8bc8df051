//! Conversions between elapsed time, the on-disk `H:MM:SS.ffffff` form, and
//! the short strings shown in chat.

use chrono::TimeDelta;

/// Serialize an elapsed time as `H:MM:SS` with an optional `.ffffff` suffix.
/// Hours are not wrapped into days.
pub fn to_storage(elapsed: TimeDelta) -> String {
    let total_micros = elapsed.num_microseconds().unwrap_or(i64::MAX).max(0);
    let micros = total_micros % 1_000_000;
    let secs = total_micros / 1_000_000;
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if micros == 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{h}:{m:02}:{s:02}.{micros:06}")
    }
}

/// Parse the on-disk form. Also accepts a leading `N day(s), ` component as
/// written by older data files.
pub fn parse_storage(raw: &str) -> Option<TimeDelta> {
    let raw = raw.trim();
    let (days, clock) = match raw.split_once(',') {
        Some((day_part, rest)) => {
            let count = day_part.split_whitespace().next()?.parse::<i64>().ok()?;
            (count, rest.trim())
        }
        None => (0, raw),
    };

    let mut parts = clock.split(':');
    let hours = parts.next()?.parse::<i64>().ok()?;
    let minutes = parts.next()?.parse::<i64>().ok()?;
    let seconds_part = parts.next()?;
    if parts.next().is_some() || !(0..60).contains(&minutes) {
        return None;
    }

    let (whole, frac) = match seconds_part.split_once('.') {
        Some((w, f)) => (w, f),
        None => (seconds_part, ""),
    };
    let seconds = whole.parse::<i64>().ok()?;
    if !(0..60).contains(&seconds) || hours < 0 || days < 0 {
        return None;
    }
    let micros = if frac.is_empty() {
        0
    } else {
        if !frac.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let padded: String = frac.chars().chain(std::iter::repeat('0')).take(6).collect();
        padded.parse::<i64>().ok()?
    };

    // Hand-edited files can hold anything; out-of-range values count as
    // unparsable instead of overflowing.
    let total_secs = days
        .checked_mul(86_400)?
        .checked_add(hours.checked_mul(3600)?)?
        .checked_add(minutes * 60 + seconds)?;
    TimeDelta::try_seconds(total_secs)?.checked_add(&TimeDelta::microseconds(micros))
}

/// `{h}h {m}m {s}s` with leading and trailing zero units dropped.
/// Zero formats as `0s`.
pub fn format_seconds(total: u64) -> String {
    let units = [(total / 3600, 'h'), ((total % 3600) / 60, 'm'), (total % 60, 's')];
    let first = units.iter().position(|(v, _)| *v > 0);
    let last = units.iter().rposition(|(v, _)| *v > 0);
    match (first, last) {
        (Some(first), Some(last)) => units[first..=last]
            .iter()
            .map(|(v, unit)| format!("{v}{unit}"))
            .collect::<Vec<_>>()
            .join(" "),
        _ => "0s".to_string(),
    }
}

/// The two largest non-zero units, e.g. `1h 5m`, `5m 30s`, `12s`, `2h`.
pub fn format_compact(total: u64) -> String {
    let units = [(total / 3600, 'h'), ((total % 3600) / 60, 'm'), (total % 60, 's')];
    let shown: Vec<String> = units
        .iter()
        .filter(|(v, _)| *v > 0)
        .take(2)
        .map(|(v, unit)| format!("{v}{unit}"))
        .collect();
    if shown.is_empty() {
        "0s".to_string()
    } else {
        shown.join(" ")
    }
}

pub fn format_delta(elapsed: TimeDelta) -> String {
    format_seconds(elapsed.num_seconds().max(0) as u64)
}

/// Human form of a stored duration string. Anything unparsable is returned
/// untouched.
pub fn format_stored(raw: &str) -> String {
    match parse_storage(raw) {
        Some(elapsed) => format_delta(elapsed),
        None => raw.to_string(),
    }
}

/// Track length as a clock, `3:07` or `1:02:03`.
pub fn format_clock(total: u64) -> String {
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_zero_seconds() {
        assert_eq!(format_seconds(0), "0s");
        assert_eq!(format_compact(0), "0s");
    }

    #[test]
    fn full_hour_minute_second() {
        assert_eq!(format_seconds(3661), "1h 1m 1s");
        assert_eq!(format_seconds(60), "1m");
        assert_eq!(format_seconds(90), "1m 30s");
        assert_eq!(format_seconds(3601), "1h 0m 1s");
        assert_eq!(format_seconds(7200), "2h");
    }

    #[test]
    fn compact_keeps_two_units() {
        assert_eq!(format_compact(3900), "1h 5m");
        assert_eq!(format_compact(330), "5m 30s");
        assert_eq!(format_compact(12), "12s");
    }

    #[test]
    fn compact_skips_zero_units() {
        assert_eq!(format_compact(3600), "1h");
        assert_eq!(format_compact(3605), "1h 5s");
        assert_eq!(format_compact(120), "2m");
        assert_eq!(format_compact(3725), "1h 2m");
    }

    #[test]
    fn oversized_stored_durations_are_shown_verbatim() {
        for raw in [
            "9999999999999:00:00",
            "999999999999999 days, 0:00:00",
            "9223372036854775807:00:00",
        ] {
            assert_eq!(parse_storage(raw), None);
            assert_eq!(format_stored(raw), raw);
        }
    }

    #[test]
    fn storage_form_matches_expected_layout() {
        assert_eq!(to_storage(TimeDelta::seconds(10)), "0:00:10");
        assert_eq!(
            to_storage(TimeDelta::seconds(3661) + TimeDelta::microseconds(5)),
            "1:01:01.000005"
        );
        assert_eq!(to_storage(TimeDelta::hours(30)), "30:00:00");
    }

    #[test]
    fn parse_then_reformat_is_stable() {
        for raw in ["0:00:10", "1:01:01.000005", "27:59:59.5", "0:05:30.123456"] {
            let parsed = parse_storage(raw).unwrap();
            let again = to_storage(parsed);
            assert_eq!(parse_storage(&again), Some(parsed), "{raw}");
            assert_eq!(to_storage(parse_storage(&again).unwrap()), again);
        }
    }

    #[test]
    fn parse_accepts_day_prefix() {
        let parsed = parse_storage("1 day, 2:00:00").unwrap();
        assert_eq!(parsed.num_seconds(), 26 * 3600);
        let parsed = parse_storage("2 days, 0:00:01.25").unwrap();
        assert_eq!(parsed.num_milliseconds(), 2 * 86_400_000 + 1250);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_storage("Ongoing").is_none());
        assert!(parse_storage("1:99:00").is_none());
        assert!(parse_storage("1:00").is_none());
        assert!(parse_storage("1:00:00.abc").is_none());
    }

    #[test]
    fn format_stored_falls_back_to_input() {
        assert_eq!(format_stored("0:00:12.5"), "12s");
        assert_eq!(format_stored("1:05:00"), "1h 5m");
        assert_eq!(format_stored("not a duration"), "not a duration");
    }

    #[test]
    fn clock_format() {
        assert_eq!(format_clock(187), "3:07");
        assert_eq!(format_clock(3723), "1:02:03");
    }
}
