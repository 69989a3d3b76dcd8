//! Go-notation durations (`90s`, `1h30m`, `1.5h`, `250ms`).
//!
//! Pipeline timeouts are written in this notation in annotations, and the
//! Tekton API expects the same notation back in `spec.timeouts.pipeline`.

use std::time::Duration;

use thiserror::Error;

const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// Why a duration string was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
    #[error("invalid duration '{0}'")]
    Invalid(String),

    #[error("missing unit in duration '{0}'")]
    MissingUnit(String),

    #[error("unknown unit '{unit}' in duration '{input}'")]
    UnknownUnit { unit: String, input: String },

    #[error("negative duration '{0}'")]
    Negative(String),

    #[error("duration '{0}' out of range")]
    Overflow(String),
}

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "\u{b5}s" | "\u{3bc}s" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(NANOS_PER_SECOND),
        "m" => Some(60 * NANOS_PER_SECOND),
        "h" => Some(3_600 * NANOS_PER_SECOND),
        _ => None,
    }
}

/// Parse a duration such as `1h`, `2h45m`, `1.5h` or `300ms`.
///
/// Negative durations are rejected; a bare `0` is accepted.
pub fn parse_go_duration(input: &str) -> Result<Duration, DurationError> {
    let invalid = || DurationError::Invalid(input.to_string());
    let overflow = || DurationError::Overflow(input.to_string());

    let mut rest = input;
    if let Some(stripped) = rest.strip_prefix('-') {
        if stripped.starts_with(['+', '-']) {
            return Err(invalid());
        }
        // `-0s` and friends are zero, anything else below zero is refused.
        let magnitude = parse_go_duration(stripped).map_err(|err| match err {
            DurationError::Invalid(_) => invalid(),
            DurationError::MissingUnit(_) => DurationError::MissingUnit(input.to_string()),
            DurationError::UnknownUnit { unit, .. } => DurationError::UnknownUnit {
                unit,
                input: input.to_string(),
            },
            DurationError::Negative(_) => DurationError::Negative(input.to_string()),
            DurationError::Overflow(_) => overflow(),
        })?;
        if magnitude.is_zero() {
            return Ok(Duration::ZERO);
        }
        return Err(DurationError::Negative(input.to_string()));
    }
    if let Some(stripped) = rest.strip_prefix('+') {
        rest = stripped;
    }
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let int_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let (int_digits, after_int) = rest.split_at(int_len);

        let (frac_digits, after_number) = match after_int.strip_prefix('.') {
            Some(after_dot) => {
                let frac_len = after_dot.bytes().take_while(u8::is_ascii_digit).count();
                after_dot.split_at(frac_len)
            }
            None => ("", after_int),
        };
        if int_digits.is_empty() && frac_digits.is_empty() {
            return Err(invalid());
        }

        let unit_len = after_number
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(after_number.len());
        let (unit, remainder) = after_number.split_at(unit_len);
        if unit.is_empty() {
            return Err(DurationError::MissingUnit(input.to_string()));
        }
        let scale = unit_nanos(unit).ok_or_else(|| DurationError::UnknownUnit {
            unit: unit.to_string(),
            input: input.to_string(),
        })?;

        let whole: u128 = if int_digits.is_empty() {
            0
        } else {
            int_digits.parse().map_err(|_| overflow())?
        };
        total = whole
            .checked_mul(scale)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(overflow)?;

        // Digits past nanosecond precision cannot change the result.
        let frac_digits = &frac_digits[..frac_digits.len().min(18)];
        if !frac_digits.is_empty() {
            let frac: u128 = frac_digits.parse().map_err(|_| invalid())?;
            let divisor = 10u128.pow(frac_digits.len() as u32);
            total = total
                .checked_add(frac * scale / divisor)
                .ok_or_else(overflow)?;
        }

        rest = remainder;
    }

    // Go durations are signed 64-bit nanosecond counts.
    if total > i64::MAX as u128 {
        return Err(overflow());
    }
    let nanos = u64::try_from(total).map_err(|_| overflow())?;
    Ok(Duration::from_nanos(nanos))
}

fn format_scaled(value: u128, scale: u128) -> String {
    let whole = value / scale;
    let frac = value % scale;
    if frac == 0 {
        return whole.to_string();
    }
    let width = scale.to_string().len() - 1;
    let digits = format!("{:0width$}", frac, width = width);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

/// Render a duration the way Go's `time.Duration.String` does (`1h0m0s`, `1m30s`, `1.5s`, `250ms`).
pub fn format_go_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }

    if nanos < NANOS_PER_SECOND {
        let (unit, scale) = if nanos < 1_000 {
            ("ns", 1)
        } else if nanos < 1_000_000 {
            ("\u{b5}s", 1_000)
        } else {
            ("ms", 1_000_000)
        };
        return format!("{}{}", format_scaled(nanos, scale), unit);
    }

    let total_secs = nanos / NANOS_PER_SECOND;
    let hours = total_secs / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = format_scaled(
        (total_secs % 60) * NANOS_PER_SECOND + nanos % NANOS_PER_SECOND,
        NANOS_PER_SECOND,
    );

    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_units() {
        assert_eq!(parse_go_duration("1h").unwrap(), Duration::from_secs(3_600));
        assert_eq!(parse_go_duration("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_go_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_go_duration("15us").unwrap(), Duration::from_micros(15));
        assert_eq!(parse_go_duration("15\u{b5}s").unwrap(), Duration::from_micros(15));
        assert_eq!(parse_go_duration("7ns").unwrap(), Duration::from_nanos(7));
    }

    #[test]
    fn test_parse_compound_and_fractional() {
        assert_eq!(parse_go_duration("2h45m").unwrap(), Duration::from_secs(9_900));
        assert_eq!(parse_go_duration("1.5h").unwrap(), Duration::from_secs(5_400));
        assert_eq!(parse_go_duration(".5s").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_go_duration("1h0m0s").unwrap(), Duration::from_secs(3_600));
        assert_eq!(parse_go_duration("+30m").unwrap(), Duration::from_secs(1_800));
    }

    #[test]
    fn test_parse_zero() {
        assert_eq!(parse_go_duration("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_go_duration("-0").unwrap(), Duration::ZERO);
        assert_eq!(parse_go_duration("-0s").unwrap(), Duration::ZERO);
        assert_eq!(parse_go_duration("-0.0h0m").unwrap(), Duration::ZERO);
        assert!(matches!(parse_go_duration("-"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_go_duration("--0s"), Err(DurationError::Invalid(_))));
    }

    #[test]
    fn test_parse_caps_at_signed_nanoseconds() {
        assert_eq!(
            parse_go_duration("2562047h").unwrap(),
            Duration::from_secs(2_562_047 * 3_600)
        );
        assert!(matches!(
            parse_go_duration("2562048h"),
            Err(DurationError::Overflow(_))
        ));
        assert!(matches!(
            parse_go_duration("3000000h"),
            Err(DurationError::Overflow(_))
        ));
        assert!(matches!(
            parse_go_duration("9223372036854775808ns"),
            Err(DurationError::Overflow(_))
        ));
        assert_eq!(
            parse_go_duration("9223372036854775807ns").unwrap(),
            Duration::from_nanos(i64::MAX as u64)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_go_duration(""), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_go_duration("one hour"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_go_duration("60"), Err(DurationError::MissingUnit(_))));
        assert!(matches!(
            parse_go_duration("3d"),
            Err(DurationError::UnknownUnit { .. })
        ));
        assert!(matches!(parse_go_duration("-1h"), Err(DurationError::Negative(_))));
        assert!(matches!(
            parse_go_duration("99999999999999999999h"),
            Err(DurationError::Overflow(_))
        ));
    }

    #[test]
    fn test_format_matches_go() {
        assert_eq!(format_go_duration(Duration::ZERO), "0s");
        assert_eq!(format_go_duration(Duration::from_secs(3_600)), "1h0m0s");
        assert_eq!(format_go_duration(Duration::from_secs(5_400)), "1h30m0s");
        assert_eq!(format_go_duration(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_go_duration(Duration::from_secs(5)), "5s");
        assert_eq!(format_go_duration(Duration::from_millis(1_500)), "1.5s");
        assert_eq!(format_go_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_go_duration(Duration::from_micros(15)), "15\u{b5}s");
        assert_eq!(format_go_duration(Duration::from_nanos(7)), "7ns");
    }

    #[test]
    fn test_format_then_parse_is_stable() {
        for secs in [1u64, 59, 61, 3_599, 3_601, 86_400] {
            let d = Duration::from_secs(secs);
            assert_eq!(parse_go_duration(&format_go_duration(d)).unwrap(), d);
        }
    }
}
