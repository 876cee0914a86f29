use std::time::Duration;

use crate::error::{Result, ScraplineError};

/// Parse a Go-style duration string such as `"1h2m3.5s"`, `"250ms"` or `"0"`.
///
/// Supported units: `ns`, `us` (`µs`), `ms`, `s`, `m`, `h`. Each component may
/// carry a fractional part. Negative durations are rejected.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let s = input.trim();
    if s.is_empty() {
        return Err(invalid(input, "empty duration"));
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.starts_with('-') {
        return Err(invalid(input, "negative durations are not allowed"));
    }
    let mut rest = s.strip_prefix('+').unwrap_or(s);

    let mut total_nanos: f64 = 0.0;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_len == 0 {
            return Err(invalid(input, "expected a number"));
        }
        let (num, tail) = rest.split_at(num_len);
        let value: f64 = num
            .parse()
            .map_err(|_| invalid(input, format!("bad number {num:?}")))?;

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        let scale = match unit {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            "" => return Err(invalid(input, "missing unit")),
            other => return Err(invalid(input, format!("unknown unit {other:?}"))),
        };
        total_nanos += value * scale;
        rest = tail;
    }

    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return Err(invalid(input, "duration out of range"));
    }
    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

fn invalid(input: &str, reason: impl std::fmt::Display) -> ScraplineError {
    ScraplineError::Config(format!("invalid duration {input:?}: {reason}"))
}
