// src/utils/numeric.rs

use std::str::FromStr;

/// Parses a user-typed number (score, duration, difficulty), falling back to
/// the type's zero. Range checks are the caller's job.
pub fn parse_or_zero<T>(raw: Option<&str>) -> T
where
    T: FromStr + Default,
{
    raw.map(str::trim)
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or_default()
}

/// Like `parse_or_zero` but also accepts "45.0" for integer fields, which
/// spreadsheets produce for whole numbers.
pub fn parse_int_or_zero(raw: Option<&str>) -> i32 {
    let Some(s) = raw.map(str::trim) else {
        return 0;
    };
    if let Ok(v) = s.parse::<i32>() {
        return v;
    }
    let v: f64 = parse_or_zero(Some(s));
    let in_range = (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&v);
    if in_range && v.fract() == 0.0 {
        v as i32
    } else {
        0
    }
}
