//! Parsing of human-readable set and rest text.
//!
//! Program catalogs describe exercises with strings like `"4 x 8-10"` and
//! `"90 sec"`. Nothing in here fails: unparseable input maps to a usable
//! default so a sloppy catalog entry never blocks a workout.

use serde::{Deserialize, Serialize};

/// Sets assumed when the set text has no leading count
pub const DEFAULT_SET_COUNT: u32 = 1;

/// Most sets a single exercise may plan
pub const MAX_SET_COUNT: u32 = 100;

/// Rest assumed when the rest text is not recognized
pub const DEFAULT_REST_SECONDS: u32 = 90;

/// Parse the number of sets from text like `"4 x 8-10"`.
///
/// Returns the leading integer (a fractional count is floored), or
/// [`DEFAULT_SET_COUNT`] if there is none or it is zero.
pub fn parse_set_count(text: &str) -> u32 {
    let digits = leading_digits(text.trim());
    match digits.parse::<u32>() {
        Ok(n) if n > 0 => n,
        _ => {
            tracing::debug!("Unparseable set count {:?}, defaulting to {}", text, DEFAULT_SET_COUNT);
            DEFAULT_SET_COUNT
        }
    }
}

/// Parse a rest duration into whole seconds.
///
/// - `"N/A"` → 0
/// - `"<n> min"` → n × 60 (n may be fractional, result rounded down)
/// - `"<n> sec"` → n
/// - anything else → [`DEFAULT_REST_SECONDS`]
///
/// Matching is case-insensitive and the first `<number> <unit>` pair in the
/// text wins, so `"2-3 min"` reads as three minutes.
pub fn parse_rest_time(text: &str) -> u32 {
    let normalized = text.trim().to_lowercase();
    if normalized == "n/a" {
        return 0;
    }

    match find_duration(&normalized) {
        Some(seconds) => seconds,
        None => {
            tracing::debug!("Unrecognized rest text {:?}, defaulting to {}s", text, DEFAULT_REST_SECONDS);
            DEFAULT_REST_SECONDS
        }
    }
}

/// Extract the target rep text from a set description.
///
/// `"4 x 8-10"` → `"8-10"`. Text without an `x` separator is returned
/// trimmed as-is.
pub fn target_reps_from_sets(text: &str) -> String {
    let trimmed = text.trim();
    let rest = trimmed[leading_digits(trimmed).len()..].trim_start();
    match rest
        .strip_prefix('x')
        .or_else(|| rest.strip_prefix('X'))
        .or_else(|| rest.strip_prefix('×'))
    {
        Some(target) => target.trim().to_string(),
        None => trimmed.to_string(),
    }
}

/// An inclusive rep range such as `8-10`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepRange {
    pub lower: u32,
    pub upper: u32,
}

impl RepRange {
    /// Parse `"8-10"`, `"8–10"` or a single `"12"`; anything else is `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let lo_digits = leading_digits(text);
        let lower = lo_digits.parse::<u32>().ok()?;

        let rest = text[lo_digits.len()..].trim_start();
        let rest = match rest.strip_prefix('-').or_else(|| rest.strip_prefix('–')) {
            Some(r) => r.trim_start(),
            None if is_rep_suffix(rest) => return Some(Self { lower, upper: lower }),
            None => return None,
        };

        let hi_digits = leading_digits(rest);
        let upper = hi_digits.parse::<u32>().ok()?;
        if upper < lower || !is_rep_suffix(&rest[hi_digits.len()..]) {
            return None;
        }
        Some(Self { lower, upper })
    }

    pub fn contains(&self, reps: u32) -> bool {
        (self.lower..=self.upper).contains(&reps)
    }
}

/// Nothing, or a "reps" label; "45s" is a duration, not a rep count
fn is_rep_suffix(text: &str) -> bool {
    let text = text.trim();
    text.is_empty() || text.to_ascii_lowercase().starts_with("rep")
}

fn leading_digits(text: &str) -> &str {
    let end = text
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    &text[..end]
}

/// Scan for the first `<number> <unit>` pair and convert it to seconds
fn find_duration(text: &str) -> Option<u32> {
    let bytes = text.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let starts_number = bytes[i].is_ascii_digit()
            && (i == 0 || !(bytes[i - 1].is_ascii_digit() || bytes[i - 1] == b'.'));
        if !starts_number {
            i += 1;
            continue;
        }

        let mut end = i;
        while end < bytes.len() && (bytes[end].is_ascii_digit() || bytes[end] == b'.') {
            end += 1;
        }
        let number = &text[i..end];

        let unit_start = text[end..]
            .char_indices()
            .find(|(_, c)| !c.is_whitespace())
            .map(|(offset, _)| end + offset)
            .unwrap_or(text.len());
        let unit: String = text[unit_start..]
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();

        if let Ok(value) = number.parse::<f64>() {
            if unit.starts_with("min") {
                return Some((value * 60.0).floor() as u32);
            }
            if unit.starts_with("sec") || unit == "s" {
                return Some(value.floor() as u32);
            }
        }

        i = end;
    }

    None
}
