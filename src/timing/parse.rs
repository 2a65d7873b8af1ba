//! Time string parsing

use std::sync::OnceLock;

use regex::Regex;

fn time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:(?P<minutes>\d+)m)?(?:(?P<seconds>\d+)s)?")
            .expect("time pattern is a valid regex")
    })
}

/// Parse a time string like `1m30s`, `45s` or `2m` into seconds.
///
/// Matching is anchored at the start and lenient: anything that does not
/// begin with the pattern yields 0, and trailing characters are ignored.
/// A bare number such as `"90"` therefore parses to 0.
pub fn parse_time_string(input: &str) -> f64 {
    let Some(caps) = time_pattern().captures(input) else {
        return 0.0;
    };

    // Digit runs of any length parse as f64, so huge values clamp later
    let part = |name: &str| -> f64 {
        caps.name(name)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(0.0)
    };

    part("minutes") * 60.0 + part("seconds")
}
