//! Cell-level coercion shared by every adapter.
//!
//! Exchange reports wrap cells in spreadsheet escapes (`="2330"`), use
//! thousands separators, and fill cells with placeholders when a value does
//! not exist for the session. Placeholders and blanks become `None`.

use scraper::Html;

const PLACEHOLDERS: &[&str] = &[
    "", "-", "--", "---", "----", "X", "x", "N/A", "除權息", "除權", "除息",
];

/// Strip whitespace, the `="…"` escape wrapper, and stray quotes.
pub fn clean_cell(raw: &str) -> &str {
    let s = raw.trim();
    let s = s.strip_prefix('=').unwrap_or(s);
    let s = s.trim_matches('"');
    s.trim()
}

pub fn is_placeholder(cell: &str) -> bool {
    PLACEHOLDERS.contains(&clean_cell(cell))
}

/// `"1,234.50"` → `Some(1234.5)`. Placeholders and unparseable cells → `None`.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let cell = clean_cell(raw);
    if PLACEHOLDERS.contains(&cell) {
        return None;
    }
    let digits: String = cell.chars().filter(|c| *c != ',').collect();
    digits.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// `"1,234"` → `Some(1234)`. Negative or fractional values are rejected.
pub fn parse_count(raw: &str) -> Option<u64> {
    let cell = clean_cell(raw);
    if PLACEHOLDERS.contains(&cell) {
        return None;
    }
    let digits: String = cell.chars().filter(|c| *c != ',').collect();
    if let Ok(n) = digits.parse::<u64>() {
        return Some(n);
    }
    let v = digits.parse::<f64>().ok()?;
    (v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64).then_some(v as u64)
}

/// Combine a sign cell with an unsigned magnitude cell.
///
/// The sign cell may carry markup (`<p style= color:red>+</p>`). A sign cell
/// with neither `+` nor `-` is only accepted for a zero magnitude.
pub fn parse_signed_change(sign: &str, magnitude: &str) -> Option<f64> {
    let m = parse_decimal(magnitude)?.abs();
    let sign = strip_markup(sign);
    if sign.contains('-') {
        Some(-m)
    } else if sign.contains('+') {
        Some(m)
    } else if m == 0.0 {
        Some(0.0)
    } else {
        None
    }
}

/// Text content of an HTML fragment, trimmed.
pub fn strip_markup(raw: &str) -> String {
    Html::parse_fragment(raw)
        .root_element()
        .text()
        .collect::<String>()
        .trim()
        .to_string()
}
