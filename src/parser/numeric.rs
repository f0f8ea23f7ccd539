// Price tokens and their validation.
use crate::model::ConfigError;
use fancy_regex::Regex;

/// A number not directly followed by another digit or `%`, so "149.029"
/// yields "149" and "20%" yields nothing.
pub const PRICE_TOKEN: &str = r"\d[\d,]*(?:\.\d{1,2})?(?!\d|%)";

/// Case-insensitive pattern whose group 1 is a price token after `prefix`.
pub fn compile_anchored(prefix: &str) -> Result<Regex, ConfigError> {
    let pattern = format!(r"(?i){}({})", prefix, PRICE_TOKEN);
    Regex::new(&pattern).map_err(|e| ConfigError::InvalidScanPattern {
        pattern,
        source: Box::new(e),
    })
}

/// Group 1 of the first match. Backtrack-limit errors count as no match.
pub fn first_capture<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    re.captures(text)
        .ok()
        .flatten()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Parses a price token: thousands separators stripped, at most one decimal
/// point, non-negative and finite.
pub fn parse_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty()
        || cleaned.matches('.').count() > 1
        || !cleaned.chars().all(|c| c.is_ascii_digit() || c == '.')
        || !cleaned.chars().any(|c| c.is_ascii_digit())
    {
        return None;
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}
