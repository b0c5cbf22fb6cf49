//! Rating extraction from free-text model responses.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // "Puntuación Individual (0-10): 7.5", tolerating markdown emphasis
    // around the label and a decimal comma.
    static ref RATING_REGEX: Regex = Regex::new(
        r"(?i)Puntuación\s+Individual\s*\(0-10\)[*_]*:[\s*_]*(-?\d+(?:[.,]\d+)?)"
    ).unwrap();
}

pub const MIN_RATING: f64 = 0.0;
pub const MAX_RATING: f64 = 10.0;

/// Extract the individual rating from a model response.
///
/// Total: every input maps to a value in [0, 10]. A missing or unparsable
/// score yields 0; out-of-range values are clamped.
pub fn extract_rating(text: &str) -> f64 {
    RATING_REGEX
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().replace(',', ".").parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .map(clamp_rating)
        .unwrap_or(MIN_RATING)
}

pub fn clamp_rating(value: f64) -> f64 {
    value.clamp(MIN_RATING, MAX_RATING)
}
