//! Best-effort extraction of EXP values from recognized text.
//!
//! OCR output of a HUD line such as `123,456 [66.31%]` is noisy: separators
//! vanish, brackets turn into digits, spaces come and go. This is a small
//! pattern matcher, not a grammar. When nothing usable is found the reading is
//! skipped rather than rejected.

use anyhow::Result;
use regex::Regex;

/// EXP is the long integer on the line.
const LONG_NUMBER_PATTERN: &str = r"[0-9]{4,}";
/// Fallback when no long number is present.
const ANY_NUMBER_PATTERN: &str = r"[0-9]+";
/// Percent is the decimal number, e.g. `66.31`.
const DECIMAL_PATTERN: &str = r"[0-9]+\.[0-9]+";

/// Largest EXP accepted; longer runs are misreads and would overflow the
/// signed gain.
pub const MAX_EXP: u64 = i64::MAX as u64;

/// Values extracted from one recognition.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedReading {
    /// Whitelist-filtered, whitespace-collapsed text the patterns ran on.
    pub normalized: String,
    pub exp: Option<u64>,
    pub percent: Option<f64>,
    /// The percent exactly as matched, e.g. `10.00`
    pub percent_text: Option<String>,
}

/// Compiled patterns plus the character whitelist.
pub struct TextParser {
    whitelist: String,
    long_number: Regex,
    any_number: Regex,
    decimal: Regex,
}

impl TextParser {
    /// Creates a parser. An empty whitelist keeps every character.
    pub fn new(whitelist: &str) -> Result<Self> {
        Ok(Self {
            whitelist: whitelist.to_string(),
            long_number: Regex::new(LONG_NUMBER_PATTERN)?,
            any_number: Regex::new(ANY_NUMBER_PATTERN)?,
            decimal: Regex::new(DECIMAL_PATTERN)?,
        })
    }

    /// Drops characters outside the whitelist (whitespace is kept), then
    /// collapses whitespace runs and trims.
    ///
    /// Engines do not always honor their whitelist, so it is applied again here.
    pub fn normalize(&self, text: &str) -> String {
        let filtered: String = text
            .chars()
            .filter(|c| c.is_whitespace() || self.whitelist.is_empty() || self.whitelist.contains(*c))
            .collect();
        filtered.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// First run of 4+ digits, else first run of any digits.
    pub fn match_exp<'t>(&self, normalized: &'t str) -> Option<&'t str> {
        self.long_number
            .find(normalized)
            .or_else(|| self.any_number.find(normalized))
            .map(|m| m.as_str())
    }

    /// First `digits.digits` substring.
    pub fn match_percent<'t>(&self, normalized: &'t str) -> Option<&'t str> {
        self.decimal.find(normalized).map(|m| m.as_str())
    }

    /// Runs both extractions on raw recognized text.
    pub fn parse(&self, text: &str) -> ParsedReading {
        let normalized = self.normalize(text);

        let exp = self
            .match_exp(&normalized)
            .and_then(|digits| digits.parse::<u64>().ok())
            .filter(|v| *v <= MAX_EXP);

        let (percent, percent_text) = match self
            .match_percent(&normalized)
            .and_then(|s| s.parse::<f64>().ok().map(|p| (p, s)))
        {
            Some((p, s)) if (0.0..=100.0).contains(&p) => (Some(p), Some(s.to_string())),
            _ => (None, None),
        };

        ParsedReading {
            normalized,
            exp,
            percent,
            percent_text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> TextParser {
        TextParser::new("0123456789.").unwrap()
    }

    #[test]
    fn test_hud_line() {
        let p = parser();
        let normalized = p.normalize("EXP: 123,456 66.31%");
        assert_eq!(normalized, "123456 66.31");
        assert_eq!(p.match_exp(&normalized), Some("123456"));
        assert_eq!(p.match_percent(&normalized), Some("66.31"));

        let reading = p.parse("EXP: 123,456 66.31%");
        assert_eq!(reading.exp, Some(123456));
        assert_eq!(reading.percent, Some(66.31));
        assert_eq!(reading.percent_text.as_deref(), Some("66.31"));
    }

    #[test]
    fn test_no_digits() {
        let reading = parser().parse("EXP: --- %");
        assert_eq!(reading.exp, None);
        assert_eq!(reading.percent, None);
    }

    #[test]
    fn test_empty_text() {
        let reading = parser().parse("   \n ");
        assert_eq!(reading.normalized, "");
        assert_eq!(reading, ParsedReading::default());
    }

    #[test]
    fn test_whitespace_collapsed() {
        let p = parser();
        assert_eq!(p.normalize("  12 \n\t 34  "), "12 34");
    }

    #[test]
    fn test_short_number_fallback() {
        let reading = parser().parse("12 3");
        assert_eq!(reading.exp, Some(12));
        assert_eq!(reading.percent, None);
    }

    #[test]
    fn test_long_number_preferred_over_earlier_short() {
        let reading = parser().parse("7 8812345 12.5");
        assert_eq!(reading.exp, Some(8812345));
        assert_eq!(reading.percent, Some(12.5));
    }

    #[test]
    fn test_percent_out_of_range_dropped() {
        let reading = parser().parse("8812345 312.50");
        assert_eq!(reading.exp, Some(8812345));
        assert_eq!(reading.percent, None);
    }

    #[test]
    fn test_overflowing_digits_dropped() {
        let reading = parser().parse("123456789012345678901234567890");
        assert_eq!(reading.exp, None);
    }

    #[test]
    fn test_bracket_misread_stays_best_effort() {
        // "[66.31%]" read as "166.311": the decimal is still found but out of range
        let reading = parser().parse("123456 166.311");
        assert_eq!(reading.exp, Some(123456));
        assert_eq!(reading.percent, None);
    }

    #[test]
    fn test_empty_whitelist_keeps_everything() {
        let p = TextParser::new("").unwrap();
        assert_eq!(p.normalize("EXP 12"), "EXP 12");
    }

    #[test]
    fn test_exp_beyond_signed_range_dropped() {
        let p = parser();
        assert_eq!(p.parse("9223372036854775807 12.5").exp, Some(MAX_EXP));

        let reading = p.parse("9223372036854775808 12.5");
        assert_eq!(reading.exp, None);
        assert_eq!(reading.percent, Some(12.5));
    }

    #[test]
    fn test_percent_text_kept_verbatim() {
        let reading = parser().parse("123456 10.00");
        assert_eq!(reading.percent, Some(10.0));
        assert_eq!(reading.percent_text.as_deref(), Some("10.00"));

        let reading = parser().parse("123456 166.311");
        assert_eq!(reading.percent_text, None);
    }

    #[test]
    fn test_non_ascii_digits_do_not_shadow_exp() {
        // Arabic-Indic digits pass an empty whitelist but are not EXP
        let p = TextParser::new("").unwrap();
        let reading = p.parse("\u{0661}\u{0662}\u{0663}\u{0664}\u{0665} 123456 66.31");
        assert_eq!(reading.exp, Some(123456));
        assert_eq!(reading.percent, Some(66.31));
    }
}
