//! Derived session metrics and their display formatting.
//!
//! Everything here is a pure function of the samples. Degenerate input
//! (missing samples, zero elapsed time, zero percent) yields zero, never NaN
//! or infinity.

use super::samples::Sample;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DerivedMetrics {
    pub elapsed_seconds: f64,
    /// Signed: an OCR misread can make it negative
    pub exp_gained: i64,
    pub rate_per_second: f64,
    pub rate_per_10min: f64,
    /// Zero when the session-start percentage is unknown
    pub total_exp_for_level: f64,
    pub current_exp_estimate: f64,
    pub remaining_exp: f64,
    pub seconds_to_level: f64,
}

impl DerivedMetrics {
    pub fn compute(first: Option<Sample>, latest: Option<Sample>, percent: Option<f64>) -> Self {
        let (Some(first), Some(latest)) = (first, latest) else {
            return Self::default();
        };

        let has_valid_times = latest.observed_at >= first.observed_at;
        let elapsed_seconds = if has_valid_times {
            (latest.observed_at - first.observed_at).num_milliseconds() as f64 / 1000.0
        } else {
            0.0
        };

        let exp_gained = signed_gain(first.value, latest.value);
        let rate_per_second = if elapsed_seconds > 0.0 {
            exp_gained as f64 / elapsed_seconds
        } else {
            0.0
        };
        let rate_per_10min = rate_per_second * 600.0;

        let total_exp_for_level = match percent {
            Some(p) if p > 0.0 => first.value as f64 * 100.0 / p,
            _ => 0.0,
        };
        let current_exp_estimate = first.value as f64 + exp_gained as f64;
        let remaining_exp = (total_exp_for_level - current_exp_estimate).max(0.0);
        let seconds_to_level = if rate_per_second > 0.0 {
            remaining_exp / rate_per_second
        } else {
            0.0
        };

        Self {
            elapsed_seconds: finite_or_zero(elapsed_seconds),
            exp_gained,
            rate_per_second: finite_or_zero(rate_per_second),
            rate_per_10min: finite_or_zero(rate_per_10min),
            total_exp_for_level: finite_or_zero(total_exp_for_level),
            current_exp_estimate: finite_or_zero(current_exp_estimate),
            remaining_exp: finite_or_zero(remaining_exp),
            seconds_to_level: finite_or_zero(seconds_to_level),
        }
    }
}

/// `latest - first`, saturating at the `i64` bounds.
fn signed_gain(first: u64, latest: u64) -> i64 {
    let gain = latest as i128 - first as i128;
    gain.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Formats elapsed seconds as "MM:SS". Minutes are not wrapped into hours.
pub fn format_duration(elapsed_seconds: f64) -> String {
    let total = finite_or_zero(elapsed_seconds).max(0.0).floor() as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Formats an ETA as "HH:MM:SS". Hours are two digits below 100 and
/// unpadded from there on.
pub fn format_time_to_level(seconds: f64) -> String {
    let total = finite_or_zero(seconds).max(0.0).floor() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    if hours >= 100 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    }
}

/// Groups digits in threes: 1234567 → "1,234,567".
pub fn number_with_commas(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// The 10-minute rate as shown to the user: rounded and grouped, "0" when
/// nothing has been measured.
pub fn format_rate(rate_per_10min: f64) -> String {
    let rounded = finite_or_zero(rate_per_10min).round();
    if rounded == 0.0 {
        "0".to_string()
    } else {
        number_with_commas(rounded as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Local, TimeZone};

    fn t0() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn sample(value: u64, after_ms: i64) -> Sample {
        Sample {
            value,
            observed_at: t0() + Duration::milliseconds(after_ms),
        }
    }

    #[test]
    fn test_one_minute_session() {
        let m = DerivedMetrics::compute(Some(sample(1000, 0)), Some(sample(1600, 60_000)), Some(10.0));

        assert_eq!(m.elapsed_seconds, 60.0);
        assert_eq!(m.exp_gained, 600);
        assert_eq!(m.rate_per_second, 10.0);
        assert_eq!(m.rate_per_10min, 6000.0);
        assert_eq!(m.total_exp_for_level, 10000.0);
        assert_eq!(m.current_exp_estimate, 1600.0);
        assert_eq!(m.remaining_exp, 8400.0);
        assert_eq!(m.seconds_to_level, 840.0);
    }

    #[test]
    fn test_zero_elapsed_has_no_rate() {
        let m = DerivedMetrics::compute(Some(sample(1000, 0)), Some(sample(1600, 0)), Some(10.0));

        assert_eq!(m.elapsed_seconds, 0.0);
        assert_eq!(m.rate_per_second, 0.0);
        assert_eq!(m.rate_per_10min, 0.0);
        assert_eq!(m.seconds_to_level, 0.0);
        assert_eq!(m.exp_gained, 600);
    }

    #[test]
    fn test_missing_samples_are_zero() {
        assert_eq!(DerivedMetrics::compute(None, None, None), DerivedMetrics::default());
        assert_eq!(
            DerivedMetrics::compute(Some(sample(5, 0)), None, Some(1.0)),
            DerivedMetrics::default()
        );
    }

    #[test]
    fn test_latest_before_first_has_no_time() {
        let m = DerivedMetrics::compute(Some(sample(1000, 5_000)), Some(sample(1200, 0)), None);
        assert_eq!(m.elapsed_seconds, 0.0);
        assert_eq!(m.rate_per_second, 0.0);
    }

    #[test]
    fn test_zero_percent_has_no_level_estimate() {
        let m = DerivedMetrics::compute(Some(sample(1000, 0)), Some(sample(1600, 60_000)), Some(0.0));
        assert_eq!(m.total_exp_for_level, 0.0);
        assert_eq!(m.remaining_exp, 0.0);
        assert_eq!(m.seconds_to_level, 0.0);
    }

    #[test]
    fn test_negative_gain_is_not_clamped() {
        let m = DerivedMetrics::compute(Some(sample(1000, 0)), Some(sample(400, 60_000)), Some(10.0));
        assert_eq!(m.exp_gained, -600);
        assert_eq!(m.rate_per_10min, -6000.0);
        assert_eq!(m.seconds_to_level, 0.0);
        assert!(m.remaining_exp >= 0.0);
    }

    #[test]
    fn test_huge_baseline_does_not_overflow() {
        let m = DerivedMetrics::compute(Some(sample(u64::MAX, 0)), Some(sample(5, 60_000)), Some(12.5));
        assert_eq!(m.exp_gained, i64::MIN);
        assert!(m.rate_per_10min < 0.0);
        assert_eq!(m.seconds_to_level, 0.0);

        let m = DerivedMetrics::compute(Some(sample(0, 0)), Some(sample(u64::MAX, 60_000)), None);
        assert_eq!(m.exp_gained, i64::MAX);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "00:00");
        assert_eq!(format_duration(65.9), "01:05");
        assert_eq!(format_duration(6000.0), "100:00");
    }

    #[test]
    fn test_format_time_to_level() {
        assert_eq!(format_time_to_level(840.0), "00:14:00");
        assert_eq!(format_time_to_level(3661.0), "01:01:01");
        assert_eq!(format_time_to_level(99.0 * 3600.0), "99:00:00");
        assert_eq!(format_time_to_level(100.0 * 3600.0 + 5.0), "100:00:05");
        assert_eq!(format_time_to_level(f64::INFINITY), "00:00:00");
    }

    #[test]
    fn test_number_with_commas() {
        assert_eq!(number_with_commas(0), "0");
        assert_eq!(number_with_commas(999), "999");
        assert_eq!(number_with_commas(1000), "1,000");
        assert_eq!(number_with_commas(123456), "123,456");
        assert_eq!(number_with_commas(1234567), "1,234,567");
        assert_eq!(number_with_commas(-6000), "-6,000");
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(0.0), "0");
        assert_eq!(format_rate(0.4), "0");
        assert_eq!(format_rate(6000.4), "6,000");
        assert_eq!(format_rate(-1234.6), "-1,235");
    }
}
