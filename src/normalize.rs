//! Usage report normalization.
//!
//! Converts a raw [`MatchResult`] (byte counters, epoch expiry) into the
//! human-facing report: unit-scaled traffic figures, usage percentage and
//! an expiry summary with a coarse status.

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::aggregator::MatchResult;
use crate::codec::IdentifierKind;

const UNITS: [&str; 7] = ["B", "KB", "MB", "GB", "TB", "PB", "EB"];

/// "无限流量" 哨兵文案
pub const TRAFFIC_UNLIMITED: &str = "Unlimited";
const EXPIRY_NEVER: &str = "Never Expires";
const EXPIRY_EXPIRED: &str = "Expired";

/// A byte count scaled to its largest sub-1024 unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ByteSize {
    pub value: f64,
    pub unit: String,
    pub text: String,
}

impl ByteSize {
    fn zero() -> Self {
        Self {
            value: 0.0,
            unit: "B".to_string(),
            text: "0 B".to_string(),
        }
    }

    fn unlimited() -> Self {
        Self {
            value: 0.0,
            unit: TRAFFIC_UNLIMITED.to_string(),
            text: TRAFFIC_UNLIMITED.to_string(),
        }
    }
}

/// Expiry state of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryStatus {
    Active,
    ExpiringSoon,
    Expired,
}

/// Expiry summary: relative remaining time plus the absolute date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpirySummary {
    pub timestamp: i64,
    pub remaining_time: String,
    pub expiry_date: String,
    pub days_remaining: i64,
    pub status: ExpiryStatus,
}

/// Traffic figures of the final report.
#[derive(Debug, Clone, Serialize)]
pub struct TrafficSummary {
    pub upload: ByteSize,
    pub download: ByteSize,
    pub total: ByteSize,
    pub used: ByteSize,
    pub remaining: ByteSize,
    pub usage_percentage: String,
}

/// The normalized account report returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub panel_name: String,
    pub protocol: String,
    pub email: String,
    pub enable: bool,
    pub matched_by: IdentifierKind,
    pub traffic: TrafficSummary,
    pub expiry: ExpirySummary,
}

/// Scale a byte count into the largest unit keeping the value below 1024,
/// at two decimal places. `-1` is the unlimited sentinel; any other
/// non-positive count renders as `0 B`.
pub fn format_bytes(bytes: i64) -> ByteSize {
    if bytes == -1 {
        return ByteSize::unlimited();
    }
    if bytes <= 0 {
        return ByteSize::zero();
    }

    // 整数求幂，避免浮点对数在 1024 的整数次幂边界上取整出错
    let power = ((bytes as u64).ilog2() / 10).min(UNITS.len() as u32 - 1) as usize;
    let value = (bytes as f64 / 1024f64.powi(power as i32) * 100.0).round() / 100.0;
    let unit = UNITS[power];

    ByteSize {
        value,
        unit: unit.to_string(),
        text: format!("{} {}", trim_decimal(value), unit),
    }
}

// "1.50" -> "1.5", "1.00" -> "1"
fn trim_decimal(value: f64) -> String {
    format!("{value:.2}")
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// Usage percentage clamped to 0..=100, rendered as `"N%"`.
pub fn clean_percentage(percentage: f64) -> String {
    let clamped = (percentage.round() as i64).clamp(0, 100);
    format!("{clamped}%")
}

/// Summarize an expiry timestamp relative to the current time.
pub fn format_expiry(timestamp: i64) -> ExpirySummary {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    format_expiry_at(timestamp, now)
}

/// Summarize an expiry timestamp relative to `now` (seconds since epoch).
///
/// `0` means the account never expires; millisecond timestamps (> 10^12)
/// are scaled to seconds first.
pub fn format_expiry_at(timestamp: i64, now: i64) -> ExpirySummary {
    let timestamp = if timestamp > 1_000_000_000_000 {
        timestamp / 1000
    } else {
        timestamp
    };

    if timestamp == 0 {
        return ExpirySummary {
            timestamp: 0,
            remaining_time: EXPIRY_NEVER.to_string(),
            expiry_date: EXPIRY_NEVER.to_string(),
            days_remaining: -1,
            status: ExpiryStatus::Active,
        };
    }

    let remaining = timestamp - now;
    if remaining <= 0 {
        return ExpirySummary {
            timestamp,
            remaining_time: EXPIRY_EXPIRED.to_string(),
            expiry_date: EXPIRY_EXPIRED.to_string(),
            days_remaining: 0,
            status: ExpiryStatus::Expired,
        };
    }

    let days = remaining / 86_400;
    let hours = (remaining % 86_400) / 3_600;
    let minutes = (remaining % 3_600) / 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(plural(days, "Day"));
    }
    if hours > 0 {
        parts.push(plural(hours, "Hour"));
    }
    // 天和小时都为零时必须显示分钟
    if minutes > 0 || parts.is_empty() {
        parts.push(plural(minutes, "Minute"));
    }

    let expiry_date = Local
        .timestamp_opt(timestamp, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp.to_string());

    ExpirySummary {
        timestamp,
        remaining_time: parts.join(" "),
        expiry_date,
        days_remaining: days,
        status: if days <= 7 {
            ExpiryStatus::ExpiringSoon
        } else {
            ExpiryStatus::Active
        },
    }
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("{count} {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

/// Build the final report from a match.
pub fn normalize(matched: &MatchResult) -> Report {
    normalize_with_expiry(matched, format_expiry(matched.expiry_time))
}

/// [`normalize`] with a fixed reference time, for deterministic tests.
pub fn normalize_at(matched: &MatchResult, now: i64) -> Report {
    normalize_with_expiry(matched, format_expiry_at(matched.expiry_time, now))
}

fn normalize_with_expiry(matched: &MatchResult, expiry: ExpirySummary) -> Report {
    let used = matched.up + matched.down;
    let total = matched.total;

    // 总量非正视为不限流量
    let (total_fmt, remaining_fmt, percentage) = if total > 0 {
        (
            format_bytes(total),
            format_bytes((total - used).max(0)),
            clean_percentage(used as f64 / total as f64 * 100.0),
        )
    } else {
        (ByteSize::unlimited(), ByteSize::unlimited(), "0%".to_string())
    };

    Report {
        panel_name: matched.panel_name.clone(),
        protocol: matched.protocol.clone(),
        email: matched.email.clone(),
        enable: matched.enable,
        matched_by: matched.matched_by,
        traffic: TrafficSummary {
            upload: format_bytes(matched.up),
            download: format_bytes(matched.down),
            total: total_fmt,
            used: format_bytes(used),
            remaining: remaining_fmt,
            usage_percentage: percentage,
        },
        expiry,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_match(up: i64, down: i64, total: i64, expiry_time: i64) -> MatchResult {
        MatchResult {
            panel_name: "Panel_A".to_string(),
            protocol: "vless".to_string(),
            email: "user1".to_string(),
            up,
            down,
            total,
            expiry_time,
            enable: true,
            matched_by: IdentifierKind::Email,
        }
    }

    #[test]
    fn test_format_bytes_kilobytes() {
        let size = format_bytes(1536);
        assert_eq!(size.value, 1.5);
        assert_eq!(size.unit, "KB");
        assert_eq!(size.text, "1.5 KB");
    }

    #[test]
    fn test_format_bytes_unlimited_sentinel() {
        let size = format_bytes(-1);
        assert_eq!(size.text, TRAFFIC_UNLIMITED);
    }

    #[test]
    fn test_format_bytes_zero() {
        assert_eq!(format_bytes(0).text, "0 B");
        assert_eq!(format_bytes(-42).text, "0 B");
    }

    #[test]
    fn test_format_bytes_whole_units() {
        assert_eq!(format_bytes(1024).text, "1 KB");
        assert_eq!(format_bytes(1_073_741_824).text, "1 GB");
    }

    #[test]
    fn test_clean_percentage_clamps() {
        assert_eq!(clean_percentage(42.4), "42%");
        assert_eq!(clean_percentage(120.0), "100%");
        assert_eq!(clean_percentage(-5.0), "0%");
    }

    #[test]
    fn test_expiry_never() {
        let summary = format_expiry_at(0, 1_700_000_000);
        assert_eq!(summary.status, ExpiryStatus::Active);
        assert_eq!(summary.days_remaining, -1);
        assert_eq!(summary.remaining_time, EXPIRY_NEVER);
    }

    #[test]
    fn test_expiry_past_is_expired() {
        let summary = format_expiry_at(1_600_000_000, 1_700_000_000);
        assert_eq!(summary.status, ExpiryStatus::Expired);
        assert_eq!(summary.days_remaining, 0);
    }

    #[test]
    fn test_expiry_milliseconds_scaled() {
        let now = 1_700_000_000;
        let in_ten_days_ms = (now + 10 * 86_400) * 1000;
        let summary = format_expiry_at(in_ten_days_ms, now);
        assert_eq!(summary.days_remaining, 10);
        assert_eq!(summary.status, ExpiryStatus::Active);
    }

    #[test]
    fn test_expiry_soon_within_seven_days() {
        let now = 1_700_000_000;
        let summary = format_expiry_at(now + 3 * 86_400, now);
        assert_eq!(summary.status, ExpiryStatus::ExpiringSoon);
        assert_eq!(summary.days_remaining, 3);
        assert_eq!(summary.remaining_time, "3 Days");
    }

    #[test]
    fn test_expiry_minutes_only() {
        let now = 1_700_000_000;
        let summary = format_expiry_at(now + 90, now);
        assert_eq!(summary.remaining_time, "1 Minute");
    }

    #[test]
    fn test_expiry_mixed_parts() {
        let now = 1_700_000_000;
        let summary = format_expiry_at(now + 86_400 + 2 * 3_600 + 5 * 60, now);
        assert_eq!(summary.remaining_time, "1 Day 2 Hours 5 Minutes");
    }

    #[test]
    fn test_normalize_percentage_and_remaining() {
        let matched = sample_match(512, 512, 4096, 0);
        let report = normalize_at(&matched, 1_700_000_000);
        assert_eq!(report.traffic.usage_percentage, "25%");
        assert_eq!(report.traffic.used.text, "1 KB");
        assert_eq!(report.traffic.remaining.text, "3 KB");
    }

    #[test]
    fn test_normalize_zero_total_is_unlimited() {
        let matched = sample_match(100, 200, 0, 0);
        let report = normalize_at(&matched, 1_700_000_000);
        assert_eq!(report.traffic.total.text, TRAFFIC_UNLIMITED);
        assert_eq!(report.traffic.remaining.text, TRAFFIC_UNLIMITED);
        assert_eq!(report.traffic.usage_percentage, "0%");
    }

    #[test]
    fn test_normalize_overused_remaining_clamped() {
        let matched = sample_match(3000, 3000, 4096, 0);
        let report = normalize_at(&matched, 1_700_000_000);
        assert_eq!(report.traffic.remaining.text, "0 B");
        assert_eq!(report.traffic.usage_percentage, "100%");
    }
}
