//! Vendor-neutral helpers for pulling canonical values out of loosely typed JSON.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use jobsekr_core::RemoteType;
use regex::Regex;
use scraper::Html;
use serde_json::Value as JsonValue;

static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("number pattern"));

pub fn text_or_none(value: String) -> Option<String> {
    let trimmed = value.trim().to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn json_at<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    let mut cur = value;
    for segment in path {
        cur = cur.get(*segment)?;
    }
    if cur.is_null() {
        None
    } else {
        Some(cur)
    }
}

pub fn json_str<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a str> {
    json_at(value, path)?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// String value, with numeric ids rendered as text.
pub fn json_string(value: &JsonValue, path: &[&str]) -> Option<String> {
    match json_at(value, path)? {
        JsonValue::String(s) => text_or_none(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Number value, also accepting numeric strings such as `"85000"` or `"85,000.00"`.
pub fn json_f64(value: &JsonValue, path: &[&str]) -> Option<f64> {
    match json_at(value, path)? {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    }
}

pub fn json_bool(value: &JsonValue, path: &[&str]) -> Option<bool> {
    json_at(value, path)?.as_bool()
}

pub fn json_array<'a>(value: &'a JsonValue, path: &[&str]) -> &'a [JsonValue] {
    json_at(value, path)
        .and_then(JsonValue::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

pub fn json_string_vec(value: &JsonValue, path: &[&str]) -> Vec<String> {
    json_array(value, path)
        .iter()
        .filter_map(|v| v.as_str().and_then(|s| text_or_none(s.to_string())))
        .collect()
}

/// The posting list of a listing response: either the top-level array or the
/// first array found under one of `keys`.
pub fn listing_items<'a>(raw: &'a JsonValue, keys: &[&str]) -> &'a [JsonValue] {
    if let Some(items) = raw.as_array() {
        return items;
    }
    keys.iter()
        .find_map(|key| raw.get(*key).and_then(JsonValue::as_array))
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn fragment_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let parts = fragment.root_element().text().collect::<Vec<_>>();
    collapse_whitespace(&parts.join(" "))
}

/// Strip markup down to plain text. Greenhouse and a few others ship
/// entity-escaped HTML, which surfaces as literal tags after the first pass.
pub fn html_to_text(html: &str) -> Option<String> {
    let mut text = fragment_text(html);
    if text.contains('<') && text.contains('>') {
        text = fragment_text(&text);
    }
    text_or_none(text)
}

pub fn join_location(parts: &[Option<&str>]) -> Option<String> {
    let joined = parts
        .iter()
        .flatten()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    text_or_none(joined)
}

pub fn parse_timestamp_str(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    let naive_text = text.trim_end_matches(" UTC").trim_end_matches('Z');
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(naive_text, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Timestamp from an ISO-ish string or a unix epoch number (seconds or millis).
pub fn json_timestamp(value: &JsonValue, path: &[&str]) -> Option<DateTime<Utc>> {
    match json_at(value, path)? {
        JsonValue::String(s) => parse_timestamp_str(s),
        JsonValue::Number(n) => {
            let raw = n.as_i64()?;
            if raw > 100_000_000_000 {
                Utc.timestamp_millis_opt(raw).single()
            } else {
                Utc.timestamp_opt(raw, 0).single()
            }
        }
        _ => None,
    }
}

pub fn remote_type_from_keyword(text: &str) -> Option<RemoteType> {
    let lower = text.to_ascii_lowercase();
    if lower.contains("hybrid") {
        Some(RemoteType::Hybrid)
    } else if lower.contains("remote") || lower.contains("anywhere") {
        Some(RemoteType::Remote)
    } else if lower.contains("on-site")
        || lower.contains("onsite")
        || lower.contains("on site")
        || lower.contains("in-office")
        || lower.contains("in office")
    {
        Some(RemoteType::Onsite)
    } else {
        None
    }
}

/// Seniority keyword from a posting title, most specific rank first.
pub fn seniority_from_title(title: &str) -> Option<String> {
    let lower = title.to_ascii_lowercase();
    let words = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>();
    let has = |needles: &[&str]| words.iter().any(|w| needles.contains(w));

    let level = if has(&["intern", "interns", "internship", "apprentice"]) {
        "intern"
    } else if has(&["chief", "vp", "cto", "ceo", "cfo", "coo"]) || lower.contains("vice president") {
        "executive"
    } else if has(&["director"]) || lower.contains("head of") {
        "director"
    } else if has(&["manager"]) {
        "manager"
    } else if has(&["principal", "distinguished"]) {
        "principal"
    } else if has(&["staff"]) {
        "staff"
    } else if has(&["lead"]) {
        "lead"
    } else if has(&["senior", "sr"]) {
        "senior"
    } else if has(&["junior", "jr", "graduate", "entry"]) || lower.contains("new grad") {
        "junior"
    } else if has(&["mid", "intermediate"]) {
        "mid"
    } else {
        return None;
    };
    Some(level.to_string())
}

/// Numbers embedded in free text, e.g. `"$90,000 - $120,000"` -> `[90000.0, 120000.0]`.
pub fn extract_numbers(text: &str) -> Vec<f64> {
    NUMBER
        .find_iter(&text.replace(',', ""))
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}
