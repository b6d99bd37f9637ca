use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;

const MILES_PER_METER: f64 = 0.000_621_371;
const FEET_PER_METER: f64 = 3.280_84;
const GRAMS_PER_POUND: f64 = 453.592;
const POUNDS_PER_KILOGRAM: f64 = 2.204_62;
const METERS_PER_SECOND_AT_ONE_MINUTE_MILE: f64 = 26.8224;
const MPH_PER_METER_PER_SECOND: f64 = 2.236_94;

/// Epoch values above this are milliseconds.
const MILLIS_THRESHOLD: f64 = 1e12;

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn meters_to_miles(meters: f64) -> f64 {
    round2(meters * MILES_PER_METER)
}

pub fn meters_to_feet(meters: f64) -> f64 {
    round2(meters * FEET_PER_METER)
}

pub fn grams_to_pounds(grams: f64) -> f64 {
    round2(grams / GRAMS_PER_POUND)
}

pub fn kilograms_to_pounds(kilograms: f64) -> f64 {
    round2(kilograms * POUNDS_PER_KILOGRAM)
}

pub fn seconds_to_minutes(seconds: f64) -> f64 {
    round2(seconds / 60.0)
}

pub fn seconds_to_hours(seconds: f64) -> f64 {
    round2(seconds / 3600.0)
}

/// Pace in minutes per mile. A stationary activity has no pace.
pub fn speed_to_pace_min_per_mile(meters_per_second: f64) -> Option<f64> {
    (meters_per_second > 0.0).then(|| round2(METERS_PER_SECOND_AT_ONE_MINUTE_MILE / meters_per_second))
}

pub fn speed_to_mph(meters_per_second: f64) -> f64 {
    round2(meters_per_second * MPH_PER_METER_PER_SECOND)
}

/// Normalizes Garmin timestamps to ISO-8601.
///
/// Numbers are epoch seconds, or milliseconds when large enough. Strings in
/// ISO form pass through; Garmin's `YYYY-MM-DD HH:MM:SS` is rewritten with a
/// `T` separator and no offset, matching the local start times it reports.
pub fn to_iso(timestamp: &Value) -> Option<String> {
    match timestamp {
        Value::Number(n) => epoch_to_iso(n.as_f64()?),
        Value::String(s) => string_to_iso(s),
        _ => None,
    }
}

fn epoch_to_iso(mut seconds: f64) -> Option<String> {
    if seconds <= 0.0 {
        return None;
    }
    if seconds > MILLIS_THRESHOLD {
        seconds /= 1000.0;
    }
    let whole = seconds.trunc() as i64;
    let nanos = ((seconds - seconds.trunc()) * 1e9).round() as u32;
    DateTime::from_timestamp(whole, nanos).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
}

fn string_to_iso(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.contains('T') {
        return Some(raw.to_string());
    }
    if let Ok(seconds) = raw.parse::<f64>() {
        return epoch_to_iso(seconds);
    }
    let without_fraction = raw.split('.').next().unwrap_or(raw);
    NaiveDateTime::parse_from_str(without_fraction, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
        .or_else(|| is_plain_date(raw).then(|| raw.to_string()))
}

fn is_plain_date(raw: &str) -> bool {
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok()
}

/// Activity type keys that read better with a fixed label.
const ACTIVITY_LABELS: &[(&str, &str)] = &[
    ("strength_training", "Strength"),
    ("treadmill_running", "Treadmill"),
    ("indoor_cardio", "Cardio"),
    ("hiit", "HIIT"),
    ("e_bike_fitness", "E-Bike"),
    ("open_water_swimming", "Open Water Swim"),
    ("uncategorized", "Other"),
];

/// Turns a Garmin activity type key (`lap_swimming`) into a label
/// (`Lap Swimming`).
/// Calendar day at `now` for a fixed offset from UTC.
pub fn local_date(now: DateTime<Utc>, tz_offset_hours: i64) -> NaiveDate {
    (now + Duration::hours(tz_offset_hours)).date_naive()
}

pub fn activity_type_label(type_key: &str) -> String {
    let key = type_key.trim().to_lowercase();
    if key.is_empty() {
        return "Unknown".to_string();
    }
    ACTIVITY_LABELS
        .iter()
        .find(|(known, _)| *known == key)
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| title_case_words(&key))
}

/// Cleans Garmin enum phrases such as `PRODUCTIVE_6` or
/// `IMPROVING_AEROBIC_BASE` into `Productive` / `Improving Aerobic Base`.
pub fn enum_label(raw: &str) -> Option<String> {
    let words: Vec<&str> = raw
        .split(|c: char| c == '_' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .collect();
    let trimmed = match words.split_last() {
        Some((last, rest)) if !rest.is_empty() && last.chars().all(|c| c.is_ascii_digit()) => rest,
        _ => &words[..],
    };
    if trimmed.is_empty() {
        return None;
    }
    Some(title_case_words(&trimmed.join(" ").to_lowercase()))
}

fn title_case_words(raw: &str) -> String {
    raw.split(|c: char| c == '_' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
