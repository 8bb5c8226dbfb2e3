use chrono::{DateTime, Utc};

pub fn time_millis() -> i64 {
    let time: DateTime<chrono::Utc> = Utc::now();
    time.timestamp_millis()
}

/// Renders a millisecond timestamp as RFC 3339, falling back to the epoch.
pub fn to_rfc3339(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default().to_rfc3339()
}

/// `YYYY-MM` bucket used by the monthly usage counters.
pub fn month_period(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default().format("%Y-%m").to_string()
}
