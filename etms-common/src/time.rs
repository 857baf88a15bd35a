//! Timestamp utilities

use chrono::{DateTime, Datelike, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current calendar year, the default survey year for new records
pub fn current_year() -> i32 {
    now().year()
}

/// Unix seconds `hours` from now, used for session expiry
pub fn expiry_from_now(hours: i64) -> i64 {
    (now() + chrono::Duration::hours(hours)).timestamp()
}
