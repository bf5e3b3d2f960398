//! Timestamp helpers.

use chrono::{SecondsFormat, Utc};

/// Current UTC time as an RFC 3339 string with second precision.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
