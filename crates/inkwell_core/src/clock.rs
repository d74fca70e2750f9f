//! Wall-clock helpers shared by repositories and token issuance.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as Unix epoch milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

/// Current time as Unix epoch seconds (JWT `exp`/`iat` resolution).
pub fn now_secs() -> i64 {
    now_millis() / 1000
}
